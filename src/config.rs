// SPDX-License-Identifier: MIT

//! The environment variables the shim recognizes.
//!
//! There is no configuration file; everything is driven by variables that the
//! bundle's launcher exports.  [`BundleEnv`] captures the ones that steer
//! classification and sanitization so the pure logic never reads the process
//! environment directly.

use std::{
    ffi::{OsStr, OsString},
    os::unix::ffi::OsStrExt as _,
};

/// Bundle root.  Absence disables all sanitization.
pub const APPDIR: &str = "APPDIR";
/// Path of the bundle file itself, used to recognize portable directories.
pub const APPIMAGE: &str = "APPIMAGE";
/// Any non-empty value turns on diagnostic output.
pub const EXEC_DEBUG: &str = "APPIMAGE_EXEC_DEBUG";
/// One-shot working directory for the next exec.
pub const ORIGINAL_WORKING_DIR: &str = "ORIGINAL_WORKING_DIR";

pub const HOME: &str = "HOME";
pub const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";
pub const XDG_DATA_HOME: &str = "XDG_DATA_HOME";

pub const REAL_HOME: &str = "REAL_HOME";
pub const REAL_XDG_CONFIG_HOME: &str = "REAL_XDG_CONFIG_HOME";
pub const REAL_XDG_DATA_HOME: &str = "REAL_XDG_DATA_HOME";

/// Restoration pairs, `(source, target)`, in the order they are applied.
pub const RESTORE_PAIRS: &[(&str, &str)] = &[
    (REAL_XDG_DATA_HOME, XDG_DATA_HOME),
    (REAL_XDG_CONFIG_HOME, XDG_CONFIG_HOME),
    ("REAL_XDG_CACHE_HOME", "XDG_CACHE_HOME"),
    (REAL_HOME, HOME),
];

/// Suffix the bundle runtime appends to the bundle path for a portable HOME.
pub const PORTABLE_HOME_SUFFIX: &[u8] = b".home";
pub const PORTABLE_CONFIG_SUFFIX: &[u8] = b".config";
pub const PORTABLE_DATA_SUFFIX: &[u8] = b".share";

/// The bundle-related variables seen at the time of one exec call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleEnv {
    appdir: Option<OsString>,
    appimage: Option<OsString>,
}

impl BundleEnv {
    pub fn new(appdir: Option<OsString>, appimage: Option<OsString>) -> Self {
        BundleEnv { appdir, appimage }
    }

    /// Read `APPDIR` and `APPIMAGE` from the current process environment.
    pub fn from_process() -> Self {
        BundleEnv {
            appdir: std::env::var_os(APPDIR),
            appimage: std::env::var_os(APPIMAGE),
        }
    }

    /// The bundle root, as raw bytes.
    pub fn appdir(&self) -> Option<&[u8]> {
        self.appdir.as_deref().map(OsStr::as_bytes)
    }

    pub fn appimage(&self) -> Option<&[u8]> {
        self.appimage.as_deref().map(OsStr::as_bytes)
    }

    /// `$APPIMAGE.config`, the XDG_CONFIG_HOME used in portable mode.
    pub fn portable_config_home(&self) -> Option<Vec<u8>> {
        self.appimage_with_suffix(PORTABLE_CONFIG_SUFFIX)
    }

    /// `$APPIMAGE.share`, the XDG_DATA_HOME used in portable mode.
    pub fn portable_data_home(&self) -> Option<Vec<u8>> {
        self.appimage_with_suffix(PORTABLE_DATA_SUFFIX)
    }

    fn appimage_with_suffix(&self, suffix: &[u8]) -> Option<Vec<u8>> {
        self.appimage().map(|base| [base, suffix].concat())
    }
}

/// True when `APPIMAGE_EXEC_DEBUG` holds a non-empty value.
pub fn debug_enabled() -> bool {
    std::env::var_os(EXEC_DEBUG).is_some_and(|v| !v.is_empty())
}
