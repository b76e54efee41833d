// SPDX-License-Identifier: MIT

//! Recover the user's real HOME and XDG directories when the bundle runs in
//! portable mode.
//!
//! In portable mode the bundle runtime points HOME at `$APPIMAGE.home` and the
//! XDG config/data directories at `$APPIMAGE.config` / `$APPIMAGE.share`.
//! Programs outside the bundle must get the real values back.  These are taken
//! from the parent process's environment block (`/proc/<ppid>/environ`),
//! falling back to the launcher's `REAL_*` variables.
//!
//! The snapshot is computed at most once per process.

use std::{
    ffi::{CStr, OsStr, OsString},
    os::unix::ffi::OsStrExt as _,
    sync::OnceLock,
};

use tracing::debug;

use crate::{
    config::{self, BundleEnv},
    error::ShimError,
    sanitize::{find_value, value_of},
};

/// The pre-bundle values of HOME, XDG_CONFIG_HOME and XDG_DATA_HOME.
///
/// A `None` XDG value means the parent did not have the variable at all,
/// which is different from having it set to some default path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortableSnapshot {
    home: Option<OsString>,
    config_home: Option<OsString>,
    data_home: Option<OsString>,
}

static SNAPSHOT: OnceLock<Option<PortableSnapshot>> = OnceLock::new();

/// The process-wide snapshot, captured on first use.
/// `None` means nothing could be learned, and callers must not alter the
/// corresponding variables.
pub fn snapshot() -> Option<&'static PortableSnapshot> {
    SNAPSHOT.get_or_init(PortableSnapshot::capture).as_ref()
}

/// Capture the snapshot right away when the process starts inside a bundle.
/// The parent may exit before the first exec, taking its environment with it.
pub fn prime(bundle: &BundleEnv) {
    if bundle.appdir().is_some() {
        let _ = snapshot();
    }
}

impl PortableSnapshot {
    pub fn new(
        home: Option<OsString>,
        config_home: Option<OsString>,
        data_home: Option<OsString>,
    ) -> Self {
        PortableSnapshot {
            home,
            config_home,
            data_home,
        }
    }

    pub fn home(&self) -> Option<&OsStr> {
        self.home.as_deref()
    }

    /// Set only if the parent had XDG_CONFIG_HOME.
    pub fn config_home(&self) -> Option<&OsStr> {
        self.config_home.as_deref()
    }

    /// Set only if the parent had XDG_DATA_HOME.
    pub fn data_home(&self) -> Option<&OsStr> {
        self.data_home.as_deref()
    }

    fn capture() -> Option<Self> {
        Self::capture_with(read_parent_environ, |name| std::env::var_os(name))
    }

    /// Prefer the environment block from `read`; when it fails, fall back to
    /// the restoration variables found through `lookup`.
    pub fn capture_with<R, F>(read: R, lookup: F) -> Option<Self>
    where
        R: FnOnce() -> Result<Vec<u8>, ShimError>,
        F: Fn(&str) -> Option<OsString>,
    {
        match read() {
            Ok(block) => {
                let snap = Self::from_environ_block(&block);
                debug!("Captured parent directories: {:?}", snap);
                Some(snap)
            }
            Err(e) => {
                debug!("Parent environment unavailable ({}), trying REAL_* variables", e);
                Self::from_lookup(lookup)
            }
        }
    }

    /// Scan a raw `NAME=value\0NAME=value\0...` block.  The first occurrence
    /// of each name wins.
    pub fn from_environ_block(block: &[u8]) -> Self {
        let mut snap = PortableSnapshot::default();
        for entry in block.split(|b| *b == 0) {
            if snap.home.is_none() {
                snap.home = value_of(entry, config::HOME).map(os_string);
            }
            if snap.config_home.is_none() {
                snap.config_home = value_of(entry, config::XDG_CONFIG_HOME).map(os_string);
            }
            if snap.data_home.is_none() {
                snap.data_home = value_of(entry, config::XDG_DATA_HOME).map(os_string);
            }
        }
        snap
    }

    /// Build the snapshot from the launcher's restoration variables.
    /// Empty values count as unset.  `None` when none of them is usable.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let snap = PortableSnapshot {
            home: get(config::REAL_HOME),
            config_home: get(config::REAL_XDG_CONFIG_HOME),
            data_home: get(config::REAL_XDG_DATA_HOME),
        };
        if snap == PortableSnapshot::default() {
            None
        } else {
            Some(snap)
        }
    }
}

fn os_string(value: &[u8]) -> OsString {
    OsStr::from_bytes(value).to_os_string()
}

/// True when the environment shows the bundle's portable directories: HOME
/// ending in `.home`, or an XDG directory equal to `$APPIMAGE.config` /
/// `$APPIMAGE.share`.
pub fn portable_mode_active(entries: &[&CStr], bundle: &BundleEnv) -> bool {
    if find_value(entries, config::HOME)
        .is_some_and(|home| home.ends_with(config::PORTABLE_HOME_SUFFIX))
    {
        return true;
    }
    let is_portable = |name: &str, portable: Option<Vec<u8>>| match portable {
        Some(p) => find_value(entries, name) == Some(p.as_slice()),
        None => false,
    };
    is_portable(config::XDG_CONFIG_HOME, bundle.portable_config_home())
        || is_portable(config::XDG_DATA_HOME, bundle.portable_data_home())
}

#[cfg(target_os = "linux")]
fn read_parent_environ() -> Result<Vec<u8>, ShimError> {
    read_process_environ(nix::unistd::getppid())
}

/// The raw environment block of `pid`.  PID 1 and below are init or the
/// kernel, never the program that launched the bundle.
#[cfg(target_os = "linux")]
pub fn read_process_environ(pid: nix::unistd::Pid) -> Result<Vec<u8>, ShimError> {
    if pid.as_raw() <= 1 {
        return Err(ShimError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no usable parent process",
        )));
    }
    // Read whole; a large parent environment must not lose its tail.
    Ok(std::fs::read(format!("/proc/{pid}/environ"))?)
}

#[cfg(not(target_os = "linux"))]
fn read_parent_environ() -> Result<Vec<u8>, ShimError> {
    Err(ShimError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no process environment interface",
    )))
}
