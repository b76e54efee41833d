// SPDX-License-Identifier: MIT

//! Decide whether the program about to be executed lives inside the bundle.
//!
//! The comparison is a plain byte prefix over the shorter of the two paths,
//! not a path-segment match: with `APPDIR=/opt/App`, both `/opt/App/bin/x` and
//! `/opt/AppOther/bin/x` are internal.  Launchers rely on the loose match, so
//! it stays.

use std::{
    ffi::OsStr,
    os::unix::ffi::OsStrExt as _,
    path::{Path, PathBuf},
};

use crate::config::BundleEnv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Inside the bundle, or no bundle at all.  The environment is left alone.
    Internal,
    /// A system program.  Bundle-private variables must be removed.
    External,
}

/// The exec filename together with its canonical form, when one exists.
#[derive(Debug)]
pub struct TargetPath<'a> {
    literal: &'a [u8],
    canonical: Option<PathBuf>,
}

impl<'a> TargetPath<'a> {
    /// Canonicalize the filename (absolute, symlinks resolved).  A bare command
    /// name awaiting a PATH search, or a missing file, keeps only the literal.
    pub fn resolve(filename: &'a [u8]) -> Self {
        let canonical = std::fs::canonicalize(Path::new(OsStr::from_bytes(filename))).ok();
        TargetPath {
            literal: filename,
            canonical,
        }
    }

    pub fn canonical(&self) -> Option<&Path> {
        self.canonical.as_deref()
    }

    /// The path used for classification.
    pub fn compared(&self) -> &[u8] {
        match &self.canonical {
            Some(p) => p.as_os_str().as_bytes(),
            None => self.literal,
        }
    }
}

/// Classify the resolved target against the bundle root.
pub fn classify(target: &TargetPath<'_>, bundle: &BundleEnv) -> Target {
    classify_path(target.compared(), bundle)
}

/// Classify a raw path.  Without a bundle root everything is internal.
pub fn classify_path(path: &[u8], bundle: &BundleEnv) -> Target {
    let Some(root) = bundle.appdir() else {
        return Target::Internal;
    };
    let n = std::cmp::min(path.len(), root.len());
    if path[..n] == root[..n] {
        Target::Internal
    } else {
        Target::External
    }
}
