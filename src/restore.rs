// SPDX-License-Identifier: MIT

//! Apply the launcher's restoration variables to the live process.
//!
//! A wrapping launcher may export `REAL_HOME`, `REAL_XDG_*` and
//! `ORIGINAL_WORKING_DIR` so that everything the bundle starts sees the user's
//! true values.  This runs before every exec, for internal and external
//! targets alike, and mutates this process.

use std::{
    ffi::{CString, OsStr},
    os::unix::ffi::OsStrExt as _,
    path::PathBuf,
};

use nix::libc;
use tracing::debug;

use crate::{config, error::ShimError};

/// Copy each non-empty `REAL_*` variable onto its target.
pub fn apply_restore_vars() {
    apply_pairs(config::RESTORE_PAIRS);
}

fn apply_pairs(pairs: &[(&str, &str)]) {
    for (source, target) in pairs {
        match std::env::var_os(source) {
            Some(value) if !value.is_empty() => match set_process_var(target, &value) {
                Ok(()) => debug!("Restored {}: {:?}", target, value),
                Err(e) => debug!("Failed to restore {} (wanted {:?}): {}", target, value, e),
            },
            _ => {}
        }
    }
}

/// `setenv(3)`, reporting failure instead of panicking the way
/// `std::env::set_var` does.
fn set_process_var(name: &str, value: &OsStr) -> Result<(), ShimError> {
    let name = CString::new(name)?;
    let value = CString::new(value.as_bytes())?;
    // SAFETY: both are valid C strings.  Exec callers are effectively
    // single-threaded at this point; the process is about to be replaced.
    if unsafe { libc::setenv(name.as_ptr(), value.as_ptr(), 1) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

/// Change into `ORIGINAL_WORKING_DIR` and clear it, so this fires once per
/// process.  On failure the variable stays set and the next exec retries.
pub fn enter_original_dir() -> Result<Option<PathBuf>, ShimError> {
    let Some(dir) = std::env::var_os(config::ORIGINAL_WORKING_DIR) else {
        return Ok(None);
    };
    let dir = PathBuf::from(dir);
    nix::unistd::chdir(dir.as_path()).map_err(std::io::Error::from)?;
    debug!(
        "Changed working directory to ORIGINAL_WORKING_DIR: {}",
        dir.display()
    );
    // SAFETY: as in apply_restore_vars.
    unsafe { std::env::remove_var(config::ORIGINAL_WORKING_DIR) };
    Ok(Some(dir))
}

/// Run the whole restoration step.  Failures are logged and ignored.
pub fn restore_process_env() {
    apply_restore_vars();
    if let Err(e) = enter_original_dir() {
        debug!("Failed to change to ORIGINAL_WORKING_DIR: {}", e);
    }
}
