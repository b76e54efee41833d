// SPDX-License-Identifier: MIT

//! The routine shared by every hijacked exec entry point.

use std::ffi::{CStr, c_char, c_int};

use nix::errno::Errno;
use tracing::debug;

use crate::{
    classify::{Target, TargetPath, classify},
    config::BundleEnv,
    portable::{self, PortableSnapshot},
    restore,
    sanitize::{CleanEnv, EnvBlock, entries_from_ptr, sanitize},
};

unsafe extern "C" {
    static environ: *const *const c_char;
}

/// The calling process's environment, as it is right now.
pub fn current_environ() -> *const *const c_char {
    // SAFETY: libc keeps `environ` valid; reading the pointer value is enough.
    unsafe { environ }
}

/// Canonicalize, restore, classify, sanitize, then hand off to `real`.
///
/// `envp` of `None` means "the current environment", which is read after the
/// restoration step so restored values are passed on.  The return value and
/// errno of `real` are passed back untouched.
///
/// # Safety
///
/// `filename`, `argv` and `envp` must satisfy the contract of `execve(2)`.
pub unsafe fn dispatch<F>(
    real: F,
    filename: *const c_char,
    argv: *const *const c_char,
    envp: Option<*const *const c_char>,
) -> c_int
where
    F: FnOnce(*const c_char, *const *const c_char, *const *const c_char) -> c_int,
{
    // SAFETY: forwarded from our caller.
    unsafe { dispatch_with(real, portable::snapshot, filename, argv, envp) }
}

/// [`dispatch`] with the portable-directory snapshot supplied by `snapshot`.
///
/// # Safety
///
/// As for [`dispatch`].
unsafe fn dispatch_with<'s, F, P>(
    real: F,
    snapshot: P,
    filename: *const c_char,
    argv: *const *const c_char,
    envp: Option<*const *const c_char>,
) -> c_int
where
    F: FnOnce(*const c_char, *const *const c_char, *const *const c_char) -> c_int,
    P: FnOnce() -> Option<&'s PortableSnapshot>,
{
    let name: &[u8] = if filename.is_null() {
        b""
    } else {
        // SAFETY: the caller passes a valid C string.
        unsafe { CStr::from_ptr(filename) }.to_bytes()
    };
    let target = TargetPath::resolve(name);
    debug!(
        "filename {}, fullpath {}",
        String::from_utf8_lossy(name),
        target
            .canonical()
            .map_or_else(|| "(null)".into(), |p| p.display().to_string())
    );

    restore::restore_process_env();

    let envp = envp.unwrap_or_else(current_environ);
    let cleaned = match classify(&target, &BundleEnv::from_process()) {
        Target::Internal => None,
        Target::External => {
            debug!("External process detected. Cleaning environment variables");
            // SAFETY: `envp` follows the execve contract.
            let entries = unsafe { entries_from_ptr(envp) };
            clean_env(&entries, snapshot)
        }
    };
    let chosen = cleaned.as_ref().map_or(envp, EnvBlock::as_ptr);

    let ret = real(filename, argv, chosen);

    // Only reached when the exec failed.  Releasing the copies must not
    // clobber the errno the caller is about to inspect.
    let errno = Errno::last_raw();
    drop(cleaned);
    drop(target);
    Errno::set_raw(errno);
    ret
}

/// Sanitize, degrading to the inherited environment on any failure.
fn clean_env<'s, P>(entries: &[&CStr], snapshot: P) -> Option<EnvBlock>
where
    P: FnOnce() -> Option<&'s PortableSnapshot>,
{
    match sanitize(entries, &BundleEnv::from_process(), snapshot) {
        Ok(CleanEnv::Cleaned(block)) => Some(block),
        Ok(CleanEnv::Unchanged) => None,
        Err(e) => {
            debug!("Error creating cleaned environment: {}", e);
            None
        }
    }
}
