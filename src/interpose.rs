// SPDX-License-Identifier: MIT

//! The exported replacements for `execve`, `execv`, `execvp` and `execvpe`.
//!
//! Loaded through `LD_PRELOAD`, these definitions win symbol resolution over
//! libc's.  Each one looks up the next definition with `dlsym(RTLD_NEXT, ..)`,
//! so the shim never calls back into itself, and hands over to
//! [`dispatch`](crate::dispatch::dispatch).
//!
//! The symbols are only exported from non-test builds: the unit-test binary
//! links this crate statically and would otherwise hijack its own exec calls.

use std::ffi::{CStr, c_char, c_int, c_void};

use nix::libc;
use tracing::{debug, error};

use crate::{config::BundleEnv, dispatch::dispatch, error::ShimError, logging, portable};

/// Shared signature of `execve` and `execvpe`.
type ExecFn =
    unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> c_int;

/// Find the definition of `symbol` that follows this library in link order.
fn next_symbol(symbol: &'static CStr) -> Result<ExecFn, ShimError> {
    // SAFETY: `symbol` is NUL-terminated; RTLD_NEXT is a valid pseudo-handle.
    let sym = unsafe { libc::dlsym(libc::RTLD_NEXT, symbol.as_ptr()) };
    if sym.is_null() {
        return Err(ShimError::SymbolNotFound {
            symbol: symbol.to_string_lossy().into_owned(),
        });
    }
    // SAFETY: both looked-up names are libc functions with the ExecFn signature.
    Ok(unsafe { std::mem::transmute::<*mut c_void, ExecFn>(sym) })
}

/// A missing exec primitive means the loader setup is broken; there is
/// nothing sensible to call, so stop here.
fn next_symbol_or_abort(symbol: &'static CStr) -> ExecFn {
    match next_symbol(symbol) {
        Ok(f) => f,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}fatal: {}", logging::PREFIX, e);
            std::process::abort();
        }
    }
}

fn hijacked(call: &str, filename: *const c_char) {
    logging::init();
    if filename.is_null() {
        debug!("{} call hijacked: (null)", call);
    } else {
        // SAFETY: non-null exec filenames are C strings.
        let name = unsafe { CStr::from_ptr(filename) };
        debug!("{} call hijacked: {}", call, name.to_string_lossy());
    }
}

/// # Safety
///
/// Same contract as `execve(2)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn execve(
    filename: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    hijacked("execve", filename);
    let real = next_symbol_or_abort(c"execve");
    // SAFETY: arguments are forwarded unchanged from our caller.
    unsafe { dispatch(|f, a, e| real(f, a, e), filename, argv, Some(envp)) }
}

/// # Safety
///
/// Same contract as `execv(3)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn execv(filename: *const c_char, argv: *const *const c_char) -> c_int {
    hijacked("execv", filename);
    let real = next_symbol_or_abort(c"execve");
    // SAFETY: as for execve, with the current environment.
    unsafe { dispatch(|f, a, e| real(f, a, e), filename, argv, None) }
}

/// # Safety
///
/// Same contract as `execvpe(3)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn execvpe(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    hijacked("execvpe", file);
    let real = next_symbol_or_abort(c"execvpe");
    // SAFETY: arguments are forwarded unchanged from our caller.
    unsafe { dispatch(|f, a, e| real(f, a, e), file, argv, Some(envp)) }
}

/// # Safety
///
/// Same contract as `execvp(3)`.
#[cfg_attr(not(test), unsafe(no_mangle))]
pub unsafe extern "C" fn execvp(file: *const c_char, argv: *const *const c_char) -> c_int {
    hijacked("execvp", file);
    let real = next_symbol_or_abort(c"execvpe");
    // SAFETY: as for execvpe, with the current environment.
    unsafe { dispatch(|f, a, e| real(f, a, e), file, argv, None) }
}

/// Runs when the dynamic linker loads the library: turn on diagnostics and
/// take the portable-directory snapshot while the parent is still around.
extern "C" fn on_load() {
    logging::init();
    portable::prime(&BundleEnv::from_process());
}

#[used]
#[unsafe(link_section = ".init_array")]
static ON_LOAD: extern "C" fn() = on_load;
