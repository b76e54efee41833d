// SPDX-License-Identifier: MIT

//! Helpers for tests that touch process-wide state.
//!
//! The process environment and working directory are shared by every test
//! thread, so tests that change them hold [`EnvGuard`], which serializes them
//! and puts everything back on drop.

use std::{
    env,
    ffi::{OsStr, OsString},
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub(crate) struct EnvGuard {
    vars: Vec<(OsString, OsString)>,
    cwd: Option<PathBuf>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn capture() -> Self {
        // A failed test poisons the lock; the state is restored regardless.
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        EnvGuard {
            vars: env::vars_os().collect(),
            cwd: env::current_dir().ok(),
            _lock: lock,
        }
    }

    pub(crate) fn set<K: AsRef<OsStr>, V: AsRef<OsStr>>(key: K, value: V) {
        unsafe { env::set_var(key, value) };
    }

    pub(crate) fn unset<K: AsRef<OsStr>>(key: K) {
        unsafe { env::remove_var(key) };
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, _) in env::vars_os() {
            Self::unset(&key);
        }
        for (key, value) in &self.vars {
            Self::set(key, value);
        }
        if let Some(cwd) = &self.cwd {
            let _ = env::set_current_dir(cwd);
        }
    }
}
