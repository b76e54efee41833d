//! # execshim
//!
//! A preload library that keeps a bundle's private environment away from the
//! programs it launches.
//!
//! Loaded with `LD_PRELOAD` into every process of an AppImage-style bundle, it
//! replaces `execve`, `execv`, `execvp` and `execvpe`.  When the target
//! program lives outside the bundle root (`APPDIR`), toolkit and loader
//! variables that point into the bundle are removed, and in portable mode the
//! user's real HOME and XDG directories are put back.

pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod portable;
pub mod sanitize;

#[cfg(target_os = "linux")]
pub mod dispatch;
#[cfg(target_os = "linux")]
pub mod interpose;
#[cfg(target_os = "linux")]
pub mod restore;

#[cfg(test)]
mod test_util;

pub use classify::{Target, TargetPath, classify};
pub use config::BundleEnv;
pub use error::ShimError;
pub use portable::PortableSnapshot;
pub use sanitize::{CleanEnv, EnvBlock, sanitize};
