// SPDX-License-Identifier: MIT

//! Common error type.
//!
//! Only [`ShimError::SymbolNotFound`] is fatal.  Every other variant is
//! absorbed by the dispatch routine, which falls back to the inherited
//! environment rather than blocking the launch.

use std::{collections::TryReserveError, ffi::NulError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShimError {
    /// `dlsym(RTLD_NEXT, ..)` found no later definition of the exec primitive.
    #[error("could not resolve the next definition of '{symbol}'")]
    SymbolNotFound { symbol: String },

    #[error("could not allocate the sanitized environment: {0}")]
    Alloc(#[from] TryReserveError),

    #[error("environment entry contains an interior NUL byte: {0}")]
    InteriorNul(#[from] NulError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
