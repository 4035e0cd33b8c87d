//! FFI error types

use std::path::PathBuf;

use thiserror::Error;

/// Error type for FFI operations
#[derive(Debug, Error)]
pub enum FfiError {
    /// The library file is missing, malformed or built for another platform
    #[error("failed to load library '{}': {reason}", .path.display())]
    LibraryLoad { path: PathBuf, reason: String },

    /// A symbol was requested from a library that was never loaded
    #[error("library '{0}' has not been loaded")]
    NotLoaded(String),

    /// The library does not export the requested symbol
    #[error("symbol '{symbol}' not found in '{}': {reason}", .path.display())]
    SymbolResolution {
        symbol: String,
        path: PathBuf,
        reason: String,
    },

    /// The symbol name cannot be passed to the platform loader
    #[error("invalid symbol name: {0:?}")]
    InvalidSymbol(String),

    /// The declared signature does not describe the Rust type being bound
    #[error("signature mismatch for '{symbol}': declared {declared}, bound as {bound}")]
    SignatureMismatch {
        symbol: String,
        declared: String,
        bound: String,
    },

    /// The native side faulted during a call
    #[error("native call faulted: {0}")]
    Call(String),
}

/// Coarse classification of [`FfiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LibraryLoad,
    SymbolResolution,
    Signature,
    Call,
}

impl FfiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FfiError::LibraryLoad { .. } | FfiError::NotLoaded(_) => ErrorKind::LibraryLoad,
            FfiError::SymbolResolution { .. } | FfiError::InvalidSymbol(_) => {
                ErrorKind::SymbolResolution
            }
            FfiError::SignatureMismatch { .. } => ErrorKind::Signature,
            FfiError::Call(_) => ErrorKind::Call,
        }
    }
}
