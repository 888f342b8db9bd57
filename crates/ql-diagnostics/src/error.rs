//! Internal API-level errors, distinct from [`crate::Diagnostic`].
//!
//! An `EngineError` is returned by `Result`-returning API calls for
//! conditions the caller made a mistake about (unknown library name,
//! malformed config) -- not for language-level conditions, which always
//! surface as a [`crate::Diagnostic`] alongside a value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no library registered under name {0:?}")]
    UnknownLibrary(String),

    #[error("no definition named {0:?} in library {1:?}")]
    UnknownDefinition(String, String),

    #[error("compilation failed with {0} error(s)")]
    CompilationFailed(usize),

    #[error("recursion limit of {0} exceeded")]
    RecursionLimitExceeded(usize),
}
