//! Re-exports `ql-diagnostics::EngineError` as this crate's own `Result`
//! alias (spec.md §7: distinct from `Diagnostic`, which carries
//! language-level, non-aborting conditions).

pub use ql_diagnostics::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;
