use thiserror::Error;

/// Errors raised while constructing values directly (outside of
/// evaluation, where the same conditions degrade to Null + diagnostic
/// instead -- see `ql-evaluator`).
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("interval low {low} is greater than high {high}")]
    InvalidInterval { low: String, high: String },

    #[error("incommensurable units: {lhs} and {rhs}")]
    IncommensurableUnits { lhs: String, rhs: String },

    #[error("unknown UCUM unit: {0}")]
    UnknownUnit(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
