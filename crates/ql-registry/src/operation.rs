//! The [`Operation`] trait for built-in functions that operate purely on
//! already-evaluated [`Value`]s.
//!
//! Functions that need to evaluate a lambda per element (`where`, `select`,
//! `aggregate`, `repeat`) are NOT registry operations: they need the
//! expression evaluator itself to run their body, so the tree-walker in
//! `ql-evaluator` implements them directly as special forms. This trait
//! covers the remainder — string, math, and collection functions whose
//! entire contract is "values in, a value out".

use ql_diagnostics::{Diagnostic, DiagnosticCode};
use ql_model::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum OperationError {
    UnknownFunction(String),
    WrongArity {
        name: &'static str,
        min: usize,
        max: Option<usize>,
        actual: usize,
    },
    WrongType {
        name: &'static str,
        detail: String,
    },
    Overflow {
        name: &'static str,
    },
    DivisionByZero {
        name: &'static str,
    },
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFunction(name) => write!(f, "unknown function '{name}'"),
            Self::WrongArity {
                name, min, max, actual,
            } => match max {
                Some(max) => write!(
                    f,
                    "'{name}' expects between {min} and {max} arguments, got {actual}"
                ),
                None => write!(f, "'{name}' expects at least {min} arguments, got {actual}"),
            },
            Self::WrongType { name, detail } => write!(f, "'{name}': {detail}"),
            Self::Overflow { name } => write!(f, "'{name}' overflowed"),
            Self::DivisionByZero { name } => write!(f, "'{name}' divided by zero"),
        }
    }
}

impl From<OperationError> for Diagnostic {
    fn from(err: OperationError) -> Self {
        let code = match &err {
            OperationError::UnknownFunction(_) => DiagnosticCode::UnresolvedIdentifier,
            OperationError::WrongArity { .. } | OperationError::WrongType { .. } => {
                DiagnosticCode::TypeMismatch {
                    expected: "valid arguments".to_string(),
                    actual: err.to_string(),
                }
            }
            OperationError::Overflow { .. } => DiagnosticCode::Overflow,
            OperationError::DivisionByZero { .. } => DiagnosticCode::DivisionByZero,
        };
        Diagnostic::warning(code, err.to_string())
    }
}

pub type OperationResult = Result<Value, OperationError>;

/// A built-in function over already-materialized values.
pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    fn min_arity(&self) -> usize;

    /// `None` means variadic with no upper bound.
    fn max_arity(&self) -> Option<usize> {
        Some(self.min_arity())
    }

    fn invoke(&self, args: &[Value]) -> OperationResult;

    fn check_arity(&self, args: &[Value]) -> Result<(), OperationError> {
        let min = self.min_arity();
        let max = self.max_arity();
        let ok = args.len() >= min && max.map_or(true, |max| args.len() <= max);
        if ok {
            Ok(())
        } else {
            Err(OperationError::WrongArity {
                name: self.name(),
                min,
                max,
                actual: args.len(),
            })
        }
    }
}
