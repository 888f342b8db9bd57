//! Built-in function table shared by the FHIRPath and CQL evaluators.
//!
//! Scope note: this crate only covers functions whose entire contract is
//! values-in/value-out. Lambda-taking forms (`where`, `select`, `all`,
//! `aggregate`, `repeat`) and context-dependent forms (`Today`, `Now`,
//! `resolve`) are evaluated directly by `ql-evaluator`, which alone holds
//! the expression evaluator and evaluation context they need.

pub mod functions;
pub mod operation;
pub mod registry;

pub use functions::build_standard_registry;
pub use operation::{Operation, OperationError, OperationResult};
pub use registry::Registry;

#[cfg(test)]
mod tests {
    use super::*;
    use ql_model::{Collection, Value};

    #[test]
    fn standard_registry_resolves_count() {
        let registry = build_standard_registry();
        let list = Value::List(Collection::from_vec(vec![Value::Integer(1), Value::Integer(2)]));
        assert_eq!(registry.call("count", &[list]).unwrap(), Value::Integer(2));
    }

    #[test]
    fn unknown_function_is_reported() {
        let registry = build_standard_registry();
        let err = registry.call("doesNotExist", &[]).unwrap_err();
        assert!(matches!(err, OperationError::UnknownFunction(_)));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let registry = build_standard_registry();
        let err = registry.call("upper", &[]).unwrap_err();
        assert!(matches!(err, OperationError::WrongArity { .. }));
    }
}
