//! Public evaluation API (spec.md §6.1).
//!
//! Internally every expression evaluates to a [`Collection`]; empty
//! stands for Null/absence in both languages. This module is the only
//! place that translates that internal uniformity into the differing
//! external shapes FHIRPath and CQL expect: `evaluate_fhirpath` always
//! hands back a `Value::List`, while the CQL-facing entry points unwrap
//! empty to `None` and a singleton to its bare scalar, per spec.md §3.4.

pub mod arithmetic;
pub mod context;
pub mod eval;
pub mod library;
pub mod navigator;
pub mod temporal_ops;

use rustc_hash::FxHashMap;

use ql_analyzer::CompiledLibrary;
use ql_ast::Expr;
use ql_diagnostics::Diagnostics;
use ql_model::{Collection, Value};
use ql_registry::{build_standard_registry, Registry};

pub use context::{CancellationToken, EvalConfig, Env};
pub use eval::Evaluator;
pub use library::LibraryManager;

/// Evaluates a single FHIRPath expression against `focus`. The result is
/// always a `Value::List` -- an empty collection when nothing matched,
/// a singleton when one value resulted, and a `List` otherwise, so
/// callers never have to special-case cardinality (spec.md §6.1).
pub fn evaluate_fhirpath(
    expr: &Expr,
    focus: Collection,
    env: &Env,
    config: &EvalConfig,
    cancellation: &CancellationToken,
) -> (Value, Diagnostics) {
    let registry = build_standard_registry();
    let mut evaluator = Evaluator::new(&registry, None, config, env, cancellation, focus);
    let result = evaluator.eval(expr);
    (Value::List(result), evaluator.diagnostics.into_iter().collect())
}

/// Evaluates a single named `define` in a compiled library. CQL's scalar
/// context collapses cardinality: no result is `None`, one result is
/// `Some` of the bare value, more than one is `Some(Value::List(..))`
/// (spec.md §3.4's CQL/FHIRPath API-boundary split).
pub fn evaluate_definition(
    library: &CompiledLibrary,
    name: &str,
    focus: Collection,
    env: &Env,
    config: &EvalConfig,
    cancellation: &CancellationToken,
) -> (Option<Value>, Diagnostics) {
    let registry = build_standard_registry();
    let manager = LibraryManager::new(library.clone());
    let (value, diagnostics) =
        evaluate_definition_with(&registry, &manager, name, focus, env, config, cancellation);
    (value, diagnostics)
}

/// Evaluates every public `define` in a library, returning a map keyed
/// by definition name. Private (`access: Private`) definitions are
/// still evaluated if referenced by a public one (`LibraryManager`
/// memoizes), but are not surface results themselves here -- matching
/// CQL's `define` visibility rule (spec.md §3.3).
pub fn evaluate_all(
    library: &CompiledLibrary,
    focus: Collection,
    env: &Env,
    config: &EvalConfig,
    cancellation: &CancellationToken,
) -> (FxHashMap<String, Option<Value>>, Diagnostics) {
    let registry = build_standard_registry();
    let manager = LibraryManager::new(library.clone());
    let mut results = FxHashMap::default();
    let mut diagnostics = Diagnostics::new();

    let public_names: Vec<String> = manager
        .library()
        .definitions
        .iter()
        .filter(|(_, def)| def.access == ql_ast::AccessLevel::Public)
        .map(|(name, _)| name.clone())
        .collect();

    for name in public_names {
        let (value, diags) = evaluate_definition_with(
            &registry,
            &manager,
            &name,
            focus.clone(),
            env,
            config,
            cancellation,
        );
        results.insert(name, value);
        diagnostics.extend(diags);
        if cancellation.is_cancelled() {
            break;
        }
    }

    (results, diagnostics)
}

fn evaluate_definition_with(
    registry: &Registry,
    manager: &LibraryManager,
    name: &str,
    focus: Collection,
    env: &Env,
    config: &EvalConfig,
    cancellation: &CancellationToken,
) -> (Option<Value>, Diagnostics) {
    let mut evaluator = Evaluator::new(registry, Some(manager), config, env, cancellation, focus);
    let origin = ql_diagnostics::Position {
        offset: 0,
        line: 1,
        column: 1,
    };
    let expr = Expr::new(
        ql_ast::ExprKind::Identifier(name.to_string()),
        ql_diagnostics::Span::point(origin),
    );
    let result = evaluator.eval(&expr);
    let value = match result.len() {
        0 => None,
        1 => Some(result.into_vec().remove(0)),
        _ => Some(Value::List(result)),
    };
    (value, evaluator.diagnostics.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_model::{PrecisionDateTime, TemporalPrecision};

    fn config() -> EvalConfig {
        EvalConfig::new(
            PrecisionDateTime::new(
                chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap(),
                TemporalPrecision::Second,
                false,
            ),
            "UTC",
        )
    }

    #[test]
    fn evaluate_fhirpath_wraps_result_in_list() {
        let expr = ql_parser::parse_fhirpath("1 + 2").unwrap();
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let (value, diagnostics) =
            evaluate_fhirpath(&expr, Collection::new(), &env, &config(), &cancellation);
        assert!(diagnostics.is_empty());
        match value {
            Value::List(c) => assert_eq!(c.into_vec(), vec![Value::Integer(3)]),
            other => panic!("expected Value::List, got {other:?}"),
        }
    }

    #[test]
    fn evaluate_definition_unwraps_singleton() {
        let ast = ql_parser::parse_cql(
            r#"
            library Demo version '1.0.0'
            define "Answer": 42
            "#,
        )
        .unwrap();
        let compiled = ql_analyzer::compile(ast).unwrap();
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let (value, diagnostics) = evaluate_definition(
            &compiled,
            "Answer",
            Collection::new(),
            &env,
            &config(),
            &cancellation,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(value, Some(Value::Integer(42)));
    }

    #[test]
    fn evaluate_all_covers_public_definitions() {
        let ast = ql_parser::parse_cql(
            r#"
            library Demo version '1.0.0'
            define "A": 1
            define "B": 2
            "#,
        )
        .unwrap();
        let compiled = ql_analyzer::compile(ast).unwrap();
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let (results, diagnostics) =
            evaluate_all(&compiled, Collection::new(), &env, &config(), &cancellation);
        assert!(diagnostics.is_empty());
        assert_eq!(results.get("A"), Some(&Some(Value::Integer(1))));
        assert_eq!(results.get("B"), Some(&Some(Value::Integer(2))));
    }
}
