//! spec.md §8's four boundary cases and a sample of its universal
//! invariants.

use fhirlogic::diagnostics::DiagnosticCode;
use fhirlogic::model::{Collection, FhirNode, TemporalPrecision, Value};
use fhirlogic::{CancellationToken, Diagnostics, Engine, EngineConfig, Env};
use rstest::rstest;
use serde_json::json;

fn engine() -> Engine {
    let now = fhirlogic::model::PrecisionDateTime::new(
        chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap(),
        TemporalPrecision::Second,
        false,
    );
    Engine::new(EngineConfig::new(now, "UTC"))
}

fn eval_cql(engine: &Engine, library_name: &str, source: &str) -> (Option<Value>, Diagnostics) {
    let ast = engine.parse_cql(source).expect("parses");
    let compiled = engine.compile(ast).expect("compiles");
    engine.register_library(library_name, compiled);
    let env = Env::new();
    let cancellation = CancellationToken::new();
    engine
        .evaluate_definition(library_name, "Result", Collection::new(), &env, &cancellation)
        .expect("registered library")
}

fn single_definition(name: &str, expr_src: &str) -> String {
    format!("library {name} version '1.0.0'\ndefine \"Result\": {expr_src}")
}

#[rstest]
#[case::integer_overflow("2147483647 + 1", DiagnosticCode::Overflow)]
#[case::division_by_zero("1 / 0", DiagnosticCode::DivisionByZero)]
fn arithmetic_boundary_yields_null_and_diagnostic(
    #[case] expr_src: &str,
    #[case] expected_code: DiagnosticCode,
) {
    let engine = engine();
    let source = single_definition("Boundary", expr_src);
    let (value, diagnostics) = eval_cql(&engine, "Boundary", &source);
    assert_eq!(value, None);
    assert!(diagnostics.iter().any(|d| d.code == expected_code));
}

#[test]
fn cyclic_definitions_compile_but_evaluate_to_null() {
    let engine = engine();
    let source = "library Cycle version '1.0.0'\ndefine \"A\": \"B\"\ndefine \"B\": \"A\"";
    let ast = engine.parse_cql(source).expect("parses");
    let compiled = engine.compile(ast).expect("cyclic definitions compile");
    engine.register_library("Cycle", compiled);

    let env = Env::new();
    let cancellation = CancellationToken::new();
    let (value, diagnostics) = engine
        .evaluate_definition("Cycle", "A", Collection::new(), &env, &cancellation)
        .unwrap();
    assert_eq!(value, None);
    assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::CyclicDefinition));
}

#[test]
fn empty_string_is_not_an_empty_collection() {
    let engine = engine();
    let patient = json!({"resourceType": "Patient", "name": [{"family": ""}]});
    let focus = Collection::single(Value::Resource(FhirNode::from_json(patient)));
    let expr = engine.parse_fhirpath("Patient.name.family").unwrap();
    let env = Env::new();
    let cancellation = CancellationToken::new();
    let (value, diagnostics) = engine.evaluate_fhirpath(&expr, focus, &env, &cancellation);
    assert!(diagnostics.is_empty());
    assert_eq!(value, Value::List(Collection::single(Value::String(String::new()))));

    let empty_focus_expr = engine.parse_fhirpath("Patient.name.family").unwrap();
    let (empty_value, _) =
        engine.evaluate_fhirpath(&empty_focus_expr, Collection::new(), &env, &cancellation);
    assert_eq!(empty_value, Value::List(Collection::new()));
    assert_ne!(value, empty_value);
}

// Universal invariant 7 (spec.md §8): for empty focus, every FHIRPath
// path expression yields empty.
#[test]
fn empty_focus_yields_empty_for_path_expressions() {
    let engine = engine();
    let expr = engine.parse_fhirpath("Patient.name.family").unwrap();
    let env = Env::new();
    let cancellation = CancellationToken::new();
    let (value, diagnostics) = engine.evaluate_fhirpath(&expr, Collection::new(), &env, &cancellation);
    assert!(diagnostics.is_empty());
    assert_eq!(value, Value::List(Collection::new()));
}

// Universal invariant 2 (spec.md §8): equality is reflexive on
// non-null values, equivalence is reflexive even on null.
#[test]
fn equality_is_reflexive_and_equivalence_handles_null() {
    let engine = engine();
    let (equal, diagnostics) = eval_cql(
        &engine,
        "Reflexive",
        &single_definition("Reflexive", "1 = 1"),
    );
    assert!(diagnostics.is_empty());
    assert_eq!(equal, Some(Value::Boolean(true)));

    let (equivalent_null, _) = eval_cql(
        &engine,
        "ReflexiveNull",
        &single_definition("ReflexiveNull", "null ~ null"),
    );
    assert_eq!(equivalent_null, Some(Value::Boolean(true)));
}

// Universal invariant 5 (spec.md §8): exactly one Allen relation holds
// between any two bounded intervals.
#[test]
fn exactly_one_allen_relation_holds() {
    use fhirlogic::model::AllenRelation;

    let low_a = Value::Integer(1);
    let high_a = Value::Integer(3);
    let low_b = Value::Integer(2);
    let high_b = Value::Integer(5);
    let a = fhirlogic::model::Interval::new(Some(low_a), Some(high_a), true, true).unwrap();
    let b = fhirlogic::model::Interval::new(Some(low_b), Some(high_b), true, true).unwrap();

    let relation = a.allen_relation(&b);
    let inverse = b.allen_relation(&a);
    assert_eq!(relation, AllenRelation::Overlaps);
    assert_eq!(inverse, AllenRelation::OverlappedBy);
}
