//! Scalar arithmetic (spec.md §3.2, §3.3): integer overflow and
//! division by zero both propagate as `Null` with a diagnostic rather
//! than panicking, matching the rest of the evaluator's empty-on-error
//! posture. Quantity arithmetic lives in `temporal_ops.rs` alongside the
//! other unit-aware operators.

use ql_diagnostics::{Diagnostic, DiagnosticCode};
use ql_model::{Quantity, Value};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

/// The result of a scalar arithmetic op: either a value, or `None`
/// (propagate as empty) with the diagnostic that explains why.
pub type ArithResult = Result<Option<Value>, Diagnostic>;

pub fn add(lhs: &Value, rhs: &Value) -> ArithResult {
    numeric_op(lhs, rhs, "+", |a, b| a.checked_add(b), |a, b| Some(a + b))
}

pub fn subtract(lhs: &Value, rhs: &Value) -> ArithResult {
    numeric_op(lhs, rhs, "-", |a, b| a.checked_sub(b), |a, b| Some(a - b))
}

pub fn multiply(lhs: &Value, rhs: &Value) -> ArithResult {
    numeric_op(lhs, rhs, "*", |a, b| a.checked_mul(b), |a, b| Some(a * b))
}

/// Division always promotes to `Decimal`, rounded to scale 8 per
/// spec.md §3.2 unless the result is exact at a smaller scale.
pub fn divide(lhs: &Value, rhs: &Value) -> ArithResult {
    let a = to_decimal(lhs);
    let b = to_decimal(rhs);
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(None);
    };
    if b.is_zero() {
        return Err(Diagnostic::error(
            DiagnosticCode::DivisionByZero,
            "division by zero",
        ));
    }
    let quotient = a / b;
    let rounded = quotient.round_dp_with_strategy(8, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    Ok(Some(Value::Decimal(rounded.normalize())))
}

/// Integer truncating division (CQL/FHIRPath `div`).
pub fn integer_divide(lhs: &Value, rhs: &Value) -> ArithResult {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => {
            if *b == 0 {
                return Err(Diagnostic::error(
                    DiagnosticCode::DivisionByZero,
                    "division by zero",
                ));
            }
            match a.checked_div(*b) {
                Some(q) => Ok(Some(Value::Integer(q))),
                None => Err(overflow_diagnostic("div")),
            }
        }
        _ => {
            let a = to_decimal(lhs);
            let b = to_decimal(rhs);
            let (Some(a), Some(b)) = (a, b) else {
                return Ok(None);
            };
            if b.is_zero() {
                return Err(Diagnostic::error(
                    DiagnosticCode::DivisionByZero,
                    "division by zero",
                ));
            }
            Ok(Some(Value::Decimal((a / b).trunc())))
        }
    }
}

/// Remainder (`mod`).
pub fn modulo(lhs: &Value, rhs: &Value) -> ArithResult {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => {
            if *b == 0 {
                return Err(Diagnostic::error(
                    DiagnosticCode::DivisionByZero,
                    "division by zero",
                ));
            }
            match a.checked_rem(*b) {
                Some(r) => Ok(Some(Value::Integer(r))),
                None => Err(overflow_diagnostic("mod")),
            }
        }
        _ => {
            let a = to_decimal(lhs);
            let b = to_decimal(rhs);
            let (Some(a), Some(b)) = (a, b) else {
                return Ok(None);
            };
            if b.is_zero() {
                return Err(Diagnostic::error(
                    DiagnosticCode::DivisionByZero,
                    "division by zero",
                ));
            }
            Ok(Some(Value::Decimal(a % b)))
        }
    }
}

pub fn negate(value: &Value) -> ArithResult {
    match value {
        Value::Integer(i) => match i.checked_neg() {
            Some(n) => Ok(Some(Value::Integer(n))),
            None => Err(overflow_diagnostic("-")),
        },
        Value::Long(l) => match l.checked_neg() {
            Some(n) => Ok(Some(Value::Long(n))),
            None => Err(overflow_diagnostic("-")),
        },
        Value::Decimal(d) => Ok(Some(Value::Decimal(-d))),
        Value::Quantity(q) => Ok(Some(Value::Quantity(Quantity::new(-q.value, q.unit.clone())))),
        _ => Ok(None),
    }
}

/// `^` (power): real-valued exponentiation, then rounded back to
/// `Decimal` scale 8 the same way division is, since there is no exact
/// rational representation in general.
pub fn power(lhs: &Value, rhs: &Value) -> ArithResult {
    let (Some(base), Some(exp)) = (to_decimal(lhs), to_decimal(rhs)) else {
        return Ok(None);
    };
    let result = if exp == exp.trunc() && exp.abs() < Decimal::from(64) {
        let exp_i = exp.to_i64().unwrap_or(0);
        base.checked_powi(exp_i)
    } else {
        base.checked_powd(exp)
    };
    match result {
        Some(r) => Ok(Some(Value::Decimal(
            r.round_dp_with_strategy(8, rust_decimal::RoundingStrategy::MidpointAwayFromZero),
        ))),
        None => Ok(None),
    }
}

fn overflow_diagnostic(op: &str) -> Diagnostic {
    Diagnostic::error(DiagnosticCode::Overflow, format!("integer overflow in `{op}`"))
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Long(l) => Some(Decimal::from(*l)),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// Shared dispatch for `+`/`-`/`*`: tries the narrowest common integer
/// type first (so overflow is detected at that width), widening to
/// `Long` then `Decimal` only when an operand already forces it.
fn numeric_op(
    lhs: &Value,
    rhs: &Value,
    op: &str,
    checked_i64: impl Fn(i64, i64) -> Option<i64>,
    decimal_op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
) -> ArithResult {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => {
            match checked_i64(*a as i64, *b as i64).and_then(|r| i32::try_from(r).ok()) {
                Some(r) => Ok(Some(Value::Integer(r))),
                None => Err(overflow_diagnostic(op)),
            }
        }
        (Value::Integer(_) | Value::Long(_), Value::Integer(_) | Value::Long(_)) => {
            let a = long_of(lhs);
            let b = long_of(rhs);
            match checked_i64(a, b) {
                Some(r) => Ok(Some(Value::Long(r))),
                None => Err(overflow_diagnostic(op)),
            }
        }
        (Value::Quantity(_), Value::Quantity(_)) | (Value::Quantity(_), _) | (_, Value::Quantity(_)) => {
            Ok(None) // quantity arithmetic is handled by temporal_ops::quantity_*
        }
        _ => {
            let (Some(a), Some(b)) = (to_decimal(lhs), to_decimal(rhs)) else {
                return Ok(None);
            };
            Ok(decimal_op(a, b).map(Value::Decimal))
        }
    }
}

fn long_of(value: &Value) -> i64 {
    match value {
        Value::Integer(i) => *i as i64,
        Value::Long(l) => *l,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_overflow_yields_diagnostic() {
        let result = add(&Value::Integer(i32::MAX), &Value::Integer(1));
        assert!(matches!(result, Err(d) if d.code == DiagnosticCode::Overflow));
    }

    #[test]
    fn integer_divide_min_by_minus_one_overflows_without_panicking() {
        let result = integer_divide(&Value::Integer(i32::MIN), &Value::Integer(-1));
        assert!(matches!(result, Err(d) if d.code == DiagnosticCode::Overflow));
    }

    #[test]
    fn modulo_min_by_minus_one_overflows_without_panicking() {
        let result = modulo(&Value::Integer(i32::MIN), &Value::Integer(-1));
        assert!(matches!(result, Err(d) if d.code == DiagnosticCode::Overflow));
    }

    #[test]
    fn division_by_zero_yields_diagnostic() {
        let result = divide(&Value::Integer(1), &Value::Integer(0));
        assert!(matches!(result, Err(d) if d.code == DiagnosticCode::DivisionByZero));
    }

    #[test]
    fn division_rounds_to_scale_eight() {
        let result = divide(&Value::Integer(1), &Value::Integer(3)).unwrap().unwrap();
        match result {
            Value::Decimal(d) => assert_eq!(d.scale(), 8),
            other => panic!("expected Decimal, got {other:?}"),
        }
    }

    #[test]
    fn integer_plus_integer_stays_integer() {
        let result = add(&Value::Integer(2), &Value::Integer(3)).unwrap().unwrap();
        assert_eq!(result, Value::Integer(5));
    }

    #[test]
    fn negating_quantity_flips_value_only() {
        let q = Quantity::new(Decimal::from(5), Some("mg".to_string()));
        let result = negate(&Value::Quantity(q)).unwrap().unwrap();
        match result {
            Value::Quantity(q) => assert_eq!(q.value, Decimal::from(-5)),
            other => panic!("expected Quantity, got {other:?}"),
        }
    }
}
