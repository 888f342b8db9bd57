//! Numeric built-ins (FHIRPath §"Math functions"). Decimal throughout —
//! no `f64` substitution (spec.md §9 "Arbitrary-precision decimals").

use crate::operation::{Operation, OperationError, OperationResult};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use ql_model::Value;

fn as_decimal(name: &'static str, value: &Value) -> Result<Decimal, OperationError> {
    match value {
        Value::Decimal(d) => Ok(*d),
        Value::Integer(i) => Ok(Decimal::from(*i)),
        Value::Long(l) => Ok(Decimal::from(*l)),
        other => Err(OperationError::WrongType {
            name,
            detail: format!("expected a number, found {}", other.type_name()),
        }),
    }
}

macro_rules! unary_decimal_op {
    ($struct_name:ident, $fn_name:literal, $body:expr) => {
        pub struct $struct_name;
        impl Operation for $struct_name {
            fn name(&self) -> &'static str {
                $fn_name
            }
            fn min_arity(&self) -> usize {
                1
            }
            fn invoke(&self, args: &[Value]) -> OperationResult {
                let d = as_decimal($fn_name, &args[0])?;
                Ok(Value::Decimal(($body)(d)))
            }
        }
    };
}

unary_decimal_op!(AbsFn, "abs", |d: Decimal| d.abs());
unary_decimal_op!(CeilingFn, "ceiling", |d: Decimal| d.ceil());
unary_decimal_op!(FloorFn, "floor", |d: Decimal| d.floor());
unary_decimal_op!(TruncateFn, "truncate", |d: Decimal| d.trunc());

pub struct RoundFn;
impl Operation for RoundFn {
    fn name(&self) -> &'static str {
        "round"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn max_arity(&self) -> Option<usize> {
        Some(2)
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let d = as_decimal(self.name(), &args[0])?;
        let scale = match args.get(1) {
            Some(Value::Integer(n)) if *n >= 0 => *n as u32,
            Some(_) => {
                return Err(OperationError::WrongType {
                    name: self.name(),
                    detail: "precision must be a non-negative Integer".to_string(),
                })
            }
            None => 0,
        };
        Ok(Value::Decimal(
            d.round_dp_with_strategy(scale, rust_decimal::RoundingStrategy::MidpointAwayFromZero),
        ))
    }
}

/// `sqrt` of a negative number is undefined in CQL/FHIRPath and yields
/// empty/Null rather than a diagnostic, matching `0/0`-style propagation.
pub struct SqrtFn;
impl Operation for SqrtFn {
    fn name(&self) -> &'static str {
        "sqrt"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let d = as_decimal(self.name(), &args[0])?;
        match d.sqrt() {
            Some(root) => Ok(Value::Decimal(root)),
            None => Ok(Value::List(ql_model::Collection::new())),
        }
    }
}

pub struct LnFn;
impl Operation for LnFn {
    fn name(&self) -> &'static str {
        "ln"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let d = as_decimal(self.name(), &args[0])?;
        if d <= Decimal::ZERO {
            return Ok(Value::List(ql_model::Collection::new()));
        }
        Ok(Value::Decimal(d.ln()))
    }
}

pub struct ExpFn;
impl Operation for ExpFn {
    fn name(&self) -> &'static str {
        "exp"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let d = as_decimal(self.name(), &args[0])?;
        Ok(Value::Decimal(d.exp()))
    }
}

/// `log(base)`: not in `rust_decimal::MathematicalOps`, so computed from
/// `ln` (same domain restriction as `LnFn`).
pub struct LogFn;
impl Operation for LogFn {
    fn name(&self) -> &'static str {
        "log"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let d = as_decimal(self.name(), &args[0])?;
        let base = as_decimal(self.name(), &args[1])?;
        if d <= Decimal::ZERO || base <= Decimal::ZERO || base == Decimal::ONE {
            return Ok(Value::List(ql_model::Collection::new()));
        }
        let result = d.ln() / base.ln();
        Ok(Value::Decimal(result))
    }
}

pub struct PowerFn;
impl Operation for PowerFn {
    fn name(&self) -> &'static str {
        "power"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let base = as_decimal(self.name(), &args[0])?;
        let exponent = as_decimal(self.name(), &args[1])?;
        // `powd` is exact for integral exponents; otherwise fall back to
        // real-valued exponentiation via f64 (spec.md §4.3 "Arithmetic"
        // only mandates Decimal rounding of the result, not the
        // intermediate computation).
        if exponent.fract().is_zero() {
            Ok(Value::Decimal(base.powd(exponent)))
        } else {
            let b = base.to_f64().ok_or_else(|| OperationError::Overflow { name: self.name() })?;
            let e = exponent.to_f64().ok_or_else(|| OperationError::Overflow { name: self.name() })?;
            Decimal::from_f64(b.powf(e))
                .map(Value::Decimal)
                .ok_or(OperationError::Overflow { name: self.name() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_half_away_from_zero() {
        let args = vec![Value::Decimal(dec!(2.5))];
        assert_eq!(RoundFn.invoke(&args).unwrap(), Value::Decimal(dec!(3)));
    }

    #[test]
    fn sqrt_of_negative_is_empty() {
        let args = vec![Value::Decimal(dec!(-4))];
        assert_eq!(
            SqrtFn.invoke(&args).unwrap(),
            Value::List(ql_model::Collection::new())
        );
    }

    #[test]
    fn abs_of_negative_decimal() {
        let args = vec![Value::Decimal(dec!(-3.5))];
        assert_eq!(AbsFn.invoke(&args).unwrap(), Value::Decimal(dec!(3.5)));
    }
}
