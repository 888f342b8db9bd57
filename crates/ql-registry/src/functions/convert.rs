//! Explicit conversion built-ins (FHIRPath §"Conversion functions").
//! Failed conversions yield an empty list rather than a diagnostic,
//! matching `toInteger()`/`toDecimal()`'s documented "returns `{}` on
//! failure" contract.

use crate::operation::{Operation, OperationResult};
use rust_decimal::Decimal;
use std::str::FromStr;
use ql_model::{Collection, Value};

fn empty() -> Value {
    Value::List(Collection::new())
}

fn single(v: Value) -> Value {
    Value::List(Collection::single(v))
}

pub struct ToStringFn;
impl Operation for ToStringFn {
    fn name(&self) -> &'static str {
        "toString"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let rendered = match &args[0] {
            Value::String(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Quantity(q) => q.to_string(),
            other => other.type_name().to_string(),
        };
        Ok(Value::String(rendered))
    }
}

pub struct ToIntegerFn;
impl Operation for ToIntegerFn {
    fn name(&self) -> &'static str {
        "toInteger"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        Ok(match &args[0] {
            Value::Integer(i) => single(Value::Integer(*i)),
            Value::Long(l) => i32::try_from(*l).map(Value::Integer).map(single).unwrap_or_else(|_| empty()),
            Value::Boolean(b) => single(Value::Integer(if *b { 1 } else { 0 })),
            Value::String(s) => s
                .trim()
                .parse::<i32>()
                .map(Value::Integer)
                .map(single)
                .unwrap_or_else(|_| empty()),
            Value::Decimal(d) => {
                if d.fract().is_zero() {
                    d.to_string()
                        .parse::<i32>()
                        .map(Value::Integer)
                        .map(single)
                        .unwrap_or_else(|_| empty())
                } else {
                    empty()
                }
            }
            _ => empty(),
        })
    }
}

pub struct ToDecimalFn;
impl Operation for ToDecimalFn {
    fn name(&self) -> &'static str {
        "toDecimal"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        Ok(match &args[0] {
            Value::Decimal(d) => single(Value::Decimal(*d)),
            Value::Integer(i) => single(Value::Decimal(Decimal::from(*i))),
            Value::Long(l) => single(Value::Decimal(Decimal::from(*l))),
            Value::String(s) => Decimal::from_str(s.trim())
                .map(Value::Decimal)
                .map(single)
                .unwrap_or_else(|_| empty()),
            Value::Boolean(b) => single(Value::Decimal(Decimal::from(if *b { 1 } else { 0 }))),
            _ => empty(),
        })
    }
}

pub struct ToBooleanFn;
impl Operation for ToBooleanFn {
    fn name(&self) -> &'static str {
        "toBoolean"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        Ok(match &args[0] {
            Value::Boolean(b) => single(Value::Boolean(*b)),
            Value::Integer(1) => single(Value::Boolean(true)),
            Value::Integer(0) => single(Value::Boolean(false)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" | "1.0" => single(Value::Boolean(true)),
                "false" | "f" | "no" | "n" | "0" | "0.0" => single(Value::Boolean(false)),
                _ => empty(),
            },
            _ => empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_integer_parses_numeric_string() {
        let args = vec![Value::String("42".into())];
        assert_eq!(
            ToIntegerFn.invoke(&args).unwrap(),
            single(Value::Integer(42))
        );
    }

    #[test]
    fn to_integer_rejects_non_numeric_string() {
        let args = vec![Value::String("abc".into())];
        assert_eq!(ToIntegerFn.invoke(&args).unwrap(), empty());
    }

    #[test]
    fn to_boolean_recognizes_yes_no() {
        assert_eq!(
            ToBooleanFn.invoke(&[Value::String("yes".into())]).unwrap(),
            single(Value::Boolean(true))
        );
    }
}
