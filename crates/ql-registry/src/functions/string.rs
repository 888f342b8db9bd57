//! String built-ins (FHIRPath §"String manipulation functions").

use crate::operation::{Operation, OperationError, OperationResult};
use ql_model::{Collection, Value};

fn as_str<'a>(name: &'static str, value: &'a Value) -> Result<&'a str, OperationError> {
    match value {
        Value::String(s) => Ok(s.as_str()),
        other => Err(OperationError::WrongType {
            name,
            detail: format!("expected a string, found {}", other.type_name()),
        }),
    }
}

macro_rules! unary_string_op {
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
                let s = as_str($fn_name, &args[0])?;
                Ok(Value::String(($body)(s)))
            }
        }
    };
}

unary_string_op!(UpperFn, "upper", |s: &str| s.to_uppercase());
unary_string_op!(LowerFn, "lower", |s: &str| s.to_lowercase());
unary_string_op!(TrimFn, "trim", |s: &str| s.trim().to_string());

pub struct LengthFn;
impl Operation for LengthFn {
    fn name(&self) -> &'static str {
        "length"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        match &args[0] {
            Value::String(s) => Ok(Value::Integer(s.chars().count() as i32)),
            Value::List(c) => Ok(Value::Integer(c.len() as i32)),
            other => Err(OperationError::WrongType {
                name: self.name(),
                detail: format!("expected String or List, found {}", other.type_name()),
            }),
        }
    }
}

pub struct StartsWithFn;
impl Operation for StartsWithFn {
    fn name(&self) -> &'static str {
        "startsWith"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let s = as_str(self.name(), &args[0])?;
        let prefix = as_str(self.name(), &args[1])?;
        Ok(Value::Boolean(s.starts_with(prefix)))
    }
}

pub struct EndsWithFn;
impl Operation for EndsWithFn {
    fn name(&self) -> &'static str {
        "endsWith"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let s = as_str(self.name(), &args[0])?;
        let suffix = as_str(self.name(), &args[1])?;
        Ok(Value::Boolean(s.ends_with(suffix)))
    }
}

pub struct IndexOfFn;
impl Operation for IndexOfFn {
    fn name(&self) -> &'static str {
        "indexOf"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let s = as_str(self.name(), &args[0])?;
        let needle = as_str(self.name(), &args[1])?;
        // FHIRPath indexOf counts Unicode scalar values, not bytes.
        let byte_pos = s.find(needle);
        let value = match byte_pos {
            Some(byte_idx) => s[..byte_idx].chars().count() as i32,
            None => -1,
        };
        Ok(Value::Integer(value))
    }
}

pub struct SubstringFn;
impl Operation for SubstringFn {
    fn name(&self) -> &'static str {
        "substring"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn max_arity(&self) -> Option<usize> {
        Some(3)
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let s = as_str(self.name(), &args[0])?;
        let start = match &args[1] {
            Value::Integer(i) if *i >= 0 => *i as usize,
            _ => {
                return Err(OperationError::WrongType {
                    name: self.name(),
                    detail: "start index must be a non-negative Integer".to_string(),
                })
            }
        };
        let chars: Vec<char> = s.chars().collect();
        if start >= chars.len() {
            return Ok(Value::List(Collection::new()));
        }
        let end = match args.get(2) {
            Some(Value::Integer(len)) => (start + (*len).max(0) as usize).min(chars.len()),
            _ => chars.len(),
        };
        let result: String = chars[start..end].iter().collect();
        Ok(Value::String(result))
    }
}

pub struct ReplaceFn;
impl Operation for ReplaceFn {
    fn name(&self) -> &'static str {
        "replace"
    }
    fn min_arity(&self) -> usize {
        3
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let s = as_str(self.name(), &args[0])?;
        let pattern = as_str(self.name(), &args[1])?;
        let replacement = as_str(self.name(), &args[2])?;
        Ok(Value::String(s.replace(pattern, replacement)))
    }
}

pub struct SplitFn;
impl Operation for SplitFn {
    fn name(&self) -> &'static str {
        "split"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let s = as_str(self.name(), &args[0])?;
        let separator = as_str(self.name(), &args[1])?;
        let parts = if separator.is_empty() {
            vec![Value::String(s.to_string())]
        } else {
            s.split(separator)
                .map(|p| Value::String(p.to_string()))
                .collect()
        };
        Ok(Value::List(Collection::from_vec(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_uppercases_ascii() {
        assert_eq!(
            UpperFn.invoke(&[Value::String("smith".into())]).unwrap(),
            Value::String("SMITH".into())
        );
    }

    #[test]
    fn substring_honors_optional_length() {
        let args = vec![
            Value::String("hello world".into()),
            Value::Integer(6),
            Value::Integer(5),
        ];
        assert_eq!(
            SubstringFn.invoke(&args).unwrap(),
            Value::String("world".into())
        );
    }

    #[test]
    fn index_of_counts_unicode_scalars() {
        let args = vec![Value::String("café au lait".into()), Value::String("au".into())];
        assert_eq!(IndexOfFn.invoke(&args).unwrap(), Value::Integer(5));
    }

    #[test]
    fn index_of_missing_returns_negative_one() {
        let args = vec![Value::String("abc".into()), Value::String("z".into())];
        assert_eq!(IndexOfFn.invoke(&args).unwrap(), Value::Integer(-1));
    }
}
