//! Collection-algebra built-ins (spec.md §4.3 "Collections"). Each
//! operation takes its receiver as `args[0]`, already coerced to a
//! `Value::List` by the evaluator.

use crate::operation::{Operation, OperationError, OperationResult};
use ql_model::{Collection, Value};

fn as_collection<'a>(name: &'static str, value: &'a Value) -> Result<&'a Collection, OperationError> {
    match value {
        Value::List(c) => Ok(c),
        other => Err(OperationError::WrongType {
            name,
            detail: format!("expected a collection, found {}", other.type_name()),
        }),
    }
}

macro_rules! binary_collection_op {
    ($struct_name:ident, $fn_name:literal, $method:ident) => {
        pub struct $struct_name;
        impl Operation for $struct_name {
            fn name(&self) -> &'static str {
                $fn_name
            }
            fn min_arity(&self) -> usize {
                2
            }
            fn invoke(&self, args: &[Value]) -> OperationResult {
                let lhs = as_collection($fn_name, &args[0])?;
                let rhs = as_collection($fn_name, &args[1])?;
                Ok(Value::List(lhs.$method(rhs)))
            }
        }
    };
}

binary_collection_op!(UnionFn, "union", union);
binary_collection_op!(IntersectFn, "intersect", intersect);
binary_collection_op!(ExceptFn, "except", except);

pub struct CountFn;
impl Operation for CountFn {
    fn name(&self) -> &'static str {
        "count"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::Integer(c.len() as i32))
    }
}

pub struct EmptyFn;
impl Operation for EmptyFn {
    fn name(&self) -> &'static str {
        "empty"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::Boolean(c.is_empty()))
    }
}

pub struct FirstFn;
impl Operation for FirstFn {
    fn name(&self) -> &'static str {
        "first"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::List(match c.first() {
            Some(v) => Collection::single(v.clone()),
            None => Collection::new(),
        }))
    }
}

pub struct LastFn;
impl Operation for LastFn {
    fn name(&self) -> &'static str {
        "last"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::List(match c.last() {
            Some(v) => Collection::single(v.clone()),
            None => Collection::new(),
        }))
    }
}

pub struct DistinctFn;
impl Operation for DistinctFn {
    fn name(&self) -> &'static str {
        "distinct"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::List(c.distinct()))
    }
}

pub struct FlattenFn;
impl Operation for FlattenFn {
    fn name(&self) -> &'static str {
        "flatten"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::List(c.flatten()))
    }
}

/// No-argument `exists()`: true if the receiver is non-empty. The
/// predicate form `exists(x => ...)` is handled by the evaluator as a
/// lambda special form, not through the registry.
pub struct ExistsFn;
impl Operation for ExistsFn {
    fn name(&self) -> &'static str {
        "exists"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        let c = as_collection(self.name(), &args[0])?;
        Ok(Value::Boolean(!c.is_empty()))
    }
}

/// `contains` doubles as collection membership and string substring
/// search (FHIRPath overloads the name on receiver type).
pub struct ContainsFn;
impl Operation for ContainsFn {
    fn name(&self) -> &'static str {
        "contains"
    }
    fn min_arity(&self) -> usize {
        2
    }
    fn invoke(&self, args: &[Value]) -> OperationResult {
        match (&args[0], &args[1]) {
            (Value::String(haystack), Value::String(needle)) => {
                Ok(Value::Boolean(haystack.contains(needle.as_str())))
            }
            _ => {
                let c = as_collection(self.name(), &args[0])?;
                Ok(Value::Boolean(c.contains(&args[1])))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: Vec<Value>) -> Value {
        Value::List(Collection::from_vec(values))
    }

    #[test]
    fn count_returns_length() {
        let v = list(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(CountFn.invoke(&[v]).unwrap(), Value::Integer(2));
    }

    #[test]
    fn intersect_matches_spec_scenario_six() {
        let a = list(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        let b = list(vec![Value::Integer(2), Value::Integer(3), Value::Integer(4)]);
        let result = IntersectFn.invoke(&[a, b]).unwrap();
        assert_eq!(
            result,
            list(vec![Value::Integer(2), Value::Integer(3)])
        );
    }

    #[test]
    fn empty_on_empty_collection_is_true() {
        let v = list(vec![]);
        assert_eq!(EmptyFn.invoke(&[v]).unwrap(), Value::Boolean(true));
    }
}
