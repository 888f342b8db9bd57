//! The runtime `Value` universe (spec.md §3.1).
//!
//! `Value` never represents absence; absence is modeled one level up as
//! an empty `Collection` (FHIRPath) or as `None` (CQL scalar context).
//! Three-valued Boolean logic is implemented on `Option<bool>` in
//! `ql-evaluator`, not here -- this module only defines the value shapes
//! and their structural equality/ordering.

use crate::code::{Code, Concept};
use crate::interval::Interval;
use crate::quantity::{Quantity, Ratio};
use crate::resource::FhirNode;
use crate::temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime};
use crate::tuple::Tuple;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
    String(String),
    Date(PrecisionDate),
    DateTime(PrecisionDateTime),
    Time(PrecisionTime),
    Quantity(Quantity),
    Ratio(Ratio),
    Code(Code),
    Concept(Concept),
    Tuple(Tuple),
    Interval(Interval),
    List(Collection),
    Resource(FhirNode),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Long(_) => "Long",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::Time(_) => "Time",
            Value::Quantity(_) => "Quantity",
            Value::Ratio(_) => "Ratio",
            Value::Code(_) => "Code",
            Value::Concept(_) => "Concept",
            Value::Tuple(_) => "Tuple",
            Value::Interval(_) => "Interval",
            Value::List(_) => "List",
            Value::Resource(_) => "Resource",
        }
    }

    /// Structural `=`. Returns `None` when equality is undefined at this
    /// precision/type pairing (propagates to CQL/FHIRPath Null per
    /// spec.md §3.1/§4.3) rather than `Some(false)`.
    pub fn equals(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
            (Value::Integer(a), Value::Integer(b)) => Some(a == b),
            (Value::Long(a), Value::Long(b)) => Some(a == b),
            (Value::Integer(a), Value::Long(b)) | (Value::Long(b), Value::Integer(a)) => {
                Some(*a as i64 == *b)
            }
            (Value::Decimal(a), Value::Decimal(b)) => Some(a == b),
            (Value::Integer(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Integer(a)) => {
                Some(Decimal::from(*a) == *b)
            }
            (Value::String(a), Value::String(b)) => Some(a == b),
            (Value::Date(a), Value::Date(b)) => a.compare(b).map(|o| o == Ordering::Equal),
            (Value::DateTime(a), Value::DateTime(b)) => {
                a.compare(b).map(|o| o == Ordering::Equal)
            }
            (Value::Time(a), Value::Time(b)) => a.compare(b).map(|o| o == Ordering::Equal),
            (Value::Quantity(a), Value::Quantity(b)) => a
                .convert_to(b.unit.as_deref().unwrap_or("1"))
                .map(|converted| converted == b.value),
            (Value::Code(a), Value::Code(b)) => Some(a == b),
            (Value::Tuple(a), Value::Tuple(b)) => {
                if a.0.len() != b.0.len() {
                    return Some(false);
                }
                for (k, v) in a.iter() {
                    match b.get(k).and_then(|bv| v.equals(bv)) {
                        Some(true) => continue,
                        _ => return Some(false),
                    }
                }
                Some(true)
            }
            (Value::Interval(a), Value::Interval(b)) => Some(
                a.low_closed == b.low_closed
                    && a.high_closed == b.high_closed
                    && endpoint_equal(a.low(), b.low())
                    && endpoint_equal(a.high(), b.high()),
            ),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.equals(y) {
                        Some(true) => continue,
                        _ => return Some(false),
                    }
                }
                Some(true)
            }
            _ => None,
        }
    }

    /// `~` equivalence: Nulls/empty equal each other, strings compare
    /// case-insensitively with whitespace normalized, ordering in
    /// collections is ignored (spec.md §3.1).
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => normalize_ws(a) == normalize_ws(b),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut remaining: Vec<&Value> = b.iter().collect();
                for item in a.iter() {
                    if let Some(pos) = remaining.iter().position(|r| item.equivalent(r)) {
                        remaining.remove(pos);
                    } else {
                        return false;
                    }
                }
                true
            }
            _ => self.equals(other).unwrap_or(false),
        }
    }

    /// Ordering comparison for `<`, `<=`, `>`, `>=`. `None` indicates the
    /// comparison is undefined (incomparable types, or insufficient
    /// temporal precision).
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Long(a), Value::Long(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Long(b)) => (*a as i64).partial_cmp(b),
            (Value::Long(a), Value::Integer(b)) => a.partial_cmp(&(*b as i64)),
            (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Decimal(b)) => Decimal::from(*a).partial_cmp(b),
            (Value::Decimal(a), Value::Integer(b)) => a.partial_cmp(&Decimal::from(*b)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.compare(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.compare(b),
            (Value::Time(a), Value::Time(b)) => a.compare(b),
            (Value::Quantity(a), Value::Quantity(b)) => a
                .convert_to(b.unit.as_deref().unwrap_or("1"))
                .and_then(|converted| converted.partial_cmp(&b.value)),
            _ => None,
        }
    }
}

fn endpoint_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equals(b).unwrap_or(false),
        _ => false,
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// An ordered, `Arc`-backed sequence of values. Collections are always
/// cheap to clone; mutation creates a new backing slice (spec.md §3.1).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection(Arc<[Value]>);

impl Collection {
    pub fn new() -> Self {
        Self(Arc::from(Vec::new().into_boxed_slice()))
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        Self(values.into())
    }

    pub fn single(value: Value) -> Self {
        Self(Arc::from(vec![value].into_boxed_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Value> {
        self.0.last()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0.to_vec()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn concat(&self, other: &Collection) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut v = self.0.to_vec();
        v.extend(other.0.iter().cloned());
        Self(v.into())
    }

    pub fn append(&self, value: Value) -> Self {
        let mut v = self.0.to_vec();
        v.push(value);
        Self(v.into())
    }

    /// One-level flatten: nested `List` values are spliced in; other
    /// values pass through unchanged (spec.md §4.3 "flatten").
    pub fn flatten(&self) -> Self {
        let mut out = Vec::with_capacity(self.0.len());
        for v in self.0.iter() {
            match v {
                Value::List(inner) => out.extend(inner.0.iter().cloned()),
                other => out.push(other.clone()),
            }
        }
        Self(out.into())
    }

    /// First-occurrence-preserving dedup by `~` equivalence (spec.md
    /// §4.3 "distinct").
    pub fn distinct(&self) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for v in self.0.iter() {
            if !out.iter().any(|o| o.equivalent(v)) {
                out.push(v.clone());
            }
        }
        Self(out.into())
    }

    pub fn union(&self, other: &Collection) -> Self {
        self.concat(other).distinct()
    }

    pub fn intersect(&self, other: &Collection) -> Self {
        let out: Vec<Value> = self
            .distinct()
            .0
            .iter()
            .filter(|v| other.0.iter().any(|o| o.equivalent(v)))
            .cloned()
            .collect();
        Self(out.into())
    }

    pub fn except(&self, other: &Collection) -> Self {
        let out: Vec<Value> = self
            .distinct()
            .0
            .iter()
            .filter(|v| !other.0.iter().any(|o| o.equivalent(v)))
            .cloned()
            .collect();
        Self(out.into())
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|v| v.equals(value) == Some(true))
    }
}

impl FromIterator<Value> for Collection {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect::<Vec<_>>().into())
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn integer_equals_itself() {
        assert_eq!(Value::Integer(7).equals(&Value::Integer(7)), Some(true));
    }

    #[test]
    fn cross_type_numeric_equality() {
        assert_eq!(
            Value::Integer(2).equals(&Value::Decimal(dec!(2))),
            Some(true)
        );
    }

    #[test]
    fn unrelated_types_equal_is_none() {
        assert_eq!(Value::Integer(1).equals(&Value::String("1".into())), None);
    }

    #[test]
    fn distinct_preserves_first_occurrence() {
        let c = Collection::from_vec(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(1),
        ]);
        let d = c.distinct();
        assert_eq!(d.into_vec(), vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn intersect_dedups_result() {
        let a = Collection::from_vec(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        let b = Collection::from_vec(vec![Value::Integer(2), Value::Integer(3), Value::Integer(4)]);
        assert_eq!(
            a.intersect(&b).into_vec(),
            vec![Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn string_equivalence_ignores_case_and_whitespace() {
        assert!(Value::String("  Hello   World ".into())
            .equivalent(&Value::String("hello world".into())));
    }
}
