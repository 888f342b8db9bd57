//! Static and dynamic type identity used by `is`/`as` and the resolver's
//! conversion-cost table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A type name, namespaced the way FHIRPath's `TypeInfo` objects are:
/// `System.Integer`, `FHIR.Patient`, etc.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    pub namespace: String,
    pub name: String,
}

impl TypeInfo {
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            namespace: "System".to_string(),
            name: name.into(),
        }
    }

    pub fn fhir(name: impl Into<String>) -> Self {
        Self {
            namespace: "FHIR".to_string(),
            name: name.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// CQL's implicit conversion precedence, spec.md §4.2: lower index
/// converts into any higher index at zero or minimal cost.
pub const NUMERIC_CONVERSION_ORDER: &[&str] = &["Integer", "Long", "Decimal", "Quantity"];

/// Cost of converting from `from` to `to` along the precedence table, or
/// `None` when no implicit conversion exists. Used by overload resolution
/// to break ties by total conversion cost (spec.md §4.2).
pub fn conversion_cost(from: &str, to: &str) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    if from == "Date" && to == "DateTime" {
        return Some(1);
    }
    if from == "Code" && to == "Concept" {
        return Some(1);
    }
    let from_idx = NUMERIC_CONVERSION_ORDER.iter().position(|t| *t == from)?;
    let to_idx = NUMERIC_CONVERSION_ORDER.iter().position(|t| *t == to)?;
    if to_idx >= from_idx {
        Some((to_idx - from_idx) as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_converts_to_decimal_at_cost_two() {
        assert_eq!(conversion_cost("Integer", "Decimal"), Some(2));
    }

    #[test]
    fn decimal_does_not_convert_to_integer() {
        assert_eq!(conversion_cost("Decimal", "Integer"), None);
    }
}
