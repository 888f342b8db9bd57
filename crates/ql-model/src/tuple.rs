//! Structural tuple values (CQL's `Tuple { a: 1, b: 2 }` literal and FHIR
//! complex-type navigation results).

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An ordered name→value map. Order is preserved for display purposes;
/// equality is structural and order-independent (field sets and values
/// must match, not declaration order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple(pub IndexMap<String, Value>);

impl Tuple {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl Default for Tuple {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(String, Value)> for Tuple {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
