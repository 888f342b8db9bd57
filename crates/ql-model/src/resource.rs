//! FHIR resource node wrapper: a reference to a JSON subtree plus a
//! schema hint (spec.md §3.1's "FHIR node" variant). Navigation rules
//! live in `ql-evaluator::navigator`; this type only owns the data.

use serde_json::Value as Json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FhirNode {
    data: Arc<Json>,
    /// FHIR type name at this node, when known statically (e.g.
    /// `"Patient"` at the root, `"HumanName"` after `.name`).
    type_hint: Option<String>,
}

impl FhirNode {
    pub fn from_json(data: Json) -> Self {
        let type_hint = data
            .as_object()
            .and_then(|obj| obj.get("resourceType"))
            .and_then(|rt| rt.as_str())
            .map(str::to_string);
        Self {
            data: Arc::new(data),
            type_hint,
        }
    }

    pub fn with_type_hint(data: Arc<Json>, type_hint: Option<String>) -> Self {
        Self { data, type_hint }
    }

    pub fn as_json(&self) -> &Json {
        &self.data
    }

    pub fn arc_json(&self) -> Arc<Json> {
        Arc::clone(&self.data)
    }

    pub fn resource_type(&self) -> Option<&str> {
        if self.as_json().get("resourceType").is_some() {
            self.type_hint.as_deref()
        } else {
            None
        }
    }

    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }
}

impl PartialEq for FhirNode {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}
