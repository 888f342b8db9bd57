//! FHIR Navigator (spec.md §4.4): projects a dotted path step over a
//! FHIR resource node (a JSON subtree with a `resourceType`
//! discriminator), honoring FHIRPath's choice-type and array-flattening
//! rules. Unknown members yield empty, never an error.

use ql_model::{
    Collection, FhirNode, PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision, Tuple, Value,
};
use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::str::FromStr;
use std::sync::Arc;

/// FHIR's polymorphic `value[x]`-style fields: `member` alone never
/// appears in the JSON; one of `member` + this suffix does.
const CHOICE_TYPE_SUFFIXES: &[&str] = &[
    "Boolean", "Integer", "Decimal", "String", "Uri", "Url", "Date", "DateTime", "Time", "Code",
    "Quantity", "CodeableConcept", "Reference", "Period", "Range", "Ratio", "Annotation",
    "Attachment", "Coding", "Identifier", "HumanName", "Address", "ContactPoint", "Money",
    "Duration", "Age", "Count", "Instant", "Base64Binary", "Markdown", "Oid", "PositiveInt",
    "UnsignedInt", "Uuid", "Canonical",
];

/// Navigates `member` off every resource node in `current`, flattening
/// results (rule 1: "if the node is an array, map and flatten" applies
/// transitively because every FHIRPath step already operates on a
/// collection, not a single node).
pub fn navigate_collection(current: &Collection, member: &str) -> Collection {
    let mut out = Vec::new();
    for value in current.iter() {
        if let Value::Resource(node) = value {
            out.extend(navigate_node(node, member));
        }
        // Navigating a member off a non-resource scalar has no member to
        // find; it contributes nothing, per empty-propagation.
    }
    Collection::from_vec(out)
}

fn navigate_node(node: &FhirNode, member: &str) -> Vec<Value> {
    let Some(obj) = node.as_json().as_object() else {
        return Vec::new();
    };

    if let Some(found) = obj.get(member) {
        let mut items = json_to_values(found, None);
        if let Some(ext) = obj.get(&format!("_{member}")) {
            merge_primitive_extension(&mut items, ext);
        }
        return items;
    }

    for suffix in CHOICE_TYPE_SUFFIXES {
        let key = format!("{member}{suffix}");
        if let Some(found) = obj.get(&key) {
            return json_to_values(found, Some(*suffix));
        }
    }

    Vec::new()
}

/// Merges a primitive's `_field` extension sibling into the primitive
/// value (rule 4). `_field` is either a single object (for a scalar
/// field) or an array running parallel to `field`'s own array (for a
/// repeating field, with `null` holes where an element carries no
/// extension); either way each present sibling wraps its matching
/// primitive into a `Tuple { value, id?, extension? }` so the extension
/// data is reachable via `.extension`/`.id` while `.value` still yields
/// the bare primitive FHIRPath expects.
fn merge_primitive_extension(items: &mut [Value], ext: &Json) {
    match ext {
        Json::Array(ext_items) => {
            for (item, ext_item) in items.iter_mut().zip(ext_items.iter()) {
                if let Some(merged) = wrap_with_extension(item, ext_item) {
                    *item = merged;
                }
            }
        }
        Json::Null => {}
        single => {
            if let Some(item) = items.first_mut() {
                if let Some(merged) = wrap_with_extension(item, single) {
                    *item = merged;
                }
            }
        }
    }
}

fn wrap_with_extension(value: &Value, ext: &Json) -> Option<Value> {
    let obj = ext.as_object()?;
    if obj.is_empty() {
        return None;
    }
    let mut tuple = Tuple::new();
    tuple.insert("value", value.clone());
    if let Some(id) = obj.get("id").and_then(Json::as_str) {
        tuple.insert("id", Value::String(id.to_string()));
    }
    if let Some(extension) = obj.get("extension") {
        let items = json_to_values(extension, None);
        tuple.insert("extension", Value::List(Collection::from_vec(items)));
    }
    Some(Value::Tuple(tuple))
}

fn json_to_values(json: &Json, type_hint: Option<&str>) -> Vec<Value> {
    match json {
        Json::Null => Vec::new(),
        Json::Array(items) => items
            .iter()
            .flat_map(|item| json_to_values(item, type_hint))
            .collect(),
        Json::Object(_) => vec![Value::Resource(FhirNode::with_type_hint(
            Arc::new(json.clone()),
            type_hint.map(str::to_string),
        ))],
        Json::Bool(b) => vec![Value::Boolean(*b)],
        Json::String(s) => vec![scalar_string_to_value(s, type_hint)],
        Json::Number(n) => vec![json_number_to_value(n)],
    }
}

fn scalar_string_to_value(s: &str, type_hint: Option<&str>) -> Value {
    match type_hint {
        Some("Date") => parse_fhir_date(s).map(Value::Date).unwrap_or_else(|| Value::String(s.to_string())),
        Some("DateTime") | Some("Instant") => parse_fhir_datetime(s)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::String(s.to_string())),
        Some("Time") => parse_fhir_time(s).map(Value::Time).unwrap_or_else(|| Value::String(s.to_string())),
        _ => {
            if let Some(date) = parse_fhir_date(s) {
                Value::Date(date)
            } else if let Some(dt) = parse_fhir_datetime(s) {
                Value::DateTime(dt)
            } else if let Some(t) = parse_fhir_time(s) {
                Value::Time(t)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// `YYYY`, `YYYY-MM`, or `YYYY-MM-DD`, with precision following the
/// components actually present (spec.md §3.1 "precision is part of the
/// value").
fn parse_fhir_date(s: &str) -> Option<PrecisionDate> {
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [y] if y.len() == 4 => {
            let year = y.parse().ok()?;
            let date = chrono::NaiveDate::from_ymd_opt(year, 1, 1)?;
            Some(PrecisionDate::new(date, TemporalPrecision::Year))
        }
        [y, m] if y.len() == 4 => {
            let year = y.parse().ok()?;
            let month = m.parse().ok()?;
            let date = chrono::NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(PrecisionDate::new(date, TemporalPrecision::Month))
        }
        [y, m, d] if y.len() == 4 => {
            let year = y.parse().ok()?;
            let month = m.parse().ok()?;
            let day = d.parse().ok()?;
            let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
            Some(PrecisionDate::new(date, TemporalPrecision::Day))
        }
        _ => None,
    }
}

fn parse_fhir_datetime(s: &str) -> Option<PrecisionDateTime> {
    if !s.contains('T') {
        return None;
    }
    let (date_part, rest) = s.split_once('T')?;
    if date_part.len() != 10 {
        return None;
    }
    let tz_unspecified = !(rest.ends_with('Z') || rest.contains('+') || rest[1..].contains('-'));
    let normalized = if tz_unspecified {
        format!("{s}Z")
    } else {
        s.to_string()
    };
    let (precision, normalized) = datetime_precision(rest, normalized);
    let dt = chrono::DateTime::parse_from_rfc3339(&normalized).ok()?;
    Some(PrecisionDateTime::new(dt, precision, tz_unspecified))
}

fn datetime_precision(time_and_offset: &str, normalized: String) -> (TemporalPrecision, String) {
    let time_part = time_and_offset
        .trim_end_matches('Z')
        .split(['+', '-'])
        .next()
        .unwrap_or(time_and_offset);
    let precision = match time_part.matches(':').count() {
        0 => TemporalPrecision::Hour,
        1 => TemporalPrecision::Minute,
        _ if time_part.contains('.') => TemporalPrecision::Millisecond,
        _ => TemporalPrecision::Second,
    };
    (precision, normalized)
}

fn parse_fhir_time(s: &str) -> Option<PrecisionTime> {
    let parts: Vec<&str> = s.split(':').collect();
    let precision = match parts.len() {
        1 => TemporalPrecision::Hour,
        2 => TemporalPrecision::Minute,
        _ if s.contains('.') => TemporalPrecision::Millisecond,
        _ => TemporalPrecision::Second,
    };
    let padded = match parts.len() {
        1 => format!("{s}:00:00"),
        2 => format!("{s}:00"),
        _ => s.to_string(),
    };
    let time = chrono::NaiveTime::parse_from_str(&padded, "%H:%M:%S%.f").ok()?;
    Some(PrecisionTime::new(time, precision))
}

/// Parses a Date literal's text (the lexer has already stripped the
/// leading `@`), reusing the same FHIR date grammar a resource's JSON
/// string would be parsed with.
pub fn parse_date_literal(s: &str) -> Option<PrecisionDate> {
    parse_fhir_date(s)
}

pub fn parse_datetime_literal(s: &str) -> Option<PrecisionDateTime> {
    parse_fhir_datetime(s)
}

pub fn parse_time_literal(s: &str) -> Option<PrecisionTime> {
    parse_fhir_time(s)
}

fn json_number_to_value(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        return i32::try_from(i).map(Value::Integer).unwrap_or(Value::Long(i));
    }
    // serde_json without the `arbitrary_precision` feature already lost
    // any trailing-zero fidelity by the time it parsed `n`; this is the
    // best this crate can reconstruct from a plain `f64`-backed Number.
    Decimal::from_str(&n.to_string())
        .map(Value::Decimal)
        .unwrap_or(Value::Decimal(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(json: Json) -> Value {
        Value::Resource(FhirNode::from_json(json))
    }

    #[test]
    fn navigates_verbatim_array_field() {
        let patient = node(json!({
            "resourceType": "Patient",
            "name": [{"family": "Smith", "given": ["John"]}],
        }));
        let collection = Collection::single(patient);
        let names = navigate_collection(&collection, "name");
        assert_eq!(names.len(), 1);
        let families = navigate_collection(&names, "family");
        assert_eq!(families.into_vec(), vec![Value::String("Smith".to_string())]);
    }

    #[test]
    fn unknown_member_yields_empty() {
        let patient = node(json!({"resourceType": "Patient"}));
        let collection = Collection::single(patient);
        let result = navigate_collection(&collection, "noSuchField");
        assert!(result.is_empty());
    }

    #[test]
    fn resolves_choice_type_suffix() {
        let observation = node(json!({
            "resourceType": "Observation",
            "valueQuantity": {"value": 72, "unit": "kg"},
        }));
        let collection = Collection::single(observation);
        let values = navigate_collection(&collection, "value");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn merges_primitive_extension_sibling() {
        let patient = node(json!({
            "resourceType": "Patient",
            "birthDate": "1990-01-01",
            "_birthDate": {
                "extension": [{"url": "http://example.org/data-absent-reason", "valueCode": "unknown"}]
            },
        }));
        let collection = Collection::single(patient);
        let values = navigate_collection(&collection, "birthDate");
        assert_eq!(values.len(), 1);
        match &values.into_vec()[0] {
            Value::Tuple(tuple) => {
                assert!(matches!(tuple.get("value"), Some(Value::Date(_))));
                assert!(matches!(tuple.get("extension"), Some(Value::List(_))));
            }
            other => panic!("expected a Tuple wrapping the primitive, got {other:?}"),
        }
    }

    #[test]
    fn parses_date_precision_from_string() {
        match parse_fhir_date("2024-05") {
            Some(d) => assert_eq!(d.precision, TemporalPrecision::Month),
            None => panic!("expected a parsed date"),
        }
    }
}
