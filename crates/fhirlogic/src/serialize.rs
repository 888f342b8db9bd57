//! Textual rendering of `Value` for CLI/JSON-adjacent output (spec.md
//! §6.3). This is presentation only -- it has no bearing on evaluation
//! semantics, which operate on `Value`/`Collection` directly.

use ql_model::Value;

/// Renders a single `Value`. Collections render as `{ e1, e2, ... }`;
/// an empty `Value::List` renders as `{}`, distinct from the `null`
/// produced for an absent/unrepresentable scalar.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Long(l) => l.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::String(s) => render_string(s),
        Value::Date(d) => format!("@{d}"),
        Value::DateTime(dt) => format!("@{dt}"),
        Value::Time(t) => format!("@T{t}"),
        Value::Quantity(q) => q.to_string(),
        Value::Ratio(r) => r.to_string(),
        Value::Code(c) => c.to_string(),
        Value::Concept(c) => c.to_string(),
        Value::Tuple(t) => render_tuple(t),
        Value::Interval(i) => render_interval(i),
        Value::List(items) => render_list(items.iter()),
        Value::Resource(node) => node.as_json().to_string(),
    }
}

/// Renders a result at the evaluation API boundary, where absence
/// itself (no `Value` at all) is distinct from any present `Value` --
/// `None` is CQL's Null, rendered as the literal `null` (spec.md §6.3).
pub fn render_option(value: Option<&Value>) -> String {
    match value {
        Some(v) => render_value(v),
        None => "null".to_string(),
    }
}

fn render_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn render_list<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    let rendered: Vec<String> = items.map(render_value).collect();
    format!("{{ {} }}", rendered.join(", "))
}

fn render_tuple(tuple: &ql_model::Tuple) -> String {
    let fields: Vec<String> = tuple
        .iter()
        .map(|(name, value)| format!("{name}: {}", render_value(value)))
        .collect();
    format!("Tuple {{ {} }}", fields.join(", "))
}

fn render_interval(interval: &ql_model::Interval) -> String {
    let low_bracket = if interval.low_closed { '[' } else { '(' };
    let high_bracket = if interval.high_closed { ']' } else { ')' };
    let low = interval.low.as_ref().map(|v| render_value(v)).unwrap_or_else(|| "null".to_string());
    let high = interval.high.as_ref().map(|v| render_value(v)).unwrap_or_else(|| "null".to_string());
    format!("Interval{low_bracket}{low}, {high}{high_bracket}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_model::Collection;

    #[test]
    fn strings_are_single_quoted_and_escaped() {
        assert_eq!(render_value(&Value::String("it's".to_string())), "'it\\'s'");
    }

    #[test]
    fn empty_list_renders_as_empty_braces() {
        assert_eq!(render_value(&Value::List(Collection::new())), "{}");
    }

    #[test]
    fn list_renders_each_element() {
        let list = Collection::from_vec(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(render_value(&Value::List(list)), "{ 1, 2 }");
    }

    #[test]
    fn absent_definition_result_renders_as_null() {
        assert_eq!(render_option(None), "null");
    }
}
