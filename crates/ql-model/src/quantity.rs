//! Quantity and Ratio values, with UCUM-aware commensurability checks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decimal magnitude paired with an (optional) UCUM unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new(value: Decimal, unit: Option<String>) -> Self {
        Self {
            value,
            unit: unit.map(|u| normalize_calendar_unit(&u)),
        }
    }

    pub fn unitless(value: Decimal) -> Self {
        Self { value, unit: None }
    }

    /// Convert `self` into `target_unit`'s scale, returning `None` when the
    /// units are not commensurable (different UCUM dimension) or unknown --
    /// per spec.md §3.1, that is a Null-producing condition, not a panic.
    pub fn convert_to(&self, target_unit: &str) -> Option<Decimal> {
        let target_unit = normalize_calendar_unit(target_unit);
        let self_unit = self.unit.as_deref().unwrap_or("1");
        if self_unit == target_unit {
            return Some(self.value);
        }
        let factor = commensurable_factor(self_unit, &target_unit)?;
        Some(self.value * factor)
    }

    /// True when `other` can be converted into `self`'s unit.
    pub fn is_commensurable_with(&self, other: &Quantity) -> bool {
        let self_unit = self.unit.as_deref().unwrap_or("1");
        let other_unit = other.unit.as_deref().unwrap_or("1");
        self_unit == other_unit || commensurable_factor(other_unit, self_unit).is_some()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} '{}'", self.value, unit),
            None => write!(f, "{}", self.value),
        }
    }
}

/// FHIRPath calendar duration keywords map onto a fixed UCUM unit; all
/// other unit strings pass through untouched and are validated lazily by
/// `octofhir_ucum` at commensurability-check time.
fn normalize_calendar_unit(unit: &str) -> String {
    match unit {
        "year" | "years" => "a".to_string(),
        "month" | "months" => "mo".to_string(),
        "week" | "weeks" => "wk".to_string(),
        "day" | "days" => "d".to_string(),
        "hour" | "hours" => "h".to_string(),
        "minute" | "minutes" => "min".to_string(),
        "second" | "seconds" => "s".to_string(),
        "millisecond" | "milliseconds" => "ms".to_string(),
        other => other.to_string(),
    }
}

/// Multiplicative factor converting a quantity expressed in `from` into
/// `to`'s scale, or `None` when the two units are not the same UCUM
/// dimension (or either string fails to parse as a UCUM unit). Delegates
/// to `octofhir_ucum::is_comparable`/`analyse` for full dimensional
/// analysis, the same pair of calls the teacher's
/// `has_compatible_dimensions`/`convert_to_compatible_unit` use, rather
/// than a hand-rolled unit table.
fn commensurable_factor(from: &str, to: &str) -> Option<Decimal> {
    use rust_decimal::prelude::FromPrimitive;

    if from == to {
        return Some(Decimal::ONE);
    }
    if !octofhir_ucum::is_comparable(from, to).unwrap_or(false) {
        return None;
    }
    let from_analysis = octofhir_ucum::analyse(from).ok()?;
    let to_analysis = octofhir_ucum::analyse(to).ok()?;
    Decimal::from_f64(from_analysis.factor / to_analysis.factor)
}

/// A numerator/denominator pair of quantities, e.g. `5 'mg' : 1 'mL'`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: Quantity,
    pub denominator: Quantity,
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn kg_and_g_are_commensurable() {
        let one_kg = Quantity::new(dec!(1), Some("kg".into()));
        let converted = one_kg.convert_to("g").unwrap();
        assert_eq!(converted, dec!(1000));
    }

    #[test]
    fn incommensurable_units_yield_none() {
        let one_kg = Quantity::new(dec!(1), Some("kg".into()));
        assert!(one_kg.convert_to("s").is_none());
    }

    #[test]
    fn calendar_unit_names_normalize() {
        let q = Quantity::new(dec!(2), Some("years".into()));
        assert_eq!(q.unit.as_deref(), Some("a"));
    }

    #[test]
    fn volume_units_convert_via_ucum_dimensional_analysis() {
        let one_l = Quantity::new(dec!(1), Some("L".into()));
        let converted = one_l.convert_to("mL").unwrap();
        assert_eq!(converted, dec!(1000));
    }
}
