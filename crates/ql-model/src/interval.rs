//! Intervals and the thirteen Allen relations.
//!
//! An endpoint of `None` denotes unbounded (CQL's null-endpoint
//! convention): `Interval[null, 5]` extends to -infinity, `Interval[3,
//! null]` to +infinity.

use crate::error::{ModelError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: Option<Box<Value>>,
    pub high: Option<Box<Value>>,
    pub low_closed: bool,
    pub high_closed: bool,
}

impl Interval {
    /// Construct an interval, failing per spec.md §3.1 when both
    /// endpoints are present and ordered low > high.
    pub fn new(
        low: Option<Value>,
        high: Option<Value>,
        low_closed: bool,
        high_closed: bool,
    ) -> Result<Self> {
        if let (Some(l), Some(h)) = (&low, &high) {
            if let Some(std::cmp::Ordering::Greater) = l.partial_cmp_value(h) {
                return Err(ModelError::InvalidInterval {
                    low: format!("{l:?}"),
                    high: format!("{h:?}"),
                });
            }
        }
        Ok(Self {
            low: low.map(Box::new),
            high: high.map(Box::new),
            low_closed,
            high_closed,
        })
    }

    pub fn low(&self) -> Option<&Value> {
        self.low.as_deref()
    }

    pub fn high(&self) -> Option<&Value> {
        self.high.as_deref()
    }

    /// The Allen relation that holds between `self` and `other`. Exactly
    /// one variant holds for any pair of intervals with comparable
    /// endpoint types (spec.md §8 invariant 5).
    pub fn allen_relation(&self, other: &Interval) -> AllenRelation {
        use std::cmp::Ordering::*;
        // Unbounded endpoints compare as dominating in the expected
        // direction: a None low is -infinity, a None high is +infinity.
        let low_cmp = |a: Option<&Value>, b: Option<&Value>| -> Ordering {
            match (a, b) {
                (None, None) => Equal,
                (None, Some(_)) => Less,
                (Some(_), None) => Greater,
                (Some(a), Some(b)) => a.partial_cmp_value(b).unwrap_or(Equal),
            }
        };
        let high_cmp = |a: Option<&Value>, b: Option<&Value>| -> Ordering {
            match (a, b) {
                (None, None) => Equal,
                (None, Some(_)) => Greater,
                (Some(_), None) => Less,
                (Some(a), Some(b)) => a.partial_cmp_value(b).unwrap_or(Equal),
            }
        };

        let low_low = low_cmp(self.low(), other.low());
        let high_high = high_cmp(self.high(), other.high());
        let self_high_other_low = high_cmp(self.high(), other.low());
        let self_low_other_high = low_cmp(self.low(), other.high());

        if self_high_other_low == Less {
            return AllenRelation::Before;
        }
        if self_low_other_high == Greater {
            return AllenRelation::After;
        }
        if self_high_other_low == Equal {
            // A closed endpoint touching a closed endpoint shares that
            // point, which is an overlap, not an adjacency -- `Meets`
            // only holds when at least one of the touching boundaries is
            // open and no point is actually shared.
            return if self.high_closed && other.low_closed {
                AllenRelation::Overlaps
            } else {
                AllenRelation::Meets
            };
        }
        if self_low_other_high == Equal {
            return if self.low_closed && other.high_closed {
                AllenRelation::OverlappedBy
            } else {
                AllenRelation::MetBy
            };
        }
        if low_low == Equal && high_high == Equal {
            return AllenRelation::Equal;
        }
        if low_low == Equal && high_high == Less {
            return AllenRelation::Starts;
        }
        if low_low == Equal && high_high == Greater {
            return AllenRelation::StartedBy;
        }
        if high_high == Equal && low_low == Greater {
            return AllenRelation::Finishes;
        }
        if high_high == Equal && low_low == Less {
            return AllenRelation::FinishedBy;
        }
        if low_low == Greater && high_high == Less {
            return AllenRelation::During;
        }
        if low_low == Less && high_high == Greater {
            return AllenRelation::Contains;
        }
        if low_low == Less && high_high == Less && self_high_other_low == Greater {
            return AllenRelation::Overlaps;
        }
        if low_low == Greater && high_high == Greater {
            return AllenRelation::OverlappedBy;
        }
        // Degenerate fallback for boundary combinations not covered above
        // (e.g. zero-width intervals); treat as overlap, the loosest of
        // the thirteen relations.
        AllenRelation::Overlaps
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        matches!(
            self.allen_relation(other),
            AllenRelation::Overlaps
                | AllenRelation::OverlappedBy
                | AllenRelation::During
                | AllenRelation::Contains
                | AllenRelation::Starts
                | AllenRelation::StartedBy
                | AllenRelation::Finishes
                | AllenRelation::FinishedBy
                | AllenRelation::Equal
        )
    }
}

/// The thirteen Allen interval relations, plus their six named inverses,
/// as enumerated in spec.md §4.3/GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllenRelation {
    Before,
    After,
    Meets,
    MetBy,
    Overlaps,
    OverlappedBy,
    Starts,
    StartedBy,
    During,
    Contains,
    Finishes,
    FinishedBy,
    Equal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn disjoint_intervals_overlap_scenario() {
        // Interval[3, 5] overlaps Interval[4, 7] -- spec.md §8 scenario 4.
        let a = Interval::new(Some(int(3)), Some(int(5)), true, true).unwrap();
        let b = Interval::new(Some(int(4)), Some(int(7)), true, true).unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn unbounded_low_treated_as_minus_infinity() {
        let a = Interval::new(None, Some(int(5)), true, true).unwrap();
        let b = Interval::new(Some(int(3)), Some(int(10)), true, true).unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn invalid_interval_rejected() {
        let err = Interval::new(Some(int(10)), Some(int(1)), true, true);
        assert!(err.is_err());
    }

    #[test]
    fn decimal_endpoints_compare() {
        let a = Interval::new(
            Some(Value::Decimal(dec!(1.0))),
            Some(Value::Decimal(dec!(2.0))),
            true,
            true,
        )
        .unwrap();
        let b = Interval::new(
            Some(Value::Decimal(dec!(2.0))),
            Some(Value::Decimal(dec!(3.0))),
            true,
            true,
        )
        .unwrap();
        // Both boundaries at 2.0 are closed, so the intervals share that
        // point -- an overlap, not an adjacency.
        assert_eq!(a.allen_relation(&b), AllenRelation::Overlaps);
    }

    #[test]
    fn open_boundary_touching_point_is_meets_not_overlaps() {
        let a = Interval::new(Some(int(1)), Some(int(2)), true, false);
        let b = Interval::new(Some(int(2)), Some(int(3)), true, true);
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.allen_relation(&b), AllenRelation::Meets);
    }
}
