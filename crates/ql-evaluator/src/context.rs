//! The evaluation context (spec.md §3.4): immutable inputs (evaluation
//! timestamp, timezone, parameter bindings) plus the mutable state a
//! single evaluation mutates (variable environment, focus stack,
//! recursion depth, cancellation).

use ql_model::{PrecisionDateTime, TemporalPrecision};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ql_model::Value;

/// A token an external caller can flip to abort a long-running
/// evaluation at the next query-iteration or function-call boundary
/// (spec.md §5).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Immutable inputs threaded through a single evaluation (spec.md §2.1,
/// §5, §6.4). Constructed once per call so that every `Today()`/`Now()`
/// read within it agrees, and results are reproducible across runs.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub now: PrecisionDateTime,
    pub timezone: String,
    pub recursion_limit: usize,
    /// Caps the number of elements a single materialized collection may
    /// hold during query evaluation (spec.md §5's "memory budget MAY be
    /// enforced" clause). `None` means unbounded.
    pub max_collection_size: Option<usize>,
}

impl EvalConfig {
    pub fn new(now: PrecisionDateTime, timezone: impl Into<String>) -> Self {
        Self {
            now,
            timezone: timezone.into(),
            recursion_limit: 256,
            max_collection_size: None,
        }
    }

    pub fn today_precision() -> TemporalPrecision {
        TemporalPrecision::Day
    }
}

/// Caller-supplied parameter bindings and value-set membership
/// allowlists (spec.md §3.5 "no terminology server"): a CQL `in
/// "Valueset"` check is only answerable if the caller pre-populated the
/// codes that valueset contains here.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub parameters: FxHashMap<String, Value>,
    pub valuesets: FxHashMap<String, Vec<String>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_valueset(mut self, id: impl Into<String>, codes: Vec<String>) -> Self {
        self.valuesets.insert(id.into(), codes);
        self
    }
}
