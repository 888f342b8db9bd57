//! `Engine`: the top-level handle spec.md §6.1's programmatic API is
//! implemented against. Bundles an `EngineConfig` (evaluation timestamp,
//! timezone, resource limits -- spec.md §6.4), the built-in function
//! registry, and a `LibraryStore` of compiled libraries, each with its
//! own per-session `LibraryManager` definition cache (spec.md §5: "the
//! definition cache is per-context").

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use ql_ast::{Expr, LibraryAst};
use ql_analyzer::CompiledLibrary;
use ql_diagnostics::{Diagnostic, Diagnostics, EngineError};
use ql_model::{Collection, PrecisionDateTime, Value};
use ql_registry::{build_standard_registry, Registry};

use crate::error::Result;
use ql_evaluator::{CancellationToken, EvalConfig, Env, Evaluator, LibraryManager};

/// Evaluation environment inputs (spec.md §2.1, §6.4). Constructed once
/// per session so every `Today()`/`Now()` read during that session's
/// evaluations agrees.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub now: PrecisionDateTime,
    pub timezone: String,
    pub recursion_limit: usize,
    pub max_collection_size: Option<usize>,
}

impl EngineConfig {
    pub fn new(now: PrecisionDateTime, timezone: impl Into<String>) -> Self {
        Self {
            now,
            timezone: timezone.into(),
            recursion_limit: 256,
            max_collection_size: None,
        }
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_max_collection_size(mut self, max: usize) -> Self {
        self.max_collection_size = Some(max);
        self
    }

    fn to_eval_config(&self) -> EvalConfig {
        let mut config = EvalConfig::new(self.now, self.timezone.clone());
        config.recursion_limit = self.recursion_limit;
        config.max_collection_size = self.max_collection_size;
        config
    }
}

pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    libraries: RefCell<FxHashMap<String, LibraryManager>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        tracing::debug!(timezone = %config.timezone, "engine session started");
        Self {
            config,
            registry: build_standard_registry(),
            libraries: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses FHIRPath source (spec.md §6.1/§6.2).
    pub fn parse_fhirpath(&self, source: &str) -> std::result::Result<Expr, Vec<Diagnostic>> {
        tracing::debug!(len = source.len(), "parsing fhirpath expression");
        ql_parser::parse_fhirpath(source)
    }

    /// Parses CQL library source (spec.md §6.1/§6.2).
    pub fn parse_cql(&self, source: &str) -> std::result::Result<LibraryAst, Vec<Diagnostic>> {
        tracing::debug!(len = source.len(), "parsing cql library");
        ql_parser::parse_cql(source)
    }

    /// Resolves and type-checks a parsed library against this engine's
    /// function registry (spec.md §4.2).
    pub fn compile(&self, library: LibraryAst) -> std::result::Result<CompiledLibrary, Vec<Diagnostic>> {
        tracing::debug!(name = ?library.header.as_ref().map(|h| &h.name), "compiling library");
        ql_analyzer::compile_with_registry(library, &self.registry)
    }

    /// Registers a compiled library under `name`, starting a fresh
    /// per-session definition cache for it (spec.md §4.5). Re-registering
    /// the same name replaces its cache, as if a new session had begun
    /// for that library.
    pub fn register_library(&self, name: impl Into<String>, compiled: CompiledLibrary) {
        let name = name.into();
        tracing::debug!(library = %name, "library registered");
        self.libraries.borrow_mut().insert(name, LibraryManager::new(compiled));
    }

    /// Evaluates a single FHIRPath expression (spec.md §6.1). The result
    /// is always a `Value::List`: empty, singleton, or multi-element,
    /// never collapsed, matching FHIRPath's collection-first semantics.
    pub fn evaluate_fhirpath(
        &self,
        expr: &Expr,
        focus: Collection,
        env: &Env,
        cancellation: &CancellationToken,
    ) -> (Value, Diagnostics) {
        let eval_config = self.config.to_eval_config();
        let mut evaluator = Evaluator::new(&self.registry, None, &eval_config, env, cancellation, focus);
        let result = evaluator.eval(expr);
        (Value::List(result), evaluator.diagnostics.into_iter().collect())
    }

    /// Evaluates one named `define` from a registered library (spec.md
    /// §6.1). CQL's scalar context collapses cardinality: no result is
    /// `None`, one result is `Some` of the bare value, more than one is
    /// `Some(Value::List(..))`.
    pub fn evaluate_definition(
        &self,
        library_name: &str,
        definition_name: &str,
        focus: Collection,
        env: &Env,
        cancellation: &CancellationToken,
    ) -> Result<(Option<Value>, Diagnostics)> {
        let libraries = self.libraries.borrow();
        let manager = libraries
            .get(library_name)
            .ok_or_else(|| EngineError::UnknownLibrary(library_name.to_string()))?;
        if manager.definition(definition_name).is_none() {
            return Err(EngineError::UnknownDefinition(
                definition_name.to_string(),
                library_name.to_string(),
            ));
        }
        Ok(self.evaluate_definition_inner(manager, definition_name, focus, env, cancellation))
    }

    /// Evaluates every public `define` in a registered library (spec.md
    /// §6.1), keyed by definition name.
    pub fn evaluate_all(
        &self,
        library_name: &str,
        focus: Collection,
        env: &Env,
        cancellation: &CancellationToken,
    ) -> Result<(FxHashMap<String, Option<Value>>, Diagnostics)> {
        let libraries = self.libraries.borrow();
        let manager = libraries
            .get(library_name)
            .ok_or_else(|| EngineError::UnknownLibrary(library_name.to_string()))?;

        let mut results = FxHashMap::default();
        let mut diagnostics = Diagnostics::new();
        let public_names: Vec<String> = manager
            .library()
            .definitions
            .iter()
            .filter(|(_, def)| def.access == ql_ast::AccessLevel::Public)
            .map(|(name, _)| name.clone())
            .collect();

        for name in public_names {
            let (value, diags) =
                self.evaluate_definition_inner(manager, &name, focus.clone(), env, cancellation);
            results.insert(name, value);
            diagnostics.extend(diags);
            if cancellation.is_cancelled() {
                break;
            }
        }
        Ok((results, diagnostics))
    }

    fn evaluate_definition_inner(
        &self,
        manager: &LibraryManager,
        name: &str,
        focus: Collection,
        env: &Env,
        cancellation: &CancellationToken,
    ) -> (Option<Value>, Diagnostics) {
        let eval_config = self.config.to_eval_config();
        let mut evaluator =
            Evaluator::new(&self.registry, Some(manager), &eval_config, env, cancellation, focus);
        let origin = ql_diagnostics::Position { offset: 0, line: 1, column: 1 };
        let expr = Expr::new(
            ql_ast::ExprKind::Identifier(name.to_string()),
            ql_diagnostics::Span::point(origin),
        );
        let result = evaluator.eval(&expr);
        let value = match result.len() {
            0 => None,
            1 => Some(result.into_vec().remove(0)),
            _ => Some(Value::List(result)),
        };
        (value, evaluator.diagnostics.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_model::TemporalPrecision;

    fn config() -> EngineConfig {
        EngineConfig::new(
            PrecisionDateTime::new(
                chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap(),
                TemporalPrecision::Second,
                false,
            ),
            "UTC",
        )
    }

    #[test]
    fn evaluates_fhirpath_expression() {
        let engine = Engine::new(config());
        let expr = engine.parse_fhirpath("1 + 2").unwrap();
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let (value, diagnostics) = engine.evaluate_fhirpath(&expr, Collection::new(), &env, &cancellation);
        assert!(diagnostics.is_empty());
        assert_eq!(value, Value::List(Collection::single(Value::Integer(3))));
    }

    #[test]
    fn evaluates_registered_library_definition() {
        let engine = Engine::new(config());
        let ast = engine
            .parse_cql("library Demo version '1.0.0'\ndefine \"Answer\": 42")
            .unwrap();
        let compiled = engine.compile(ast).unwrap();
        engine.register_library("Demo", compiled);

        let env = Env::new();
        let cancellation = CancellationToken::new();
        let (value, diagnostics) = engine
            .evaluate_definition("Demo", "Answer", Collection::new(), &env, &cancellation)
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(value, Some(Value::Integer(42)));
    }

    #[test]
    fn unregistered_library_is_an_engine_error() {
        let engine = Engine::new(config());
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let err = engine
            .evaluate_definition("Missing", "X", Collection::new(), &env, &cancellation)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownLibrary(name) if name == "Missing"));
    }
}
