//! The definition lifecycle state machine (spec.md §4.5, §8): each
//! `define` is `Unevaluated` until first referenced, `Evaluating` while
//! its body is being walked, then settles into `Computed` or `Failed`
//! and stays there for the rest of this evaluation run (memoized; a
//! library is evaluated with a single fixed focus/parameter set, so the
//! cache key is just the definition name).
//!
//! Re-entering a definition that is still `Evaluating` is a cycle;
//! `ql-analyzer` deliberately does not check for this (see its
//! `compiled.rs`), so it is caught here, lazily, at first evaluation.

use std::cell::RefCell;

use ql_analyzer::CompiledLibrary;
use ql_ast::{Definition, FunctionDecl};
use ql_diagnostics::{Diagnostic, DiagnosticCode};
use ql_model::Collection;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
enum DefinitionState {
    Evaluating,
    Computed(Collection),
    Failed(Diagnostic),
}

pub enum EntryOutcome {
    /// Already settled in a prior lookup this run; reuse the result.
    Cached(Result<Collection, Diagnostic>),
    /// Not yet started (or not yet touched this run); caller should
    /// evaluate the body and report back via [`LibraryManager::complete`].
    Proceed,
    /// Re-entered while still evaluating: a cyclic definition.
    Cyclic(Diagnostic),
}

pub struct LibraryManager {
    compiled: CompiledLibrary,
    cache: RefCell<FxHashMap<String, DefinitionState>>,
}

impl LibraryManager {
    pub fn new(compiled: CompiledLibrary) -> Self {
        Self {
            compiled,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn library(&self) -> &ql_ast::LibraryAst {
        &self.compiled.ast
    }

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.compiled.ast.definitions.get(name)
    }

    /// CQL functions support multi-dispatch: several declarations may
    /// share a name, distinguished by parameter count/type.
    pub fn functions_named(&self, name: &str) -> Vec<&FunctionDecl> {
        self.compiled
            .ast
            .functions
            .iter()
            .filter(|f| f.name == name)
            .collect()
    }

    /// Marks `name` as entering evaluation, or reports why the caller
    /// shouldn't proceed.
    pub fn enter(&self, name: &str) -> EntryOutcome {
        let mut cache = self.cache.borrow_mut();
        match cache.get(name) {
            Some(DefinitionState::Evaluating) => EntryOutcome::Cyclic(Diagnostic::error(
                DiagnosticCode::CyclicDefinition,
                format!("definition \"{name}\" is cyclic"),
            )),
            Some(DefinitionState::Computed(collection)) => EntryOutcome::Cached(Ok(collection.clone())),
            Some(DefinitionState::Failed(diagnostic)) => EntryOutcome::Cached(Err(diagnostic.clone())),
            None => {
                cache.insert(name.to_string(), DefinitionState::Evaluating);
                EntryOutcome::Proceed
            }
        }
    }

    pub fn complete(&self, name: &str, result: Result<Collection, Diagnostic>) {
        let state = match result {
            Ok(collection) => DefinitionState::Computed(collection),
            Err(diagnostic) => DefinitionState::Failed(diagnostic),
        };
        self.cache.borrow_mut().insert(name.to_string(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(source: &str) -> LibraryManager {
        let ast = ql_parser::parse_cql(source).expect("library parses");
        let compiled = ql_analyzer::compile(ast).expect("library resolves");
        LibraryManager::new(compiled)
    }

    #[test]
    fn reentering_an_evaluating_definition_is_cyclic() {
        let mgr = manager(
            r#"
            library Demo version '1.0.0'
            define "A": "B"
            define "B": "A"
            "#,
        );
        assert!(matches!(mgr.enter("A"), EntryOutcome::Proceed));
        assert!(matches!(mgr.enter("A"), EntryOutcome::Cyclic(_)));
    }

    #[test]
    fn completed_definitions_are_cached() {
        let mgr = manager(
            r#"
            library Demo version '1.0.0'
            define "X": 1
            "#,
        );
        assert!(matches!(mgr.enter("X"), EntryOutcome::Proceed));
        mgr.complete("X", Ok(Collection::new()));
        assert!(matches!(mgr.enter("X"), EntryOutcome::Cached(Ok(_))));
    }
}
