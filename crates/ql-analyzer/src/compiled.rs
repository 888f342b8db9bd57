//! The analyzer's output: a `LibraryAst` paired with its inferred type
//! table, ready for `ql-evaluator` to walk.
//!
//! Deliberately absent: a topological definition order or any cycle
//! report. spec.md §8's boundary scenario has a library with a cyclic
//! definition compile successfully, and only fail (with `Null` +
//! `CyclicDefinition`) when that definition is *evaluated* — so cycle
//! detection belongs to the evaluator's lazy `Unevaluated -> Evaluating
//! -> Computed|Failed` state machine, not to this compile step.

use crate::typed_ast::TypedAst;
use ql_ast::LibraryAst;
use ql_diagnostics::Diagnostic;

#[derive(Debug, Clone)]
pub struct CompiledLibrary {
    pub ast: LibraryAst,
    pub types: TypedAst,
    /// Non-fatal diagnostics raised during analysis (currently none are
    /// produced at warning severity, but the slot exists so a future
    /// warning-level check doesn't require a signature change).
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledLibrary {
    pub fn new(ast: LibraryAst, types: TypedAst, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            ast,
            types,
            diagnostics,
        }
    }
}
