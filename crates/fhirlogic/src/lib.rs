//! FHIRPath and CQL evaluation engine.
//!
//! A complete implementation of the FHIRPath and CQL expression
//! languages for FHIR resources: a shared lexer/parser, a typed AST, a
//! name/scope resolver, and a tree-walking evaluator over a unified FHIR
//! value model with three-valued logic, quantity/unit arithmetic,
//! temporal precision semantics, and collection algebra.
//!
//! This crate re-exports the cooperating workspace crates and adds the
//! top-level [`Engine`] / [`EngineConfig`] pair spec.md §6.1's
//! programmatic API is built against.

pub mod engine;
pub mod error;
pub mod serialize;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};
pub use serialize::{render_option, render_value};

// Re-exports so a consumer of this crate alone never needs to depend on
// the workspace members directly.
pub use ql_ast as ast;
pub use ql_analyzer as analyzer;
pub use ql_diagnostics as diagnostics;
pub use ql_evaluator as evaluator;
pub use ql_model as model;
pub use ql_parser as parser;
pub use ql_registry as registry;

pub use ql_diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use ql_evaluator::{CancellationToken, Env};
pub use ql_model::{Collection, Value};
