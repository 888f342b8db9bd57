//! Name/scope resolution and approximate static typing for a parsed CQL
//! library (spec.md §4.2, §4.5), producing a [`CompiledLibrary`] that
//! `ql-evaluator` walks.
//!
//! This crate does not order definitions or detect cycles among them;
//! see `compiled.rs`'s module doc for why that's the evaluator's job.

mod compiled;
mod resolver;
mod scope;
mod typed_ast;

pub use compiled::CompiledLibrary;
pub use typed_ast::TypedAst;

use ql_ast::LibraryAst;
use ql_diagnostics::Diagnostic;
use ql_registry::Registry;
use resolver::Resolver;

/// Compiles a parsed library against the standard built-in function
/// table. Most callers want this; use [`compile_with_registry`] when
/// the evaluator has extended or replaced the registry.
pub fn compile(library: LibraryAst) -> Result<CompiledLibrary, Vec<Diagnostic>> {
    let registry = ql_registry::build_standard_registry();
    compile_with_registry(library, &registry)
}

/// Compiles a parsed library, resolving function-call names against
/// `registry` in addition to the library's own `define function`
/// declarations and the fixed set of evaluator-only special forms.
pub fn compile_with_registry(
    library: LibraryAst,
    registry: &Registry,
) -> Result<CompiledLibrary, Vec<Diagnostic>> {
    let mut resolver = Resolver::new(&library, registry);
    resolver.run();

    let Resolver {
        diagnostics, types, ..
    } = resolver;

    if diagnostics.iter().any(Diagnostic::is_fatal) {
        Err(diagnostics)
    } else {
        Ok(CompiledLibrary::new(library, types, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_library() {
        let ast = ql_parser::parse_cql(
            r#"
            library Demo version '1.0.0'
            context Patient

            define "Answer": 1 + 1
            "#,
        )
        .expect("library parses");
        let compiled = compile(ast).expect("library resolves");
        assert!(compiled.diagnostics.is_empty());
    }

    #[test]
    fn reports_unresolved_function_call() {
        let ast = ql_parser::parse_cql(
            r#"
            library Demo version '1.0.0'
            define "Bad": thisFunctionDoesNotExist()
            "#,
        )
        .expect("library parses");
        let err = compile(ast).expect_err("unresolved call is fatal");
        assert!(err
            .iter()
            .any(|d| d.code == ql_diagnostics::DiagnosticCode::UnresolvedIdentifier));
    }

    #[test]
    fn resolves_include_alias_qualified_calls() {
        let mut ast = ql_parser::parse_cql(
            r#"
            library Demo version '1.0.0'
            include Common version '1.0.0' called Com
            define "X": Com.SomeHelper()
            "#,
        )
        .expect("library parses");
        // Guard against the parser changing its include-alias default
        // before this test would otherwise silently stop exercising it.
        assert_eq!(ast.includes.get("Common").unwrap().alias, "Com");
        let compiled = compile(std::mem::take(&mut ast)).expect("resolves via alias");
        assert!(compiled.diagnostics.is_empty());
    }
}
