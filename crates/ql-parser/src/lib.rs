//! Tokenizer and parser for FHIRPath expressions and CQL libraries
//! (spec.md §4.1). Two public entry points mirror spec.md §6.1:
//! [`parse_fhirpath`] for a single expression, [`parse_cql`] for a full
//! library.

pub mod cql_parser;
pub mod error;
pub mod lexer;
pub mod pratt;
pub mod token;

pub use error::{ParseError, ParseResult};
pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};

use ql_ast::{Expr, LibraryAst};
use ql_diagnostics::{Diagnostic, DiagnosticCode, Position, Span};

fn lex_err_to_diagnostic(err: LexError) -> Diagnostic {
    let pos = Position {
        offset: err.offset,
        line: err.line,
        column: err.column,
    };
    Diagnostic::error(DiagnosticCode::ParseError, err.message).with_span(Span::point(pos))
}

/// Parse a single FHIRPath (or bare CQL expression) into an AST.
pub fn parse_fhirpath(source: &str) -> Result<Expr, Vec<Diagnostic>> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| vec![lex_err_to_diagnostic(e)])?;
    pratt::Parser::new(&tokens)
        .parse_expression_entry()
        .map_err(|e| vec![Diagnostic::from(e)])
}

/// Parse a full CQL library (header through definitions).
pub fn parse_cql(source: &str) -> Result<LibraryAst, Vec<Diagnostic>> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| vec![lex_err_to_diagnostic(e)])?;
    cql_parser::LibraryParser::new(&tokens)
        .parse_library()
        .map_err(|e| vec![Diagnostic::from(e)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fhirpath_reports_diagnostics_on_error() {
        let result = parse_fhirpath("1 +");
        assert!(result.is_err());
    }

    #[test]
    fn parse_cql_handles_minimal_library() {
        let ast = parse_cql(r#"library Minimal version '1.0.0'"#).unwrap();
        assert_eq!(ast.header.unwrap().name, "Minimal");
    }

    #[test]
    fn parse_fhirpath_roundtrips_simple_path() {
        let expr = parse_fhirpath("Patient.name.family").unwrap();
        assert!(matches!(expr.kind, ql_ast::ExprKind::Path { .. }));
    }
}
