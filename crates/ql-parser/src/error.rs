//! Parser errors, always convertible to a [`ql_diagnostics::Diagnostic`]
//! rather than unwound as a panic (spec.md §4.1).

use ql_diagnostics::{Diagnostic, DiagnosticCode, Position, Span};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn at_point(message: impl Into<String>, offset: u32, line: u32, column: u32) -> Self {
        let pos = Position {
            offset,
            line,
            column,
        };
        Self::new(message, Span::point(pos))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Diagnostic::error(DiagnosticCode::ParseError, err.message).with_span(err.span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
