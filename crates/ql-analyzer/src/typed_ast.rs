//! Out-of-band static type table. `ql-ast::Expr` carries no type field
//! (see `expression.rs`'s module doc), so the resolver records its
//! bottom-up inference here, keyed by source span.
//!
//! Spans are unique per syntactic occurrence in practice but are not
//! guaranteed unique (two distinct zero-width spans at the same offset
//! would collide); we accept that as a simplification rather than
//! giving every `Expr` node a synthetic id.

use ql_diagnostics::Span;
use ql_model::TypeInfo;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct TypedAst {
    types: HashMap<Span, TypeInfo>,
}

impl TypedAst {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    pub fn record(&mut self, span: Span, ty: TypeInfo) {
        self.types.insert(span, ty);
    }

    pub fn type_of(&self, span: Span) -> Option<&TypeInfo> {
        self.types.get(&span)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_diagnostics::Position;

    #[test]
    fn records_and_recalls_a_span() {
        let mut table = TypedAst::new();
        let pos = Position {
            offset: 0,
            line: 1,
            column: 1,
        };
        let span = Span::new(pos, pos);
        table.record(span, TypeInfo::system("Integer"));
        assert_eq!(table.type_of(span).unwrap().name, "Integer");
    }
}
