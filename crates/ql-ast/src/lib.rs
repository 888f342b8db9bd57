//! Abstract syntax tree shared by the FHIRPath and CQL front ends.
//!
//! Module-design note: FHIRPath expressions are a strict subset of CQL
//! expressions (spec.md §1), so a single `ExprKind` covers both; only
//! library-level declarations (`cql` module) are CQL-specific.

pub mod cql;
pub mod expression;
pub mod operator;

pub use cql::{
    AccessLevel, CodeSystemDecl, ContextDecl, Definition, FunctionDecl, FunctionParam,
    IncludeDecl, LibraryAst, LibraryHeader, ParameterDecl, UsingDecl, ValueSetDecl,
};
pub use expression::{
    Expr, ExprKind, LiteralValue, QueryExpr, QuerySource, ReturnClause, SortKey, TypeOp,
};
pub use operator::{BinaryOperator, UnaryOperator};
