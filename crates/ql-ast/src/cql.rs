//! CQL-only declaration nodes (spec.md §3.2 "CQL-only" list, §3.3
//! Library, SPEC_FULL.md §3.5).

use crate::expression::Expr;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessLevel {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryHeader {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsingDecl {
    pub model: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDecl {
    pub name: String,
    pub version: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSetDecl {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeSystemDecl {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextDecl {
    pub name: String,
}

impl Default for ContextDecl {
    fn default() -> Self {
        Self {
            name: "Patient".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub access: AccessLevel,
    pub declared_type: Option<String>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub access: AccessLevel,
    pub params: Vec<FunctionParam>,
    pub return_type: Option<String>,
    pub body: Expr,
}

/// A parsed (not yet resolved) CQL library: the AST Builder's output for
/// §3.3. Name/scope resolution and type assignment happen in
/// `ql-analyzer`, producing a `CompiledLibrary`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibraryAst {
    pub header: Option<LibraryHeader>,
    pub using: Option<UsingDecl>,
    pub includes: IndexMap<String, IncludeDecl>,
    pub parameters: IndexMap<String, ParameterDecl>,
    pub valuesets: IndexMap<String, ValueSetDecl>,
    pub codesystems: IndexMap<String, CodeSystemDecl>,
    pub context: ContextDecl,
    pub definitions: IndexMap<String, Definition>,
    pub functions: Vec<FunctionDecl>,
}
