//! Name resolution and approximate bottom-up type inference (spec.md
//! §4.2, §4.5).
//!
//! Resolution is deliberately permissive about bare property-like
//! identifiers and path members: FHIR Navigator treats an unknown
//! member as an empty result rather than an error (spec.md §4.4 rule
//! 5), and validating a property name against a real StructureDefinition
//! is an explicit Non-goal. What this resolver *does* check concretely:
//! function-call names (against the registry, library-defined
//! functions, and a fixed set of evaluator-only special forms),
//! lambda-scoped special variables (`$this`/`$index`/`$total`), and
//! include-alias-qualified calls.

use crate::scope::{ScopeKind, ScopeStack};
use crate::typed_ast::TypedAst;
use ql_ast::{
    BinaryOperator, Expr, ExprKind, FunctionDecl, LibraryAst, LiteralValue, QueryExpr, TypeOp,
    UnaryOperator,
};
use ql_diagnostics::{Diagnostic, DiagnosticCode, Span};
use ql_model::{types::conversion_cost, TypeInfo};
use ql_registry::Registry;
use rustc_hash::FxHashSet;

/// Lambda-taking forms whose argument(s) are evaluated with an implicit
/// `$this` (and, for `aggregate`, `$total`) bound. These have no entry
/// in `ql-registry` because they need the expression evaluator itself;
/// see that crate's module doc.
const LAMBDA_TAKING_FORMS: &[&str] = &["where", "select", "all", "any", "exists", "repeat"];
const AGGREGATE_FORM: &str = "aggregate";

/// Other forms the evaluator implements directly (context-dependent or
/// otherwise outside `ql-registry`'s pure-value scope) plus synthetic
/// call names the parser introduces (`Retrieve` for `[Type: ...]`).
const OTHER_SPECIAL_FORMS: &[&str] = &[
    "sort", "iif", "resolve", "Today", "Now", "TimeOfDay", "Retrieve", "Tuple", "Interval",
];

fn parse_type_name(type_name: &str) -> TypeInfo {
    match type_name.split_once('.') {
        Some((namespace, name)) => TypeInfo {
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        None => TypeInfo::system(type_name),
    }
}

fn widen_numeric(left: &TypeInfo, right: &TypeInfo) -> TypeInfo {
    if left.namespace != "System" || right.namespace != "System" {
        return TypeInfo::system("Any");
    }
    if conversion_cost(&left.name, &right.name).is_some() {
        right.clone()
    } else if conversion_cost(&right.name, &left.name).is_some() {
        left.clone()
    } else {
        TypeInfo::system("Any")
    }
}

fn binary_result_type(op: BinaryOperator, left: &TypeInfo, right: &TypeInfo) -> TypeInfo {
    use BinaryOperator::*;
    match op {
        Equal | NotEqual | Equivalent | NotEquivalent | Less | LessOrEqual | Greater
        | GreaterOrEqual | In | Contains | And | Or | Xor | Implies | Is | Between
        | Overlaps | Before | After | Meets | Starts | Ends | During | Includes => {
            TypeInfo::system("Boolean")
        }
        Add | Subtract | Multiply | Divide | IntegerDivide | Modulo | Power => {
            widen_numeric(left, right)
        }
        Concat => TypeInfo::system("String"),
        Union | As => left.clone(),
    }
}

fn unify(a: TypeInfo, b: &TypeInfo) -> TypeInfo {
    if &a == b {
        a
    } else {
        TypeInfo::system("Any")
    }
}

pub(crate) struct Resolver<'a> {
    library: &'a LibraryAst,
    registry: &'a Registry,
    function_names: FxHashSet<String>,
    include_aliases: FxHashSet<String>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) types: TypedAst,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(library: &'a LibraryAst, registry: &'a Registry) -> Self {
        let function_names = library.functions.iter().map(|f| f.name.clone()).collect();
        let include_aliases = library.includes.values().map(|i| i.alias.clone()).collect();
        Self {
            library,
            registry,
            function_names,
            include_aliases,
            diagnostics: Vec::new(),
            types: TypedAst::new(),
        }
    }

    pub(crate) fn run(&mut self) {
        self.check_overloads();

        for definition in self.library.definitions.values() {
            let mut scopes = ScopeStack::new();
            self.infer(&mut scopes, &definition.body);
        }

        for function in &self.library.functions {
            let mut scopes = ScopeStack::new();
            scopes.push(ScopeKind::Lambda);
            for param in &function.params {
                scopes.bind(param.name.clone(), parse_type_name(&param.type_name));
            }
            self.infer(&mut scopes, &function.body);
            scopes.pop();
        }
    }

    /// Best-effort duplicate-signature detection for CQL's function
    /// multi-dispatch (spec.md §4.2): two functions with the same name
    /// and identical declared parameter types can never be disambiguated
    /// by argument type at a call site.
    fn check_overloads(&mut self) {
        let functions = &self.library.functions;
        for (i, a) in functions.iter().enumerate() {
            for b in &functions[i + 1..] {
                if a.name == b.name && signature_matches(a, b) {
                    self.diagnostics.push(Diagnostic::error(
                        DiagnosticCode::AmbiguousOverload,
                        format!(
                            "function `{}` is declared more than once with the same parameter types",
                            a.name
                        ),
                    ));
                }
            }
        }
    }

    fn infer(&mut self, scopes: &mut ScopeStack, expr: &Expr) -> TypeInfo {
        let ty = self.infer_kind(scopes, expr);
        self.types.record(expr.span, ty.clone());
        ty
    }

    fn infer_kind(&mut self, scopes: &mut ScopeStack, expr: &Expr) -> TypeInfo {
        match &expr.kind {
            ExprKind::Literal(lit) => infer_literal(lit),
            ExprKind::Identifier(name) => self.infer_identifier(scopes, name),
            ExprKind::Variable(name) => self.infer_variable(scopes, expr.span, name),
            ExprKind::Path { receiver, member: _ } => {
                self.infer(scopes, receiver);
                // Unknown members resolve to Any, not an error: FHIR
                // Navigator's "unknown member -> empty" rule.
                TypeInfo::system("Any")
            }
            ExprKind::Index { base, index } => {
                self.infer(scopes, base);
                self.infer(scopes, index);
                TypeInfo::system("Any")
            }
            ExprKind::Call { name, args } => {
                self.infer_call(scopes, expr.span, name, args, None, None)
            }
            ExprKind::MethodCall {
                receiver,
                name,
                args,
            } => {
                let receiver_ty = self.infer(scopes, receiver);
                let alias = match &receiver.kind {
                    ExprKind::Identifier(id) => Some(id.clone()),
                    _ => None,
                };
                self.infer_call(
                    scopes,
                    expr.span,
                    name,
                    args,
                    alias.as_deref(),
                    Some(&receiver_ty),
                )
            }
            ExprKind::Unary { op, operand } => {
                let inner = self.infer(scopes, operand);
                match op {
                    UnaryOperator::Not => TypeInfo::system("Boolean"),
                    UnaryOperator::Negate | UnaryOperator::Positive => inner,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let lt = self.infer(scopes, left);
                let rt = self.infer(scopes, right);
                binary_result_type(*op, &lt, &rt)
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.infer(scopes, condition);
                let then_ty = self.infer(scopes, then_branch);
                match else_branch {
                    Some(else_expr) => {
                        let else_ty = self.infer(scopes, else_expr);
                        unify(then_ty, &else_ty)
                    }
                    None => TypeInfo::system("Any"),
                }
            }
            ExprKind::Case {
                comparand,
                whens,
                else_branch,
            } => {
                if let Some(c) = comparand {
                    self.infer(scopes, c);
                }
                let mut result: Option<TypeInfo> = None;
                for (when_expr, then_expr) in whens {
                    self.infer(scopes, when_expr);
                    let t = self.infer(scopes, then_expr);
                    result = Some(match result {
                        None => t,
                        Some(prev) => unify(prev, &t),
                    });
                }
                let else_ty = self.infer(scopes, else_branch);
                match result {
                    Some(t) => unify(t, &else_ty),
                    None => else_ty,
                }
            }
            ExprKind::Let { name, value, body } => {
                let value_ty = self.infer(scopes, value);
                scopes.with_scope(ScopeKind::Let, |scopes| {
                    scopes.bind(name.clone(), value_ty);
                    self.infer(scopes, body)
                })
            }
            ExprKind::IntervalLiteral { low, high, .. } => {
                if let Some(low) = low {
                    self.infer(scopes, low);
                }
                if let Some(high) = high {
                    self.infer(scopes, high);
                }
                TypeInfo::system("Interval")
            }
            ExprKind::ListLiteral(items) => {
                for item in items {
                    self.infer(scopes, item);
                }
                TypeInfo::system("List")
            }
            ExprKind::TupleLiteral(fields) => {
                for (_, value) in fields {
                    self.infer(scopes, value);
                }
                TypeInfo::system("Tuple")
            }
            ExprKind::Lambda { params, body } => scopes.with_scope(ScopeKind::Lambda, |scopes| {
                for param in params {
                    scopes.bind(param.clone(), TypeInfo::system("Any"));
                }
                self.infer(scopes, body)
            }),
            ExprKind::TypeExpr {
                op,
                expr: inner,
                type_name,
            } => {
                self.infer(scopes, inner);
                match op {
                    TypeOp::Is => TypeInfo::system("Boolean"),
                    TypeOp::As => parse_type_name(type_name),
                }
            }
            ExprKind::Exists { source, condition } => {
                let source_ty = self.infer(scopes, source);
                if let Some(condition) = condition {
                    scopes.with_scope(ScopeKind::Lambda, |scopes| {
                        scopes.bind("$this", source_ty.clone());
                        self.infer(scopes, condition)
                    });
                }
                TypeInfo::system("Boolean")
            }
            ExprKind::Query(query) => self.infer_query(scopes, query),
        }
    }

    fn infer_identifier(&self, scopes: &ScopeStack, name: &str) -> TypeInfo {
        if let Some(ty) = scopes.lookup(name) {
            return ty.clone();
        }
        if let Some(param) = self.library.parameters.get(name) {
            return param
                .type_name
                .as_deref()
                .map(parse_type_name)
                .unwrap_or_else(|| TypeInfo::system("Any"));
        }
        if let Some(def) = self.library.definitions.get(name) {
            return def
                .declared_type
                .as_deref()
                .map(parse_type_name)
                .unwrap_or_else(|| TypeInfo::system("Any"));
        }
        // Otherwise: an implicit context-model property reference
        // (`Patient.active` reached bare from within a `Patient` context)
        // which this crate cannot validate without a schema. Permissive
        // by design; see module doc.
        TypeInfo::system("Any")
    }

    fn infer_variable(&mut self, scopes: &ScopeStack, span: Span, name: &str) -> TypeInfo {
        if let Some(rest) = name.strip_prefix('%') {
            let _ = rest;
            return TypeInfo::system("Any");
        }
        if matches!(name, "$this" | "$index" | "$total") {
            if let Some(ty) = scopes.lookup(name) {
                return ty.clone();
            }
            if scopes.in_lambda() {
                return TypeInfo::system("Any");
            }
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::UnresolvedIdentifier,
                    format!("`{name}` is only valid inside a lambda or query clause"),
                )
                .with_span(span),
            );
            return TypeInfo::system("Any");
        }
        scopes
            .lookup(name)
            .cloned()
            .unwrap_or_else(|| TypeInfo::system("Any"))
    }

    #[allow(clippy::too_many_arguments)]
    fn infer_call(
        &mut self,
        scopes: &mut ScopeStack,
        span: Span,
        name: &str,
        args: &[Expr],
        receiver_alias: Option<&str>,
        receiver_ty: Option<&TypeInfo>,
    ) -> TypeInfo {
        let alias_qualified = receiver_alias
            .map(|alias| self.include_aliases.contains(alias))
            .unwrap_or(false);

        let known = alias_qualified
            || self.registry.contains(name)
            || self.function_names.contains(name)
            || LAMBDA_TAKING_FORMS.contains(&name)
            || name == AGGREGATE_FORM
            || OTHER_SPECIAL_FORMS.contains(&name);

        if !known {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::UnresolvedIdentifier,
                    format!("function `{name}` is not defined"),
                )
                .with_span(span),
            );
        }

        let needs_this = LAMBDA_TAKING_FORMS.contains(&name) || name == AGGREGATE_FORM;
        if needs_this {
            let element_ty = receiver_ty.cloned().unwrap_or_else(|| TypeInfo::system("Any"));
            scopes.with_scope(ScopeKind::Lambda, |scopes| {
                scopes.bind("$this", element_ty.clone());
                scopes.bind("$index", TypeInfo::system("Integer"));
                if name == AGGREGATE_FORM {
                    scopes.bind("$total", TypeInfo::system("Any"));
                }
                for arg in args {
                    self.infer(scopes, arg);
                }
            });
        } else {
            for arg in args {
                self.infer(scopes, arg);
            }
        }

        TypeInfo::system("Any")
    }

    fn infer_query(&mut self, scopes: &mut ScopeStack, query: &QueryExpr) -> TypeInfo {
        scopes.with_scope(ScopeKind::Query, |scopes| {
            let mut last_ty = TypeInfo::system("Any");
            for source in &query.sources {
                let source_ty = self.infer(scopes, &source.expr);
                scopes.bind(source.alias.clone(), source_ty.clone());
                scopes.bind("$this", source_ty.clone());
                last_ty = source_ty;
            }
            scopes.bind("$index", TypeInfo::system("Integer"));
            scopes.bind("$total", TypeInfo::system("Any"));

            for (name, value) in &query.lets {
                let value_ty = self.infer(scopes, value);
                scopes.bind(name.clone(), value_ty);
            }

            if let Some(where_clause) = &query.where_clause {
                self.infer(scopes, where_clause);
            }

            for key in &query.sort {
                self.infer(scopes, &key.expr);
            }

            match &query.ret {
                Some(ret) => self.infer(scopes, &ret.expr),
                None => last_ty,
            }
        })
    }
}

fn infer_literal(lit: &LiteralValue) -> TypeInfo {
    match lit {
        LiteralValue::Boolean(_) => TypeInfo::system("Boolean"),
        LiteralValue::Integer(_) => TypeInfo::system("Integer"),
        LiteralValue::Long(_) => TypeInfo::system("Long"),
        LiteralValue::Decimal(_) => TypeInfo::system("Decimal"),
        LiteralValue::String(_) => TypeInfo::system("String"),
        LiteralValue::Date(_) => TypeInfo::system("Date"),
        LiteralValue::DateTime(_) => TypeInfo::system("DateTime"),
        LiteralValue::Time(_) => TypeInfo::system("Time"),
        LiteralValue::Quantity { .. } => TypeInfo::system("Quantity"),
        LiteralValue::Null => TypeInfo::system("Any"),
    }
}

fn signature_matches(a: &FunctionDecl, b: &FunctionDecl) -> bool {
    a.params.len() == b.params.len()
        && a.params
            .iter()
            .zip(&b.params)
            .all(|(pa, pb)| pa.type_name == pb.type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_ast::{AccessLevel, Definition, FunctionParam};
    use ql_diagnostics::Position;
    use ql_registry::build_standard_registry;

    fn span() -> Span {
        let pos = Position {
            offset: 0,
            line: 1,
            column: 1,
        };
        Span::new(pos, pos)
    }

    fn literal(lit: LiteralValue) -> Expr {
        Expr::new(ExprKind::Literal(lit), span())
    }

    #[test]
    fn duplicate_function_signature_is_ambiguous() {
        let mut library = LibraryAst::default();
        let decl = FunctionDecl {
            name: "Foo".to_string(),
            access: AccessLevel::Public,
            params: vec![FunctionParam {
                name: "x".to_string(),
                type_name: "System.Integer".to_string(),
            }],
            return_type: None,
            body: literal(LiteralValue::Integer(1)),
        };
        library.functions.push(decl.clone());
        library.functions.push(decl);

        let registry = build_standard_registry();
        let mut resolver = Resolver::new(&library, &registry);
        resolver.run();
        assert!(resolver
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::AmbiguousOverload));
    }

    #[test]
    fn unknown_function_call_is_reported() {
        let mut library = LibraryAst::default();
        library.definitions.insert(
            "X".to_string(),
            Definition {
                name: "X".to_string(),
                access: AccessLevel::Public,
                declared_type: None,
                body: Expr::new(
                    ExprKind::Call {
                        name: "totallyMadeUp".to_string(),
                        args: Default::default(),
                    },
                    span(),
                ),
            },
        );
        let registry = build_standard_registry();
        let mut resolver = Resolver::new(&library, &registry);
        resolver.run();
        assert!(resolver
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UnresolvedIdentifier));
    }

    #[test]
    fn known_registry_function_resolves_without_diagnostic() {
        let mut library = LibraryAst::default();
        library.definitions.insert(
            "X".to_string(),
            Definition {
                name: "X".to_string(),
                access: AccessLevel::Public,
                declared_type: None,
                body: Expr::new(
                    ExprKind::Call {
                        name: "count".to_string(),
                        args: Default::default(),
                    },
                    span(),
                ),
            },
        );
        let registry = build_standard_registry();
        let mut resolver = Resolver::new(&library, &registry);
        resolver.run();
        assert!(resolver.diagnostics.is_empty());
    }

    #[test]
    fn this_outside_lambda_is_unresolved() {
        let mut library = LibraryAst::default();
        library.definitions.insert(
            "X".to_string(),
            Definition {
                name: "X".to_string(),
                access: AccessLevel::Public,
                declared_type: None,
                body: Expr::new(ExprKind::Variable("$this".to_string()), span()),
            },
        );
        let registry = build_standard_registry();
        let mut resolver = Resolver::new(&library, &registry);
        resolver.run();
        assert!(resolver
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UnresolvedIdentifier));
    }

    #[test]
    fn literal_types_are_recorded() {
        let mut library = LibraryAst::default();
        let body = literal(LiteralValue::Integer(42));
        let body_span = body.span;
        library.definitions.insert(
            "X".to_string(),
            Definition {
                name: "X".to_string(),
                access: AccessLevel::Public,
                declared_type: None,
                body,
            },
        );
        let registry = build_standard_registry();
        let mut resolver = Resolver::new(&library, &registry);
        resolver.run();
        assert_eq!(resolver.types.type_of(body_span).unwrap().name, "Integer");
    }
}
