//! The tree-walking evaluator (spec.md §4). Every expression evaluates
//! to a [`Collection`] internally -- empty means Null/absence in both
//! FHIRPath and CQL, since FHIRPath's three-valued logic already runs on
//! empty-collection propagation. `lib.rs`'s public entry points convert
//! this to the right shape at the API boundary.

use rustc_hash::FxHashMap;
use rust_decimal::Decimal;

use ql_ast::{BinaryOperator, Expr, ExprKind, LiteralValue, QueryExpr, TypeOp, UnaryOperator};
use ql_diagnostics::{Diagnostic, DiagnosticCode};
use ql_model::{
    AllenRelation, Collection, Interval, PrecisionDate, PrecisionDateTime, PrecisionTime,
    Quantity, TemporalPrecision, Tuple, Value,
};
use ql_registry::Registry;

use crate::context::{CancellationToken, EvalConfig, Env};
use crate::library::{EntryOutcome, LibraryManager};
use crate::{arithmetic, navigator, temporal_ops};

/// Lambda-taking forms the registry does not cover; mirrors
/// `ql-analyzer`'s resolver list so both crates agree on what counts as
/// a special form.
const LAMBDA_TAKING_FORMS: &[&str] = &["where", "select", "all", "any", "exists", "repeat"];

/// Registry functions whose receiver argument is passed through as a
/// whole `Value::List`, rather than scalar-unwrapped (mirrors each
/// function's own doc comment in `ql-registry::functions`).
const LIST_ARG_FUNCTIONS: &[&str] = &[
    "union", "intersect", "except", "count", "empty", "distinct", "flatten", "first", "last", "exists",
];

pub struct Evaluator<'a> {
    registry: &'a Registry,
    library: Option<&'a LibraryManager>,
    config: &'a EvalConfig,
    env: &'a Env,
    cancellation: &'a CancellationToken,
    scopes: Vec<FxHashMap<String, Collection>>,
    focus: Collection,
    depth: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        registry: &'a Registry,
        library: Option<&'a LibraryManager>,
        config: &'a EvalConfig,
        env: &'a Env,
        cancellation: &'a CancellationToken,
        focus: Collection,
    ) -> Self {
        let mut root = FxHashMap::default();
        root.insert("$this".to_string(), focus.clone());
        Self {
            registry,
            library,
            config,
            env,
            cancellation,
            scopes: vec![root],
            focus,
            depth: 0,
            diagnostics: Vec::new(),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: impl Into<String>, value: Collection) {
        self.scopes.last_mut().expect("root scope always present").insert(name.into(), value);
    }

    fn lookup_scope(&self, name: &str) -> Option<Collection> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name).cloned())
    }

    fn enter_recursion(&mut self) -> bool {
        self.depth += 1;
        if self.depth > self.config.recursion_limit {
            self.push_diagnostic(Diagnostic::error(
                DiagnosticCode::RecursionLimit,
                format!("recursion limit of {} exceeded", self.config.recursion_limit),
            ));
            false
        } else {
            true
        }
    }

    fn exit_recursion(&mut self) {
        self.depth -= 1;
    }

    /// Records a runtime diagnostic (spec.md §7: these pair with a
    /// Null/degraded `Value` rather than aborting evaluation).
    fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(code = %diagnostic.code, message = %diagnostic.message, "runtime diagnostic");
        self.diagnostics.push(diagnostic);
    }

    pub fn eval(&mut self, expr: &Expr) -> Collection {
        tracing::trace!(span = %expr.span, "evaluating node");
        if self.cancellation.is_cancelled() {
            self.push_diagnostic(Diagnostic::error(DiagnosticCode::Cancelled, "evaluation cancelled"));
            return Collection::new();
        }
        match &expr.kind {
            ExprKind::Literal(lit) => self.eval_literal(lit),
            ExprKind::Identifier(name) => self.eval_identifier(name),
            ExprKind::Variable(name) => self.eval_variable(name),
            ExprKind::Path { receiver, member } => {
                let base = self.eval(receiver);
                navigator::navigate_collection(&base, member)
            }
            ExprKind::Index { base, index } => self.eval_index(base, index),
            ExprKind::Call { name, args } => self.eval_call(None, name, args),
            ExprKind::MethodCall { receiver, name, args } => {
                let base = self.eval(receiver);
                self.eval_call(Some(base), name, args)
            }
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ExprKind::If { condition, then_branch, else_branch } => {
                if self.eval_boolean_context(condition) {
                    self.eval(then_branch)
                } else {
                    match else_branch {
                        Some(e) => self.eval(e),
                        None => Collection::new(),
                    }
                }
            }
            ExprKind::Case { comparand, whens, else_branch } => {
                self.eval_case(comparand.as_deref(), whens, else_branch)
            }
            ExprKind::Let { name, value, body } => {
                let v = self.eval(value);
                self.push_scope();
                self.bind(name.clone(), v);
                let result = self.eval(body);
                self.pop_scope();
                result
            }
            ExprKind::IntervalLiteral { low, high, low_closed, high_closed } => {
                self.eval_interval_literal(low.as_deref(), high.as_deref(), *low_closed, *high_closed)
            }
            ExprKind::ListLiteral(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.eval(item).into_vec());
                }
                Collection::from_vec(out)
            }
            ExprKind::TupleLiteral(fields) => {
                let mut tuple = Tuple::new();
                for (name, value_expr) in fields {
                    tuple.insert(name.clone(), self.eval_singleton(value_expr));
                }
                Collection::single(Value::Tuple(tuple))
            }
            ExprKind::Lambda { .. } => {
                self.push_diagnostic(Diagnostic::warning(
                    DiagnosticCode::UnsupportedOperation,
                    "a lambda expression cannot be evaluated outside a lambda-taking form",
                ));
                Collection::new()
            }
            ExprKind::TypeExpr { op, expr: inner, type_name } => {
                self.eval_type_expr(*op, inner, type_name)
            }
            ExprKind::Exists { source, condition } => self.eval_exists_node(source, condition.as_deref()),
            ExprKind::Query(query) => self.eval_query(query),
        }
    }

    /// Evaluates `expr` and collapses the result to a single `Value`,
    /// with `Value::List` standing in for empty/multi-element results --
    /// used for tuple field values, which are not themselves
    /// collections in the CQL data model.
    fn eval_singleton(&mut self, expr: &Expr) -> Value {
        let collection = self.eval(expr);
        match collection.len() {
            1 => collection.into_vec().remove(0),
            _ => Value::List(collection),
        }
    }

    fn eval_literal(&mut self, lit: &LiteralValue) -> Collection {
        let value = match lit {
            LiteralValue::Null => return Collection::new(),
            LiteralValue::Boolean(b) => Value::Boolean(*b),
            LiteralValue::Integer(i) => Value::Integer(*i),
            LiteralValue::Long(l) => Value::Long(*l),
            LiteralValue::Decimal(s) => match s.parse::<Decimal>() {
                Ok(d) => Value::Decimal(d),
                Err(_) => return Collection::new(),
            },
            LiteralValue::String(s) => Value::String(s.clone()),
            LiteralValue::Date(s) => match navigator::parse_date_literal(s) {
                Some(d) => Value::Date(d),
                None => return Collection::new(),
            },
            LiteralValue::DateTime(s) => match navigator::parse_datetime_literal(s) {
                Some(dt) => Value::DateTime(dt),
                None => return Collection::new(),
            },
            LiteralValue::Time(s) => match navigator::parse_time_literal(s) {
                Some(t) => Value::Time(t),
                None => return Collection::new(),
            },
            LiteralValue::Quantity { value, unit } => match value.parse::<Decimal>() {
                Ok(d) => Value::Quantity(Quantity::new(d, Some(unit.clone()))),
                Err(_) => return Collection::new(),
            },
        };
        Collection::single(value)
    }

    fn eval_identifier(&mut self, name: &str) -> Collection {
        if let Some(v) = self.lookup_scope(name) {
            return v;
        }
        if let Some(v) = self.env.parameters.get(name) {
            return Collection::single(v.clone());
        }
        if let Some(library) = self.library {
            if library.definition(name).is_some() {
                return self.eval_definition_by_name(name);
            }
            if name == library.library().context.name.as_str() {
                return self.focus.clone();
            }
        }
        navigator::navigate_collection(&self.focus, name)
    }

    fn eval_variable(&mut self, name: &str) -> Collection {
        if let Some(rest) = name.strip_prefix('%') {
            return self
                .env
                .parameters
                .get(rest)
                .map(|v| Collection::single(v.clone()))
                .unwrap_or_default();
        }
        self.lookup_scope(name).unwrap_or_default()
    }

    fn eval_definition_by_name(&mut self, name: &str) -> Collection {
        let Some(library) = self.library else {
            return Collection::new();
        };
        match library.enter(name) {
            EntryOutcome::Cached(Ok(collection)) => collection,
            EntryOutcome::Cached(Err(diagnostic)) => {
                self.push_diagnostic(diagnostic);
                Collection::new()
            }
            EntryOutcome::Cyclic(diagnostic) => {
                self.push_diagnostic(diagnostic);
                Collection::new()
            }
            EntryOutcome::Proceed => {
                if !self.enter_recursion() {
                    library.complete(name, Ok(Collection::new()));
                    return Collection::new();
                }
                let body = library.definition(name).map(|d| d.body.clone());
                let result = match body {
                    Some(body) => self.eval(&body),
                    None => Collection::new(),
                };
                self.exit_recursion();
                library.complete(name, Ok(result.clone()));
                result
            }
        }
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr) -> Collection {
        let base_collection = self.eval(base);
        let idx_collection = self.eval(index);
        match idx_collection.first() {
            Some(Value::Integer(i)) if *i >= 0 => base_collection
                .get(*i as usize)
                .cloned()
                .map(Collection::single)
                .unwrap_or_default(),
            _ => Collection::new(),
        }
    }

    /// Operand evaluation for Kleene's three-valued `and`/`or`/`xor`/
    /// `implies`/`not` (spec.md §3.2): `None` is a legitimate operand
    /// value here (CQL Null), not a type error -- an empty collection and
    /// a non-Boolean singleton both collapse to it. Do not use this for
    /// `where`/`if`/`exists` conditions; use [`Self::eval_boolean_context`]
    /// there, where empty and "wrong type" are distinct outcomes.
    fn eval_boolean(&mut self, expr: &Expr) -> Option<bool> {
        let collection = self.eval(expr);
        match collection.len() {
            1 => match collection.first() {
                Some(Value::Boolean(b)) => Some(*b),
                _ => None,
            },
            _ => None,
        }
    }

    /// Boolean-context coercion (spec.md §4.3 MUST rule): empty coerces to
    /// `false`, a Boolean singleton coerces to itself, any other
    /// collection (non-Boolean singleton, or more than one item) is a
    /// type error that surfaces a `TypeMismatch` diagnostic and is
    /// treated as `false`. Used by `where`, `if`, `exists(condition)`,
    /// `all`/`any`, `case when`, and query `where` clauses.
    fn eval_boolean_context(&mut self, expr: &Expr) -> bool {
        let collection = self.eval(expr);
        match collection.len() {
            0 => false,
            1 => match collection.first() {
                Some(Value::Boolean(b)) => *b,
                Some(other) => {
                    self.push_diagnostic(Diagnostic::warning(
                        DiagnosticCode::TypeMismatch {
                            expected: "Boolean".to_string(),
                            actual: other.type_name().to_string(),
                        },
                        "boolean context requires a Boolean value",
                    ));
                    false
                }
            },
            n => {
                self.push_diagnostic(Diagnostic::warning(
                    DiagnosticCode::TypeMismatch {
                        expected: "Boolean".to_string(),
                        actual: "collection".to_string(),
                    },
                    format!("boolean context requires a single Boolean value, found {n} items"),
                ));
                false
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOperator, operand: &Expr) -> Collection {
        match op {
            UnaryOperator::Not => match self.eval_boolean(operand) {
                Some(b) => Collection::single(Value::Boolean(!b)),
                None => Collection::new(),
            },
            UnaryOperator::Positive => self.eval(operand),
            UnaryOperator::Negate => {
                let collection = self.eval(operand);
                match collection.first() {
                    Some(v) => self.arith_to_collection(arithmetic::negate(v)),
                    None => Collection::new(),
                }
            }
        }
    }

    fn arith_to_collection(&mut self, result: arithmetic::ArithResult) -> Collection {
        match result {
            Ok(Some(v)) => Collection::single(v),
            Ok(None) => Collection::new(),
            Err(diagnostic) => {
                self.push_diagnostic(diagnostic);
                Collection::new()
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> Collection {
        use BinaryOperator::*;
        match op {
            Implies | Or | Xor | And => self.eval_boolean_binary(op, left, right),
            Equal => self.eval_equal(left, right, true),
            NotEqual => self.eval_equal(left, right, false),
            Equivalent => self.eval_equivalent(left, right, true),
            NotEquivalent => self.eval_equivalent(left, right, false),
            Less | LessOrEqual | Greater | GreaterOrEqual => self.eval_compare(op, left, right),
            In => self.eval_membership(left, right, false),
            Contains => self.eval_membership(right, left, false),
            Overlaps | Before | After | Meets | Starts | Ends | During | Includes => {
                self.eval_interval_relation(op, left, right)
            }
            Is => self.eval_is(left, right),
            As => self.eval(left),
            Union => {
                let a = self.eval(left);
                let b = self.eval(right);
                Collection::single(Value::List(a.union(&b)))
            }
            // `x between low and high` is desugared by the parser into
            // `(x >= low) and (x <= high)` before it ever reaches here
            // (ql-parser::pratt's `BinaryOperator::Between` arm), so
            // `ExprKind::Binary { op: Between, .. }` is never constructed.
            Between => unreachable!("the parser desugars `between` before constructing a Binary node"),
            Add => self.eval_arith(left, right, arithmetic::add, 1),
            Subtract => self.eval_arith(left, right, arithmetic::subtract, 1),
            Multiply => self.eval_arith(left, right, arithmetic::multiply, 1),
            Divide => self.eval_arith(left, right, arithmetic::divide, 1),
            IntegerDivide => self.eval_arith(left, right, arithmetic::integer_divide, 1),
            Modulo => self.eval_arith(left, right, arithmetic::modulo, 1),
            Power => self.eval_arith(left, right, arithmetic::power, 1),
            Concat => self.eval_concat(left, right),
        }
    }

    /// Kleene three-valued logic (spec.md §3.1): `false and <empty>` is
    /// `false` and `true or <empty>` is `true` without needing the other
    /// side, but every other combination with an empty operand is
    /// unknown (propagates as an empty `Collection`).
    fn eval_boolean_binary(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> Collection {
        let l = self.eval_boolean(left);
        let result = match op {
            BinaryOperator::And if l == Some(false) => Some(false),
            BinaryOperator::And => kleene_and(l, self.eval_boolean(right)),
            BinaryOperator::Or if l == Some(true) => Some(true),
            BinaryOperator::Or => kleene_or(l, self.eval_boolean(right)),
            BinaryOperator::Xor => kleene_xor(l, self.eval_boolean(right)),
            BinaryOperator::Implies if l == Some(false) => Some(true),
            BinaryOperator::Implies => kleene_implies(l, self.eval_boolean(right)),
            _ => unreachable!(),
        };
        bool_collection(result)
    }

    fn eval_equal(&mut self, left: &Expr, right: &Expr, want_equal: bool) -> Collection {
        let a = self.eval(left);
        let b = self.eval(right);
        let result = collection_equal(&a, &b);
        bool_collection(result.map(|eq| eq == want_equal))
    }

    fn eval_equivalent(&mut self, left: &Expr, right: &Expr, want_equivalent: bool) -> Collection {
        let a = Value::List(self.eval(left));
        let b = Value::List(self.eval(right));
        Collection::single(Value::Boolean(a.equivalent(&b) == want_equivalent))
    }

    fn eval_compare(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> Collection {
        let a = self.eval(left);
        let b = self.eval(right);
        if a.len() != 1 || b.len() != 1 {
            return Collection::new();
        }
        let ordering = a.first().unwrap().partial_cmp_value(b.first().unwrap());
        let result = ordering.map(|o| match op {
            BinaryOperator::Less => o.is_lt(),
            BinaryOperator::LessOrEqual => o.is_le(),
            BinaryOperator::Greater => o.is_gt(),
            BinaryOperator::GreaterOrEqual => o.is_ge(),
            _ => unreachable!(),
        });
        bool_collection(result)
    }

    fn eval_membership(&mut self, item: &Expr, collection_expr: &Expr, _equivalent: bool) -> Collection {
        let item_collection = self.eval(item);
        let collection = self.eval(collection_expr);
        if item_collection.len() != 1 {
            return Collection::new();
        }
        let item_value = item_collection.first().unwrap();
        Collection::single(Value::Boolean(collection.contains(item_value)))
    }

    fn eval_is(&mut self, left: &Expr, right: &Expr) -> Collection {
        let type_name = match &right.kind {
            ExprKind::Identifier(name) => name.clone(),
            _ => return Collection::new(),
        };
        let collection = self.eval(left);
        match collection.first() {
            Some(value) => Collection::single(Value::Boolean(value_matches_type(value, &type_name))),
            None => Collection::new(),
        }
    }

    /// CQL's Allen-relation interval operators (spec.md §4.3). Each
    /// reduces to `Interval::allen_relation`, already an exhaustive
    /// dispatch over the thirteen relations.
    fn eval_interval_relation(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> Collection {
        let a = self.eval(left);
        let b = self.eval(right);
        let (Some(Value::Interval(lhs)), Some(Value::Interval(rhs))) = (a.first(), b.first()) else {
            return Collection::new();
        };
        let result = match op {
            BinaryOperator::Overlaps => lhs.overlaps(rhs),
            BinaryOperator::Before => lhs.allen_relation(rhs) == AllenRelation::Before,
            BinaryOperator::After => lhs.allen_relation(rhs) == AllenRelation::After,
            BinaryOperator::Meets => {
                matches!(lhs.allen_relation(rhs), AllenRelation::Meets | AllenRelation::MetBy)
            }
            BinaryOperator::Starts => lhs.allen_relation(rhs) == AllenRelation::Starts,
            BinaryOperator::Ends => lhs.allen_relation(rhs) == AllenRelation::Finishes,
            BinaryOperator::During => lhs.allen_relation(rhs) == AllenRelation::During,
            BinaryOperator::Includes => lhs.allen_relation(rhs) == AllenRelation::Contains,
            _ => unreachable!(),
        };
        Collection::single(Value::Boolean(result))
    }

    fn eval_concat(&mut self, left: &Expr, right: &Expr) -> Collection {
        let a = self.eval(left);
        let b = self.eval(right);
        let s1 = a.first().map(value_as_concat_str).unwrap_or_default();
        let s2 = b.first().map(value_as_concat_str).unwrap_or_default();
        Collection::single(Value::String(format!("{s1}{s2}")))
    }

    fn eval_arith(
        &mut self,
        left: &Expr,
        right: &Expr,
        op: impl Fn(&Value, &Value) -> arithmetic::ArithResult,
        sign: i64,
    ) -> Collection {
        let a = self.eval(left);
        let b = self.eval(right);
        let (Some(lv), Some(rv)) = (a.first(), b.first()) else {
            return Collection::new();
        };
        if let Some(result) = self.try_temporal_arith(lv, rv, sign) {
            return result;
        }
        if let (Value::Quantity(l), Value::Quantity(r)) = (lv, rv) {
            return match temporal_ops::quantity_add(l, r, sign) {
                Some(q) => Collection::single(Value::Quantity(q)),
                None => Collection::new(),
            };
        }
        self.arith_to_collection(op(lv, rv))
    }

    /// Date/DateTime +/- Quantity calendar arithmetic; only meaningful
    /// for `Add`/`Subtract`, so this returns `None` (meaning "not a
    /// temporal case, fall through to scalar arithmetic") for every
    /// other shape.
    fn try_temporal_arith(&mut self, lv: &Value, rv: &Value, sign: i64) -> Option<Collection> {
        let quantity = match rv {
            Value::Quantity(q) => q,
            _ => return None,
        };
        match lv {
            Value::Date(d) => Some(match temporal_ops::date_plus_quantity(d, quantity, sign) {
                Some(result) => Collection::single(Value::Date(result)),
                None => Collection::new(),
            }),
            Value::DateTime(dt) => Some(match temporal_ops::datetime_plus_quantity(dt, quantity, sign) {
                Some(result) => Collection::single(Value::DateTime(result)),
                None => Collection::new(),
            }),
            _ => None,
        }
    }

    fn eval_case(&mut self, comparand: Option<&Expr>, whens: &[(Expr, Expr)], else_branch: &Expr) -> Collection {
        let comparand_value = comparand.map(|c| self.eval(c));
        for (when_expr, then_expr) in whens {
            let matched = match &comparand_value {
                Some(cv) => {
                    let w = self.eval(when_expr);
                    collection_equal(cv, &w) == Some(true)
                }
                None => self.eval_boolean_context(when_expr),
            };
            if matched {
                return self.eval(then_expr);
            }
        }
        self.eval(else_branch)
    }

    fn eval_interval_literal(
        &mut self,
        low: Option<&Expr>,
        high: Option<&Expr>,
        low_closed: bool,
        high_closed: bool,
    ) -> Collection {
        let low_value = low.map(|e| self.eval_singleton(e)).filter(|v| !matches!(v, Value::List(c) if c.is_empty()));
        let high_value = high.map(|e| self.eval_singleton(e)).filter(|v| !matches!(v, Value::List(c) if c.is_empty()));
        match Interval::new(low_value, high_value, low_closed, high_closed) {
            Ok(interval) => Collection::single(Value::Interval(interval)),
            Err(err) => {
                self.push_diagnostic(Diagnostic::error(
                    DiagnosticCode::UnsupportedOperation,
                    err.to_string(),
                ));
                Collection::new()
            }
        }
    }

    fn eval_type_expr(&mut self, op: TypeOp, inner: &Expr, type_name: &str) -> Collection {
        let collection = self.eval(inner);
        match op {
            TypeOp::Is => match collection.first() {
                Some(value) if collection.len() == 1 => {
                    Collection::single(Value::Boolean(value_matches_type(value, type_name)))
                }
                _ => Collection::single(Value::Boolean(false)),
            },
            TypeOp::As => match collection.first() {
                Some(value) if collection.len() == 1 && value_matches_type(value, type_name) => {
                    Collection::single(value.clone())
                }
                _ => Collection::new(),
            },
        }
    }

    fn eval_exists_node(&mut self, source: &Expr, condition: Option<&Expr>) -> Collection {
        let source_collection = self.eval(source);
        match condition {
            None => Collection::single(Value::Boolean(!source_collection.is_empty())),
            Some(condition) => {
                self.push_scope();
                let mut any = false;
                for (i, item) in source_collection.iter().enumerate() {
                    self.bind("$this", Collection::single(item.clone()));
                    self.bind("$index", Collection::single(Value::Integer(i as i32)));
                    if self.eval_boolean_context(condition) {
                        any = true;
                        break;
                    }
                }
                self.pop_scope();
                Collection::single(Value::Boolean(any))
            }
        }
    }

    fn eval_call(&mut self, receiver: Option<Collection>, name: &str, args: &[Expr]) -> Collection {
        if !self.enter_recursion() {
            return Collection::new();
        }
        let result = self.eval_call_inner(receiver, name, args);
        self.exit_recursion();
        result
    }

    fn eval_call_inner(&mut self, receiver: Option<Collection>, name: &str, args: &[Expr]) -> Collection {
        if receiver.is_none() {
            match name {
                "Today" => return Collection::single(Value::Date(PrecisionDate::new(
                    self.config.now.datetime.date_naive(),
                    TemporalPrecision::Day,
                ))),
                "Now" => return Collection::single(Value::DateTime(self.config.now)),
                "TimeOfDay" => {
                    return Collection::single(Value::Time(PrecisionTime::new(
                        self.config.now.datetime.time(),
                        TemporalPrecision::Millisecond,
                    )))
                }
                "resolve" => {
                    self.push_diagnostic(Diagnostic::warning(
                        DiagnosticCode::UnsupportedOperation,
                        "`resolve` requires a resource store, which this evaluator does not provide",
                    ));
                    return Collection::new();
                }
                "Retrieve" => return self.eval_retrieve(args),
                "DurationBetween" if args.len() == 3 => return self.eval_duration_between(args),
                "DifferenceBetween" if args.len() == 3 => return self.eval_difference_between(args),
                "iif" if args.len() >= 2 => {
                    return if self.eval_boolean_context(&args[0]) {
                        self.eval(&args[1])
                    } else {
                        args.get(2).map(|e| self.eval(e)).unwrap_or_default()
                    };
                }
                "sort" if !args.is_empty() => {
                    let collection = self.eval(&args[0]);
                    return sort_collection(collection);
                }
                _ => {}
            }
        }

        let has_lambda = args.iter().any(|a| matches!(a.kind, ExprKind::Lambda { .. }));
        if has_lambda && (LAMBDA_TAKING_FORMS.contains(&name) || name == "aggregate") {
            return self.eval_lambda_form(receiver, name, args);
        }

        if let Some(library) = self.library {
            let candidates = library.functions_named(name);
            if let Some(func) = candidates
                .iter()
                .find(|f| f.params.len() == args.len() + receiver.iter().len())
                .copied()
            {
                return self.eval_library_function(func, receiver, args);
            }
        }

        let mut values = Vec::new();
        if let Some(r) = receiver {
            values.push(Value::List(r));
        }
        for arg in args {
            values.push(Value::List(self.eval(arg)));
        }
        let coerced = coerce_call_args(name, values);
        match self.registry.call(name, &coerced) {
            Ok(value) => Collection::single(value),
            Err(err) => {
                self.push_diagnostic(Diagnostic::from(err));
                Collection::new()
            }
        }
    }

    /// `<precision> between <low> and <high>` (spec.md §4.3/§8 scenario
    /// 3), desugared by the parser into `Call { name: "DurationBetween",
    /// .. }`. Sub-day precisions are not yet supported since the
    /// calendar-duration helpers only operate on `PrecisionDate`.
    fn eval_duration_between(&mut self, args: &[Expr]) -> Collection {
        let precision = match &args[0].kind {
            ExprKind::Literal(LiteralValue::String(s)) => s.clone(),
            _ => return Collection::new(),
        };
        let low = self.eval(&args[1]);
        let high = self.eval(&args[2]);
        let (Some(low), Some(high)) = (low.first(), high.first()) else {
            return Collection::new();
        };
        let (Some(a), Some(b)) = (value_as_calendar_date(low), value_as_calendar_date(high)) else {
            return Collection::new();
        };
        let result = match precision.as_str() {
            "year" | "years" => Some(temporal_ops::duration_in_years(&a, &b)),
            "month" | "months" => Some(temporal_ops::duration_in_months(&a, &b)),
            "week" | "weeks" => Some(temporal_ops::duration_in_days(&a, &b) / 7),
            "day" | "days" => Some(temporal_ops::duration_in_days(&a, &b)),
            _ => None,
        };
        match result {
            Some(n) => Collection::single(Value::Integer(n as i32)),
            None => {
                self.push_diagnostic(Diagnostic::warning(
                    DiagnosticCode::UnsupportedOperation,
                    format!("duration precision '{precision}' is not supported"),
                ));
                Collection::new()
            }
        }
    }

    /// `difference in <precision> between <low> and <high>` (spec.md
    /// §4.3), desugared by the parser into `Call { name:
    /// "DifferenceBetween", .. }`. Distinct from `DurationBetween`: this
    /// counts calendar-boundary crossings at `precision` rather than a
    /// whole elapsed duration, e.g. the difference in years between
    /// Dec 31 2023 and Jan 1 2024 is 1 even though less than a full year
    /// elapsed.
    fn eval_difference_between(&mut self, args: &[Expr]) -> Collection {
        let precision = match &args[0].kind {
            ExprKind::Literal(LiteralValue::String(s)) => s.clone(),
            _ => return Collection::new(),
        };
        let low = self.eval(&args[1]);
        let high = self.eval(&args[2]);
        let (Some(low), Some(high)) = (low.first(), high.first()) else {
            return Collection::new();
        };
        let (Some(a), Some(b)) = (value_as_calendar_date(low), value_as_calendar_date(high)) else {
            return Collection::new();
        };
        let result = match precision.as_str() {
            "year" | "years" => Some(temporal_ops::difference_in_years(&a, &b)),
            "month" | "months" => Some(temporal_ops::difference_in_months(&a, &b)),
            "week" | "weeks" => Some(temporal_ops::difference_in_days(&a, &b) / 7),
            "day" | "days" => Some(temporal_ops::difference_in_days(&a, &b)),
            _ => None,
        };
        match result {
            Some(n) => Collection::single(Value::Integer(n as i32)),
            None => {
                self.push_diagnostic(Diagnostic::warning(
                    DiagnosticCode::UnsupportedOperation,
                    format!("difference precision '{precision}' is not supported"),
                ));
                Collection::new()
            }
        }
    }

    fn eval_retrieve(&mut self, args: &[Expr]) -> Collection {
        let Some(type_name) = args.first().and_then(expr_as_type_name) else {
            return Collection::new();
        };
        match self.focus.first() {
            Some(Value::Resource(node)) if node.resource_type() == Some(type_name.as_str()) => self.focus.clone(),
            _ => Collection::new(),
        }
    }

    fn eval_library_function(
        &mut self,
        func: &ql_ast::FunctionDecl,
        receiver: Option<Collection>,
        args: &[Expr],
    ) -> Collection {
        self.push_scope();
        let mut param_iter = func.params.iter();
        if let Some(r) = receiver {
            if let Some(p) = param_iter.next() {
                self.bind(p.name.clone(), r);
            }
        }
        for (param, arg) in param_iter.zip(args) {
            let value = self.eval(arg);
            self.bind(param.name.clone(), value);
        }
        let body = func.body.clone();
        let result = self.eval(&body);
        self.pop_scope();
        result
    }

    fn eval_lambda_form(&mut self, receiver: Option<Collection>, name: &str, args: &[Expr]) -> Collection {
        let (source, rest) = match receiver {
            Some(r) => (r, args),
            None => {
                if args.is_empty() {
                    return Collection::new();
                }
                (self.eval(&args[0]), &args[1..])
            }
        };
        let Some(lambda) = rest.iter().find(|a| matches!(a.kind, ExprKind::Lambda { .. })) else {
            return Collection::new();
        };
        let ExprKind::Lambda { body, .. } = &lambda.kind else {
            unreachable!()
        };

        match name {
            "where" => {
                let mut out = Vec::new();
                self.push_scope();
                for (i, item) in source.iter().enumerate() {
                    self.bind("$this", Collection::single(item.clone()));
                    self.bind("$index", Collection::single(Value::Integer(i as i32)));
                    if self.eval_boolean_context(body) {
                        out.push(item.clone());
                    }
                }
                self.pop_scope();
                Collection::from_vec(out)
            }
            "select" => {
                let mut out = Vec::new();
                self.push_scope();
                for (i, item) in source.iter().enumerate() {
                    self.bind("$this", Collection::single(item.clone()));
                    self.bind("$index", Collection::single(Value::Integer(i as i32)));
                    out.extend(self.eval(body).into_vec());
                }
                self.pop_scope();
                Collection::from_vec(out)
            }
            "all" => {
                self.push_scope();
                let mut result = true;
                for (i, item) in source.iter().enumerate() {
                    self.bind("$this", Collection::single(item.clone()));
                    self.bind("$index", Collection::single(Value::Integer(i as i32)));
                    if !self.eval_boolean_context(body) {
                        result = false;
                        break;
                    }
                }
                self.pop_scope();
                Collection::single(Value::Boolean(result))
            }
            "any" | "exists" => {
                self.push_scope();
                let mut result = false;
                for (i, item) in source.iter().enumerate() {
                    self.bind("$this", Collection::single(item.clone()));
                    self.bind("$index", Collection::single(Value::Integer(i as i32)));
                    if self.eval_boolean_context(body) {
                        result = true;
                        break;
                    }
                }
                self.pop_scope();
                Collection::single(Value::Boolean(result))
            }
            "repeat" => {
                let mut seen: Vec<Value> = source.iter().cloned().collect();
                let mut frontier = source;
                let mut out = Vec::new();
                self.push_scope();
                loop {
                    let mut next = Vec::new();
                    for item in frontier.iter() {
                        self.bind("$this", Collection::single(item.clone()));
                        next.extend(self.eval(body).into_vec());
                    }
                    let fresh: Vec<Value> = next
                        .into_iter()
                        .filter(|v| !seen.iter().any(|s| s.equivalent(v)))
                        .collect();
                    if fresh.is_empty() {
                        break;
                    }
                    seen.extend(fresh.iter().cloned());
                    out.extend(fresh.iter().cloned());
                    frontier = Collection::from_vec(fresh);
                }
                self.pop_scope();
                Collection::from_vec(out)
            }
            "aggregate" => {
                let init = rest
                    .iter()
                    .find(|a| !matches!(a.kind, ExprKind::Lambda { .. }))
                    .map(|e| self.eval(e))
                    .unwrap_or_default();
                self.push_scope();
                let mut total = init;
                for (i, item) in source.iter().enumerate() {
                    self.bind("$this", Collection::single(item.clone()));
                    self.bind("$index", Collection::single(Value::Integer(i as i32)));
                    self.bind("$total", total.clone());
                    total = self.eval(body);
                }
                self.pop_scope();
                total
            }
            _ => Collection::new(),
        }
    }

    fn eval_query(&mut self, query: &QueryExpr) -> Collection {
        self.push_scope();
        let mut rows: Vec<Vec<Value>> = vec![Vec::new()];
        for source in &query.sources {
            let collection = self.eval(&source.expr);
            let mut next_rows = Vec::with_capacity(rows.len() * collection.len().max(1));
            for row in &rows {
                for item in collection.iter() {
                    self.bind(source.alias.clone(), Collection::single(item.clone()));
                    self.bind("$this", Collection::single(item.clone()));
                    let mut extended = row.clone();
                    extended.push(item.clone());
                    next_rows.push(extended);
                }
            }
            rows = next_rows;
        }

        let mut results = Vec::new();
        for row in &rows {
            if let Some((last_alias, last_value)) = query.sources.last().zip(row.last()) {
                self.bind(last_alias.alias.clone(), Collection::single(last_value.clone()));
                self.bind("$this", Collection::single(last_value.clone()));
            }
            for (name, value_expr) in &query.lets {
                let v = self.eval(value_expr);
                self.bind(name.clone(), v);
            }
            if let Some(where_clause) = &query.where_clause {
                if !self.eval_boolean_context(where_clause) {
                    continue;
                }
            }
            let projected = match &query.ret {
                Some(ret) => self.eval_singleton(&ret.expr),
                None => row.last().cloned().unwrap_or(Value::List(Collection::new())),
            };
            results.push(projected);
        }

        if !query.sort.is_empty() {
            results.sort_by(|a, b| {
                for key_spec in &query.sort {
                    let ordering = a.partial_cmp_value(b).unwrap_or(std::cmp::Ordering::Equal);
                    let ordering = if key_spec.descending { ordering.reverse() } else { ordering };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let distinct = query.ret.as_ref().map(|r| r.distinct).unwrap_or(false);
        self.pop_scope();
        let collection = Collection::from_vec(results);
        if distinct {
            collection.distinct()
        } else {
            collection
        }
    }
}

fn kleene_and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn kleene_or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn kleene_xor(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a != b),
        _ => None,
    }
}

fn kleene_implies(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) => Some(true),
        (_, Some(true)) => Some(true),
        (Some(true), Some(false)) => Some(false),
        _ => None,
    }
}

fn bool_collection(result: Option<bool>) -> Collection {
    match result {
        Some(b) => Collection::single(Value::Boolean(b)),
        None => Collection::new(),
    }
}

fn collection_equal(a: &Collection, b: &Collection) -> Option<bool> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a.len() != b.len() {
        return Some(false);
    }
    let mut result = Some(true);
    for (x, y) in a.iter().zip(b.iter()) {
        match x.equals(y) {
            Some(true) => {}
            Some(false) => return Some(false),
            None => result = None,
        }
    }
    result
}

fn value_as_concat_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string_lossy(),
    }
}

fn value_as_calendar_date(value: &Value) -> Option<PrecisionDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(PrecisionDate::new(dt.datetime.date_naive(), TemporalPrecision::Day)),
        _ => None,
    }
}

fn value_matches_type(value: &Value, type_name: &str) -> bool {
    let short = type_name.rsplit('.').next().unwrap_or(type_name);
    match value {
        Value::Resource(node) => node.resource_type() == Some(short),
        other => other.type_name().eq_ignore_ascii_case(short),
    }
}

fn expr_as_type_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Identifier(name) => Some(name.clone()),
        ExprKind::Literal(LiteralValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn sort_collection(collection: Collection) -> Collection {
    let mut values = collection.into_vec();
    values.sort_by(|a, b| a.partial_cmp_value(b).unwrap_or(std::cmp::Ordering::Equal));
    Collection::from_vec(values)
}

fn unwrap_singleton(value: Value) -> Value {
    match value {
        Value::List(c) if c.len() == 1 => c.into_vec().remove(0),
        other => other,
    }
}

/// Per `ql-registry`'s doc comments: collection-algebra functions take
/// their receiver as a whole `Value::List`; everything else gets the
/// receiver scalar-unwrapped when it is a singleton. `contains` is a
/// special case: it overloads string substring search and collection
/// membership on the same name, so its receiver only unwraps down to a
/// scalar when that scalar is a `String`.
fn coerce_call_args(name: &str, values: Vec<Value>) -> Vec<Value> {
    if name == "contains" {
        return values
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                if i == 0 {
                    match v {
                        Value::List(c) if c.len() == 1 && matches!(c.first(), Some(Value::String(_))) => {
                            c.into_vec().remove(0)
                        }
                        other => other,
                    }
                } else {
                    unwrap_singleton(v)
                }
            })
            .collect();
    }
    if LIST_ARG_FUNCTIONS.contains(&name) {
        return values;
    }
    values.into_iter().map(unwrap_singleton).collect()
}

/// Render helper for `&` concatenation and basic diagnostics; not a
/// general-purpose CQL string-representation (see `fhirlogic`'s
/// serializer for that).
trait ConcatString {
    fn to_string_lossy(&self) -> String;
}

impl ConcatString for Value {
    fn to_string_lossy(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_string(),
            Value::DateTime(dt) => dt.to_string(),
            Value::Time(t) => t.to_string(),
            Value::Quantity(q) => q.to_string(),
            Value::Code(c) => c.to_string(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_registry::build_standard_registry;

    fn evaluator<'a>(
        registry: &'a Registry,
        config: &'a EvalConfig,
        env: &'a Env,
        cancellation: &'a CancellationToken,
    ) -> Evaluator<'a> {
        Evaluator::new(registry, None, config, env, cancellation, Collection::new())
    }

    fn parse(source: &str) -> Expr {
        ql_parser::parse_fhirpath(source).expect("expression parses")
    }

    #[test]
    fn integer_addition() {
        let registry = build_standard_registry();
        let config = EvalConfig::new(
            PrecisionDateTime::new(
                chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
                TemporalPrecision::Second,
                false,
            ),
            "UTC",
        );
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let mut ev = evaluator(&registry, &config, &env, &cancellation);
        let expr = parse("1 + 2");
        let result = ev.eval(&expr);
        assert_eq!(result.into_vec(), vec![Value::Integer(3)]);
    }

    #[test]
    fn three_valued_and_with_empty_is_unknown() {
        let registry = build_standard_registry();
        let config = EvalConfig::new(
            PrecisionDateTime::new(
                chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
                TemporalPrecision::Second,
                false,
            ),
            "UTC",
        );
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let mut ev = evaluator(&registry, &config, &env, &cancellation);
        let expr = parse("false and {}");
        let result = ev.eval(&expr);
        assert_eq!(result.into_vec(), vec![Value::Boolean(false)]);
    }

    #[test]
    fn where_over_non_boolean_is_type_error_not_silent_empty() {
        let registry = build_standard_registry();
        let config = EvalConfig::new(
            PrecisionDateTime::new(
                chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
                TemporalPrecision::Second,
                false,
            ),
            "UTC",
        );
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let mut ev = evaluator(&registry, &config, &env, &cancellation);
        let expr = parse("(1 | 2 | 3).where($this)");
        let result = ev.eval(&expr);
        assert!(result.is_empty());
        assert!(ev
            .diagnostics
            .iter()
            .any(|d| matches!(d.code, DiagnosticCode::TypeMismatch { .. })));
    }

    #[test]
    fn where_over_empty_condition_filters_without_diagnostic() {
        let registry = build_standard_registry();
        let config = EvalConfig::new(
            PrecisionDateTime::new(
                chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
                TemporalPrecision::Second,
                false,
            ),
            "UTC",
        );
        let env = Env::new();
        let cancellation = CancellationToken::new();
        let mut ev = evaluator(&registry, &config, &env, &cancellation);
        let expr = parse("(1 | 2).where({})");
        let result = ev.eval(&expr);
        assert!(result.is_empty());
        assert!(ev.diagnostics.is_empty());
    }
}
