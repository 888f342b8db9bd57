//! Innermost-first scope stack for lambda parameters, `let` bindings,
//! and CQL query aliases (spec.md §4.2 rule order 1-2: local bindings
//! shadow everything outside them).

use ql_model::TypeInfo;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// `(x) => ...` lambda parameter, or a `where`/`select`/`exists`
    /// implicit-`$this` frame.
    Lambda,
    /// CQL `let name: expr` or FHIRPath `Let` node.
    Let,
    /// A query's source alias (and its `$this`/`$index`/`$total`).
    Query,
}

#[derive(Debug, Default)]
struct Scope {
    #[allow(dead_code)]
    kind_marker: Option<ScopeKind>,
    bindings: FxHashMap<String, TypeInfo>,
}

/// A stack of nested scopes. `lookup` walks innermost-to-outermost, so a
/// closer binding always shadows one further out.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind_marker: Some(kind),
            bindings: FxHashMap::default(),
        });
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: TypeInfo) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.into(), ty);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeInfo> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// True while inside at least one lambda-like frame, i.e. whether
    /// `$this`/`$index`/`$total` are meaningful here.
    pub fn in_lambda(&self) -> bool {
        self.scopes
            .iter()
            .any(|s| matches!(s.kind_marker, Some(ScopeKind::Lambda) | Some(ScopeKind::Query)))
    }

    /// Enters a scope, runs `f`, and guarantees the scope is popped even
    /// if `f` wants early returns further up the call stack.
    pub fn with_scope<T>(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push(kind);
        let result = f(self);
        self.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_shadows_outer() {
        let mut stack = ScopeStack::new();
        stack.push(ScopeKind::Query);
        stack.bind("x", TypeInfo::system("Integer"));
        stack.push(ScopeKind::Lambda);
        stack.bind("x", TypeInfo::system("String"));
        assert_eq!(stack.lookup("x").unwrap().name, "String");
        stack.pop();
        assert_eq!(stack.lookup("x").unwrap().name, "Integer");
    }

    #[test]
    fn in_lambda_tracks_frame_kind() {
        let mut stack = ScopeStack::new();
        assert!(!stack.in_lambda());
        stack.push(ScopeKind::Let);
        assert!(!stack.in_lambda());
        stack.push(ScopeKind::Lambda);
        assert!(stack.in_lambda());
    }
}
