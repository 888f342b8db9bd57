//! Name-keyed table of [`Operation`]s.

use crate::operation::{Operation, OperationError, OperationResult};
use ql_model::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    operations: FxHashMap<String, Arc<dyn Operation>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            operations: FxHashMap::default(),
        }
    }

    pub fn register<T>(&mut self, operation: T) -> &mut Self
    where
        T: Operation + 'static,
    {
        self.operations
            .insert(operation.name().to_string(), Arc::new(operation));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> OperationResult {
        let op = self
            .operations
            .get(name)
            .ok_or_else(|| OperationError::UnknownFunction(name.to_string()))?;
        op.check_arity(args)?;
        op.invoke(args)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}
