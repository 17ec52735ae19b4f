//! The mutable binding environment for one notebook's executed code.

use std::collections::BTreeMap;

use datapad_core::Value;
use serde::{Deserialize, Serialize};

/// A notebook's namespace: name → value bindings.
///
/// One namespace exists per notebook and is never shared across notebooks.
/// Iteration order is name order, which keeps namespace diffing and implicit
/// capture deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Namespace {
    bindings: BTreeMap<String, Value>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Bind or rebind a name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Remove a binding.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Whether a name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Iterate bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    /// Mutably iterate bindings in name order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.bindings.iter_mut()
    }

    /// Bound names in name order.
    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(|k| k.as_str()).collect()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop all bindings.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_rebind() {
        let mut ns = Namespace::new();
        ns.set("x", Value::Int(1));
        ns.set("x", Value::Int(2));
        assert_eq!(ns.get("x"), Some(&Value::Int(2)));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_iteration_is_name_ordered() {
        let mut ns = Namespace::new();
        ns.set("zeta", Value::Int(1));
        ns.set("alpha", Value::Int(2));
        ns.set("mid", Value::Int(3));
        assert_eq!(ns.names(), vec!["alpha", "mid", "zeta"]);
    }
}
