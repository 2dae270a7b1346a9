use std::collections::HashMap;
use std::sync::Arc;

use nabu_script::ast::{Span, Stmt};

use crate::value::Value;

/// A function registered by `def`.
///
/// `captured` is a snapshot of the variables visible where the function was
/// defined. Other functions are looked up by name at call time, so a function
/// may call one defined after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub captured: HashMap<String, Value>,
    pub span: Span,
}

/// Name → function table. Built by one evaluation pass and replaced
/// wholesale on reload; read-only while events are dispatched.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    functions: HashMap<String, Arc<Closure>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `closure`, replacing any earlier definition with the same name.
    pub fn define(&mut self, closure: Closure) {
        if let Some(prev) = self.functions.get(&closure.name) {
            log::warn!(
                "`def {}` at {} replaces the definition at {}",
                closure.name,
                closure.span,
                prev.span
            );
        }
        self.functions.insert(closure.name.clone(), Arc::new(closure));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Closure>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closure(name: &str, params: &[&str], line: usize) -> Closure {
        Closure {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Vec::new(),
            captured: HashMap::new(),
            span: Span::new(line, 1),
        }
    }

    #[test]
    fn later_definition_wins() {
        let mut table = HandlerTable::new();
        table.define(closure("save", &[], 1));
        table.define(closure("save", &["params"], 5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("save").unwrap().params, ["params"]);
        assert_eq!(table.get("save").unwrap().span.line, 5);
    }

    #[test]
    fn names_are_sorted() {
        let mut table = HandlerTable::new();
        table.define(closure("b", &[], 1));
        table.define(closure("a", &[], 2));
        assert_eq!(table.names(), ["a", "b"]);
        assert!(table.contains("a"));
        assert!(table.get("c").is_none());
    }
}
