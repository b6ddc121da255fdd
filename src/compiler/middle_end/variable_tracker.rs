//! Scoped variable visibility tracking
//!
//! Names are case-insensitive. Every declaration is recorded twice: on the
//! per-name stack, so lookups find the innermost binding, and on one global
//! declaration stack, so `pop_variable` always undoes the most recent
//! declaration no matter which name it used.

use crate::error::{CompilerError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct VariableTracker<T> {
    by_name: HashMap<String, Vec<T>>,
    declaration_order: Vec<String>,
}

impl<T> Default for VariableTracker<T> {
    fn default() -> Self {
        Self {
            by_name: HashMap::new(),
            declaration_order: Vec::new(),
        }
    }
}

impl<T> VariableTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_variable(&mut self, name: &str, data: T) {
        let key = name.to_lowercase();
        self.by_name.entry(key.clone()).or_default().push(data);
        self.declaration_order.push(key);
    }

    /// Remove the most recent declaration and return its lower-cased name.
    pub fn pop_variable(&mut self) -> Result<String> {
        let name = self
            .declaration_order
            .pop()
            .ok_or(CompilerError::ScopeUnderflow)?;
        if let Some(stack) = self.by_name.get_mut(&name) {
            stack.pop();
            if stack.is_empty() {
                self.by_name.remove(&name);
            }
        }
        Ok(name)
    }

    /// Data of the innermost visible binding of `name`.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.by_name.get(&name.to_lowercase()).and_then(|stack| stack.last())
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    pub fn is_in_scope(&self, name: &str) -> bool {
        self.is_declared(name)
    }

    /// All visible bindings of `name`, outermost first.
    pub fn get_all(&self, name: &str) -> &[T] {
        self.by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_occurrence_count(&self, name: &str) -> usize {
        self.get_all(name).len()
    }

    /// The most recent declaration.
    pub fn peek(&self) -> Result<(&str, &T)> {
        let name = self
            .declaration_order
            .last()
            .ok_or(CompilerError::ScopeUnderflow)?;
        let data = self
            .by_name
            .get(name)
            .and_then(|stack| stack.last())
            .ok_or(CompilerError::ScopeUnderflow)?;
        Ok((name.as_str(), data))
    }

    pub fn len(&self) -> usize {
        self.declaration_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declaration_order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_returns_most_recent_declaration() {
        let mut tracker = VariableTracker::new();
        tracker.push_variable("a", 1);
        tracker.push_variable("b", 2);
        tracker.push_variable("A", 3);

        assert_eq!(tracker.pop_variable().unwrap(), "a");
        assert_eq!(tracker.get("a"), Some(&1));
        assert_eq!(tracker.pop_variable().unwrap(), "b");
        assert_eq!(tracker.get("b"), None);
        assert_eq!(tracker.pop_variable().unwrap(), "a");
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_case_insensitive_names() {
        let mut tracker = VariableTracker::new();
        tracker.push_variable("Foo", "outer");
        assert!(tracker.is_declared("foo"));
        assert!(tracker.is_in_scope("FOO"));
        assert_eq!(tracker.get("fOo"), Some(&"outer"));
    }

    #[test]
    fn test_get_all_is_outermost_first() {
        let mut tracker = VariableTracker::new();
        tracker.push_variable("item", 1);
        tracker.push_variable("other", 9);
        tracker.push_variable("ITEM", 2);
        assert_eq!(tracker.get_all("item"), &[1, 2]);
        assert_eq!(tracker.get_occurrence_count("item"), 2);
        assert_eq!(tracker.get_occurrence_count("missing"), 0);
        assert!(tracker.get_all("missing").is_empty());
    }

    #[test]
    fn test_peek() {
        let mut tracker = VariableTracker::new();
        assert!(tracker.peek().is_err());
        tracker.push_variable("X", 'x');
        tracker.push_variable("y", 'y');
        assert_eq!(tracker.peek().unwrap(), ("y", &'y'));
        tracker.pop_variable().unwrap();
        assert_eq!(tracker.peek().unwrap(), ("x", &'x'));
    }

    #[test]
    fn test_underflow() {
        let mut tracker: VariableTracker<()> = VariableTracker::new();
        assert!(matches!(tracker.pop_variable(), Err(CompilerError::ScopeUnderflow)));
    }

    #[test]
    fn test_lifo_over_balanced_nesting() {
        let names = ["a", "b", "a", "c", "b"];
        let mut tracker = VariableTracker::new();
        for (depth, name) in names.iter().enumerate() {
            tracker.push_variable(name, depth);
        }
        for (depth, name) in names.iter().enumerate().rev() {
            assert_eq!(tracker.get(name), Some(&depth));
            assert_eq!(tracker.pop_variable().unwrap(), *name);
        }
        assert!(tracker.is_empty());
    }
}
