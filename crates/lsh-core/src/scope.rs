//! Nested variable and function scopes.
//!
//! The [`ContextStack`] keeps the global scope at the bottom. Lookups walk
//! from the innermost scope outwards. Assigning to a name that already exists
//! updates the scope that owns it; assigning to a new name creates it in the
//! global scope, so undeclared variables behave as script globals.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Parameter, Statement};
use crate::value::Value;

/// A script-defined function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: Rc<Vec<Statement>>,
}

impl Function {
    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.is_optional()).count()
    }
}

/// One level of bindings.
#[derive(Debug, Default)]
pub struct RunContext {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Rc<Function>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct ContextStack {
    contexts: Vec<RunContext>,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStack {
    /// A stack holding only the global scope.
    pub fn new() -> Self {
        Self {
            contexts: vec![RunContext::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    pub fn push(&mut self) {
        self.contexts.push(RunContext::new());
    }

    /// Pops the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) {
        if self.contexts.len() > 1 {
            self.contexts.pop();
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.contexts
            .iter()
            .rev()
            .find_map(|context| context.variables.get(name))
    }

    /// Updates the owning scope, or creates the variable globally.
    pub fn assign(&mut self, name: &str, value: Value) {
        if let Some(context) = self
            .contexts
            .iter_mut()
            .rev()
            .find(|context| context.variables.contains_key(name))
        {
            context.variables.insert(name.to_string(), value);
            return;
        }
        self.contexts[0].variables.insert(name.to_string(), value);
    }

    /// Binds a variable in the innermost scope, shadowing outer ones.
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(context) = self.contexts.last_mut() {
            context.variables.insert(name.to_string(), value);
        }
    }

    pub fn define_function(&mut self, function: Function) {
        if let Some(context) = self.contexts.last_mut() {
            context
                .functions
                .insert(function.name.clone(), Rc::new(function));
        }
    }

    pub fn function(&self, name: &str) -> Option<Rc<Function>> {
        self.contexts
            .iter()
            .rev()
            .find_map(|context| context.functions.get(name))
            .cloned()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.contexts[0].variables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_prefers_innermost() {
        let mut stack = ContextStack::new();
        stack.assign("x", Value::Number(1.0));
        stack.push();
        stack.define("x", Value::Number(2.0));
        assert_eq!(stack.get("x"), Some(&Value::Number(2.0)));
        stack.pop();
        assert_eq!(stack.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_assign_mutates_owning_scope() {
        let mut stack = ContextStack::new();
        stack.assign("x", Value::Number(1.0));
        stack.push();
        stack.push();
        stack.assign("x", Value::Number(5.0));
        stack.pop();
        stack.pop();
        assert_eq!(stack.get("x"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn test_assign_to_shadowed_name_updates_inner_binding() {
        let mut stack = ContextStack::new();
        stack.assign("x", Value::Number(1.0));
        stack.push();
        stack.define("x", Value::Number(2.0));
        stack.assign("x", Value::Number(3.0));
        stack.pop();
        assert_eq!(stack.get("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_new_names_are_created_globally() {
        let mut stack = ContextStack::new();
        stack.push();
        stack.assign("fresh", Value::Boolean(true));
        stack.pop();
        assert_eq!(stack.global("fresh"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_global_scope_is_never_popped() {
        let mut stack = ContextStack::new();
        stack.pop();
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_functions_follow_scopes() {
        let mut stack = ContextStack::new();
        stack.push();
        stack.define_function(Function {
            name: "f".to_string(),
            parameters: vec![],
            body: Rc::new(vec![]),
        });
        assert!(stack.function("f").is_some());
        stack.pop();
        assert!(stack.function("f").is_none());
    }
}
