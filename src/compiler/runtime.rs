//! Runtime extension host and value coercion
//!
//! Filters lower options into runtime calls; the functions behind those calls
//! live here. Values are loosely typed JSON values and every extension coerces
//! its arguments through the [`ObjectModel`] of the render context.

use crate::error::{CompilerError, Result};
use serde_json::Value;
use std::collections::HashMap;

/// A runtime function, bound to the render context it was provided for.
pub type RuntimeFunction<'a> = Box<dyn Fn(&[Value]) -> Result<Value> + 'a>;

/// Loose type adaptation shared by all runtime extensions.
pub trait ObjectModel: Send + Sync {
    fn coerce_to_collection(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            Value::Object(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
            other => vec![other.clone()],
        }
    }

    fn coerce_to_string(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
                _ => n.to_string(),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.coerce_to_string(item))
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => value.to_string(),
        }
    }

    fn coerce_to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectModel;

impl ObjectModel for DefaultObjectModel {}

/// What a runtime extension can see of the template being rendered.
pub trait RenderContext: Send + Sync {
    fn object_model(&self) -> &dyn ObjectModel;
}

#[derive(Debug, Default)]
pub struct DefaultRenderContext {
    object_model: DefaultObjectModel,
}

impl RenderContext for DefaultRenderContext {
    fn object_model(&self) -> &dyn ObjectModel {
        &self.object_model
    }
}

pub trait RuntimeExtension: Send + Sync {
    /// Function name the extension installs.
    fn name(&self) -> &'static str;

    fn provide<'a>(&self, context: &'a dyn RenderContext) -> RuntimeFunction<'a>;
}

/// Fails with a runtime error unless exactly `expected` arguments were passed.
pub fn check_arity(function: &str, arguments: &[Value], expected: usize) -> Result<()> {
    if arguments.len() != expected {
        return Err(CompilerError::runtime(
            function,
            format!(
                "expected {} argument{}, got {}",
                expected,
                if expected == 1 { "" } else { "s" },
                arguments.len()
            ),
        ));
    }
    Ok(())
}

/// Registry of runtime extensions, keyed by function name.
#[derive(Default)]
pub struct ExtensionHost {
    extensions: HashMap<&'static str, Box<dyn RuntimeExtension>>,
}

impl ExtensionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with the `format` and `join` extensions installed.
    pub fn with_defaults() -> Self {
        let mut host = Self::new();
        host.register(Box::new(crate::compiler::middle_end::filter::FormatFilter));
        host.register(Box::new(crate::compiler::middle_end::filter::JoinFilter));
        host
    }

    pub fn register(&mut self, extension: Box<dyn RuntimeExtension>) {
        let name = extension.name();
        if self.extensions.insert(name, extension).is_some() {
            log::warn!("Runtime extension '{}' replaced an earlier registration", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    pub fn call(&self, context: &dyn RenderContext, name: &str, arguments: &[Value]) -> Result<Value> {
        let extension = self
            .extensions
            .get(name)
            .ok_or_else(|| CompilerError::runtime(name, "no such runtime extension"))?;
        let function = extension.provide(context);
        function(arguments)
    }
}
