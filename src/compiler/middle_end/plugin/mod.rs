//! Directive plugins
//!
//! Every `data-sly-<name>` attribute is handed to the plugin registered under
//! `<name>`. The plugin returns a [`PluginInvoke`] whose hooks the tree walk
//! calls at fixed points while it emits the element.

mod binding;
mod control;
mod include;
mod markup;
mod procedure;

pub use binding::{SetPlugin, UsePlugin};
pub use control::{ListPlugin, RepeatPlugin, TestPlugin};
pub use include::{IncludePlugin, ResourcePlugin};
pub use markup::{AttributePlugin, ElementPlugin, TextPlugin, UnwrapPlugin};
pub use procedure::{CallPlugin, TemplatePlugin};

use crate::compiler::frontend::ast::PluginCallInfo;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::middle_end::context::CompilerContext;
use crate::error::{Location, Result};
use std::collections::HashMap;
use std::rc::Rc;

/// Whether the element's own start and end tags are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagSkip {
    #[default]
    Never,
    Always,
    /// Skip when the named variable is truthy.
    When(String),
}

/// Hooks around the emission of one element. All default to no-ops.
pub trait PluginInvoke {
    fn before_element(&self, _ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        Ok(())
    }

    fn before_tag_open(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn before_attributes(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn before_attribute(&self, _ctx: &mut CompilerContext<'_>, _name: &str) -> Result<()> {
        Ok(())
    }

    fn after_attribute(&self, _ctx: &mut CompilerContext<'_>, _name: &str) -> Result<()> {
        Ok(())
    }

    fn after_attributes(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_tag_open(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn before_children(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_children(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn before_tag_close(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_tag_close(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_element(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn skip_tag(&self) -> TagSkip {
        TagSkip::Never
    }

    /// Variable holding a replacement tag name.
    fn tag_name_variable(&self) -> Option<&str> {
        None
    }

    /// True when the plugin writes attribute `name` itself.
    fn overrides_attribute(&self, _name: &str) -> bool {
        false
    }

    /// True when the plugin writes the element content itself.
    fn replaces_children(&self) -> bool {
        false
    }
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    /// Create the invocation for one directive attribute. Variable names the
    /// hooks need are generated here.
    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>>;
}

/// Plugins by directive name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<&'static str, Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: Vec<Box<dyn Plugin>> = vec![
            Box::new(UsePlugin),
            Box::new(SetPlugin),
            Box::new(TemplatePlugin),
            Box::new(TestPlugin),
            Box::new(ListPlugin),
            Box::new(RepeatPlugin),
            Box::new(CallPlugin),
            Box::new(IncludePlugin),
            Box::new(ResourcePlugin),
            Box::new(ElementPlugin),
            Box::new(AttributePlugin),
            Box::new(TextPlugin),
            Box::new(UnwrapPlugin),
        ];
        for plugin in defaults {
            registry.register(plugin);
        }
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        let name = plugin.name();
        if self.plugins.insert(name, plugin).is_some() {
            log::warn!("Plugin '{}' replaced an earlier registration", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.plugins.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Invocation of a directive that was rejected with a diagnostic.
pub(crate) struct NoOpInvoke;

impl PluginInvoke for NoOpInvoke {}

/// Expression options as a map literal, for runtime calls that take them.
pub(crate) fn options_map(options: HashMap<String, ExpressionNode>) -> ExpressionNode {
    ExpressionNode::MapLiteral(options.into_iter().collect())
}

/// The directive's identifier, or a diagnostic when the plugin requires one.
pub(crate) fn required_identifier<'c>(
    call: &'c PluginCallInfo,
    location: Location,
    ctx: &mut CompilerContext<'_>,
) -> Option<&'c str> {
    let identifier = call.identifier();
    if identifier.is_none() {
        ctx.diagnostics()
            .error(location, format!("{} requires an identifier, as in {}.name", call, call));
    }
    identifier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = PluginRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec![
                "attribute", "call", "element", "include", "list", "repeat", "resource", "set",
                "template", "test", "text", "unwrap", "use"
            ]
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_default_priorities() {
        let registry = PluginRegistry::with_defaults();
        let priority = |name: &str| registry.get(name).map(|p| p.priority());
        assert_eq!(priority("use"), Some(1));
        assert_eq!(priority("set"), Some(1));
        assert_eq!(priority("template"), Some(2));
        assert_eq!(priority("test"), Some(10));
        assert_eq!(priority("list"), Some(30));
        assert_eq!(priority("call"), Some(60));
        assert_eq!(priority("include"), Some(70));
        assert_eq!(priority("element"), Some(80));
        assert_eq!(priority("attribute"), Some(90));
        assert_eq!(priority("text"), Some(100));
        assert_eq!(priority("unwrap"), Some(110));
    }
}
