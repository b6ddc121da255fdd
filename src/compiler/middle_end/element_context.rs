//! Per-element collection of attributes and plugin invocations

use crate::compiler::frontend::ast::{Attribute, AttributeValue, PluginCallInfo};
use crate::compiler::frontend::expression::Expression;
use crate::compiler::middle_end::context::CompilerContext;
use crate::compiler::middle_end::plugin::{PluginInvoke, TagSkip};
use crate::error::{Location, Result};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// Attributes of one element in document order, plus the plugin invocations
/// its directives produced.
///
/// [`plugin_invoke`](Self::plugin_invoke) sorts the invocations by priority
/// and composes them once; later calls return the same aggregate.
pub struct ElementContext {
    tag_name: String,
    attributes: Vec<Attribute>,
    invocations: Vec<(Rc<dyn PluginInvoke>, i32)>,
    composed: OnceCell<AggregatePluginInvoke>,
}

impl ElementContext {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: Vec::new(),
            invocations: Vec::new(),
            composed: OnceCell::new(),
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn push_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.push_attribute(Attribute::literal(name, value));
    }

    pub fn add_plugin_call(&mut self, name: impl Into<String>, descriptor: PluginCallInfo, expression: Expression) {
        self.push_attribute(Attribute {
            name: name.into(),
            value: AttributeValue::PluginCall { descriptor, expression },
            quote: Some('"'),
            location: Location::default(),
        });
    }

    pub fn add_plugin(&mut self, invocation: Rc<dyn PluginInvoke>, priority: i32) {
        if self.composed.get().is_some() {
            log::warn!(
                "Plugin added to <{}> after its invocations were composed, ignoring it",
                self.tag_name
            );
            return;
        }
        self.invocations.push((invocation, priority));
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.len()
    }

    pub fn plugin_invoke(&self) -> &AggregatePluginInvoke {
        self.composed.get_or_init(|| {
            let mut sorted: Vec<&(Rc<dyn PluginInvoke>, i32)> = self.invocations.iter().collect();
            sorted.sort_by_key(|(_, priority)| *priority);
            log::trace!(
                "Composed {} plugin invocations for <{}>",
                sorted.len(),
                self.tag_name
            );
            AggregatePluginInvoke {
                invocations: sorted.into_iter().map(|(invoke, _)| Rc::clone(invoke)).collect(),
            }
        })
    }
}

impl fmt::Debug for ElementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementContext")
            .field("tag_name", &self.tag_name)
            .field("attributes", &self.attributes)
            .field("invocations", &self.invocations.len())
            .finish()
    }
}

/// Structural equality: invocations exist only during compilation.
impl PartialEq for ElementContext {
    fn eq(&self, other: &Self) -> bool {
        self.tag_name == other.tag_name && self.attributes == other.attributes
    }
}

impl Serialize for ElementContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ElementContext", 2)?;
        state.serialize_field("tagName", &self.tag_name)?;
        state.serialize_field("attributes", &self.attributes)?;
        state.end()
    }
}

/// Several invocations acting as one. Hooks that write the start tag run in
/// priority order; `after_children`, `after_tag_close` and `after_element`
/// run in reverse so the scopes opened around the element nest.
#[derive(Default)]
pub struct AggregatePluginInvoke {
    invocations: Vec<Rc<dyn PluginInvoke>>,
}

impl AggregatePluginInvoke {
    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    fn forward(&self, mut hook: impl FnMut(&dyn PluginInvoke) -> Result<()>) -> Result<()> {
        self.invocations.iter().try_for_each(|invoke| hook(invoke.as_ref()))
    }

    fn backward(&self, mut hook: impl FnMut(&dyn PluginInvoke) -> Result<()>) -> Result<()> {
        self.invocations
            .iter()
            .rev()
            .try_for_each(|invoke| hook(invoke.as_ref()))
    }
}

impl PluginInvoke for AggregatePluginInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, tag_name: &str) -> Result<()> {
        self.forward(|invoke| invoke.before_element(ctx, tag_name))
    }

    fn before_tag_open(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.forward(|invoke| invoke.before_tag_open(ctx))
    }

    fn before_attributes(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.forward(|invoke| invoke.before_attributes(ctx))
    }

    fn before_attribute(&self, ctx: &mut CompilerContext<'_>, name: &str) -> Result<()> {
        self.forward(|invoke| invoke.before_attribute(ctx, name))
    }

    fn after_attribute(&self, ctx: &mut CompilerContext<'_>, name: &str) -> Result<()> {
        self.forward(|invoke| invoke.after_attribute(ctx, name))
    }

    fn after_attributes(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.forward(|invoke| invoke.after_attributes(ctx))
    }

    fn after_tag_open(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.forward(|invoke| invoke.after_tag_open(ctx))
    }

    fn before_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.forward(|invoke| invoke.before_children(ctx))
    }

    fn after_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.backward(|invoke| invoke.after_children(ctx))
    }

    fn before_tag_close(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.forward(|invoke| invoke.before_tag_close(ctx))
    }

    fn after_tag_close(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.backward(|invoke| invoke.after_tag_close(ctx))
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.backward(|invoke| invoke.after_element(ctx))
    }

    fn skip_tag(&self) -> TagSkip {
        let mut result = TagSkip::Never;
        for invoke in &self.invocations {
            match invoke.skip_tag() {
                TagSkip::Always => return TagSkip::Always,
                TagSkip::When(variable) if result == TagSkip::Never => result = TagSkip::When(variable),
                _ => {}
            }
        }
        result
    }

    fn tag_name_variable(&self) -> Option<&str> {
        self.invocations.iter().find_map(|invoke| invoke.tag_name_variable())
    }

    fn overrides_attribute(&self, name: &str) -> bool {
        self.invocations.iter().any(|invoke| invoke.overrides_attribute(name))
    }

    fn replaces_children(&self) -> bool {
        self.invocations.iter().any(|invoke| invoke.replaces_children())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontend::expression::ExpressionNode;
    use crate::compiler::middle_end::filter::FilterPipeline;
    use std::cell::RefCell;
    use std::collections::HashSet;

    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl PluginInvoke for Recorder {
        fn before_element(&self, _ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("open {}", self.label));
            Ok(())
        }

        fn after_element(&self, _ctx: &mut CompilerContext<'_>) -> Result<()> {
            self.log.borrow_mut().push(format!("close {}", self.label));
            Ok(())
        }
    }

    fn recorder(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Rc<dyn PluginInvoke> {
        Rc::new(Recorder {
            label,
            log: Rc::clone(log),
        })
    }

    #[test]
    fn test_invocations_run_in_stable_priority_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut context = ElementContext::new("div");
        context.add_plugin(recorder("50", &log), 50);
        context.add_plugin(recorder("10a", &log), 10);
        context.add_plugin(recorder("10b", &log), 10);
        context.add_plugin(recorder("30", &log), 30);

        let filters = FilterPipeline::new();
        let globals = HashSet::new();
        let mut ctx = CompilerContext::new(&filters, &globals, false);
        let invoke = context.plugin_invoke();
        invoke.before_element(&mut ctx, "div").unwrap();
        invoke.after_element(&mut ctx).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "open 10a", "open 10b", "open 30", "open 50", "close 50", "close 30", "close 10b",
                "close 10a"
            ]
        );
    }

    #[test]
    fn test_composition_happens_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut context = ElementContext::new("div");
        context.add_plugin(recorder("a", &log), 1);
        let first = context.plugin_invoke() as *const AggregatePluginInvoke;
        let second = context.plugin_invoke() as *const AggregatePluginInvoke;
        assert_eq!(first, second);
        assert_eq!(context.plugin_invoke().len(), 1);

        context.add_plugin(recorder("late", &log), 0);
        assert_eq!(context.plugin_invoke().len(), 1);
        assert_eq!(context.invocation_count(), 1);
    }

    #[test]
    fn test_attributes_round_trip_in_order() {
        let mut context = ElementContext::new("p");
        context.add_attribute("a", "1");
        context.add_attribute("b", "2");
        assert!(context.plugin_invoke().is_empty());

        let pairs: Vec<(&str, &AttributeValue)> = context
            .attributes()
            .iter()
            .map(|attr| (attr.name.as_str(), &attr.value))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a", &AttributeValue::Literal { text: "1".into() }),
                ("b", &AttributeValue::Literal { text: "2".into() }),
            ]
        );
    }

    #[test]
    fn test_plugin_calls_keep_their_position() {
        let mut context = ElementContext::new("ul");
        context.add_attribute("class", "list");
        context.add_plugin_call(
            "data-sly-list",
            PluginCallInfo::parse("list"),
            Expression::from_root(ExpressionNode::identifier("items")),
        );
        context.add_attribute("id", "main");
        let names: Vec<&str> = context.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["class", "data-sly-list", "id"]);
        assert!(context.attributes()[1].is_plugin_call());
    }

    #[test]
    fn test_aggregate_tag_skip() {
        struct Skip(TagSkip);
        impl PluginInvoke for Skip {
            fn skip_tag(&self) -> TagSkip {
                self.0.clone()
            }
        }

        let mut context = ElementContext::new("div");
        context.add_plugin(Rc::new(Skip(TagSkip::When("var_0".into()))), 110);
        context.add_plugin(Rc::new(Skip(TagSkip::Never)), 10);
        assert_eq!(context.plugin_invoke().skip_tag(), TagSkip::When("var_0".into()));

        let mut always = ElementContext::new("div");
        always.add_plugin(Rc::new(Skip(TagSkip::When("var_0".into()))), 1);
        always.add_plugin(Rc::new(Skip(TagSkip::Always)), 2);
        assert_eq!(always.plugin_invoke().skip_tag(), TagSkip::Always);
    }
}
