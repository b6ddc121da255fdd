// FILE: src/compiler/middle_end/plugin/markup.rs

use super::{Plugin, PluginInvoke, TagSkip};
use crate::compiler::frontend::ast::PluginCallInfo;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::middle_end::context::{CompilerContext, MarkupContext};
use crate::core::util::is_uri_attribute;
use crate::core::RUNTIME_ATTRIBUTE_MAP;
use crate::error::{Location, Result};
use std::rc::Rc;

/// `data-sly-text`: replace the element content with the expression value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPlugin;

struct TextInvoke {
    expression: Expression,
    location: Location,
    variable: String,
}

impl Plugin for TextPlugin {
    fn name(&self) -> &'static str {
        "text"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn invoke(
        &self,
        _call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(TextInvoke {
            expression: expression.clone(),
            location,
            variable: ctx.generate_variable(),
        }))
    }
}

impl PluginInvoke for TextInvoke {
    fn before_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        let (root, _) = ctx.transform_text(&self.expression, self.location).into_parts();
        ctx.bind(&self.variable, root, self.location);
        ctx.out_variable(&self.variable);
        ctx.unbind()
    }

    fn replaces_children(&self) -> bool {
        true
    }
}

/// `data-sly-attribute.name` sets one attribute; `data-sly-attribute`
/// without a name writes a whole map of attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributePlugin;

struct AttributeInvoke {
    expression: Expression,
    location: Location,
    name: Option<String>,
    variable: String,
}

impl Plugin for AttributePlugin {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(AttributeInvoke {
            expression: expression.clone(),
            location,
            name: call.identifier().map(str::to_string),
            variable: ctx.generate_variable(),
        }))
    }
}

impl PluginInvoke for AttributeInvoke {
    fn after_attributes(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        match &self.name {
            Some(name) => {
                let markup = if is_uri_attribute(name) {
                    MarkupContext::Uri
                } else {
                    MarkupContext::Attribute
                };
                let (root, _) = ctx
                    .transform(&self.expression, Some(markup), self.location)
                    .into_parts();
                ctx.bind(&self.variable, root, self.location);
                // A falsy value removes the attribute
                ctx.start_conditional(&self.variable, true);
                ctx.out_text(&format!(" {}=\"", name));
                ctx.out_variable(&self.variable);
                ctx.out_text("\"");
                ctx.end_conditional();
            }
            None => {
                let (root, _) = ctx.transform(&self.expression, None, self.location).into_parts();
                let map = ExpressionNode::runtime_call(RUNTIME_ATTRIBUTE_MAP, vec![root]);
                ctx.bind(&self.variable, map, self.location);
                ctx.out_variable(&self.variable);
            }
        }
        ctx.unbind()
    }

    fn overrides_attribute(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .map(|own| own.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    }
}

/// `data-sly-element`: replace the tag name, keeping the original when the
/// expression is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementPlugin;

struct ElementInvoke {
    expression: Expression,
    location: Location,
    variable: String,
}

impl Plugin for ElementPlugin {
    fn name(&self) -> &'static str {
        "element"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn invoke(
        &self,
        _call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(ElementInvoke {
            expression: expression.clone(),
            location,
            variable: ctx.generate_variable(),
        }))
    }
}

impl PluginInvoke for ElementInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, tag_name: &str) -> Result<()> {
        let (root, _) = ctx
            .transform(&self.expression, Some(MarkupContext::ElementName), self.location)
            .into_parts();
        let name = ExpressionNode::TernaryOperation {
            condition: Box::new(root.clone()),
            then_branch: Box::new(root),
            else_branch: Box::new(ExpressionNode::string(tag_name)),
        };
        ctx.bind(&self.variable, name, self.location);
        Ok(())
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        ctx.unbind()
    }

    fn tag_name_variable(&self) -> Option<&str> {
        Some(&self.variable)
    }
}

/// `data-sly-unwrap[=condition]`: drop the element's own tags, keeping its
/// content.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapPlugin;

struct UnwrapInvoke {
    condition: Option<(Expression, String)>,
    location: Location,
}

impl Plugin for UnwrapPlugin {
    fn name(&self) -> &'static str {
        "unwrap"
    }

    fn priority(&self) -> i32 {
        110
    }

    fn invoke(
        &self,
        _call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        let condition = if expression.root().is_null() {
            None
        } else {
            Some((expression.clone(), ctx.generate_variable()))
        };
        Ok(Rc::new(UnwrapInvoke { condition, location }))
    }
}

impl PluginInvoke for UnwrapInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        if let Some((expression, variable)) = &self.condition {
            let (root, _) = ctx.transform(expression, None, self.location).into_parts();
            ctx.bind(variable, root, self.location);
        }
        Ok(())
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        if self.condition.is_some() {
            ctx.unbind()?;
        }
        Ok(())
    }

    fn skip_tag(&self) -> TagSkip {
        match &self.condition {
            Some((_, variable)) => TagSkip::When(variable.clone()),
            None => TagSkip::Always,
        }
    }
}
