//! Depth-first walk over the node tree, emitting commands
//!
//! The walk consumes the tree. Each element gets its plugin invocations
//! attached to its [`ElementContext`] before any of its hooks run.

use crate::compiler::frontend::ast::*;
use crate::compiler::frontend::expression::{Expression, Fragment, Interpolation};
use crate::compiler::middle_end::context::{CompilerContext, MarkupContext};
use crate::compiler::middle_end::element_context::ElementContext;
use crate::compiler::middle_end::plugin::{PluginInvoke, PluginRegistry, TagSkip};
use crate::core::util::{is_raw_text_element, is_sly_element, is_uri_attribute};
use crate::error::{CompilerError, Location, Result};
use std::collections::HashSet;

pub struct TemplateWalker<'r> {
    plugins: &'r PluginRegistry,
}

impl<'r> TemplateWalker<'r> {
    pub fn new(plugins: &'r PluginRegistry) -> Self {
        Self { plugins }
    }

    pub fn walk(&self, template: Template, ctx: &mut CompilerContext<'_>) -> Result<()> {
        log::debug!("Walking template with {} top-level nodes", template.children.len());
        for child in template.children {
            self.visit(child, ctx)?;
        }
        Ok(())
    }

    fn visit(&self, node: TemplateNode, ctx: &mut CompilerContext<'_>) -> Result<()> {
        match node {
            TemplateNode::Element(element) => self.visit_element(element, ctx),
            TemplateNode::Text(text) => self.write_interpolated(&text.text, text.location, None, ctx),
            TemplateNode::Comment(comment) => self.visit_comment(comment, ctx),
        }
    }

    fn visit_comment(&self, comment: CommentNode, ctx: &mut CompilerContext<'_>) -> Result<()> {
        if comment.is_server_comment() {
            log::trace!("Dropping server comment at {}", comment.location);
            return Ok(());
        }
        ctx.out_text("<!--");
        self.write_interpolated(
            &comment.text,
            comment.location.advance_columns(4),
            Some(MarkupContext::Comment),
            ctx,
        )?;
        ctx.out_text("-->");
        Ok(())
    }

    fn visit_element(&self, element: ElementNode, ctx: &mut CompilerContext<'_>) -> Result<()> {
        let ElementNode {
            name,
            children,
            mut context,
            self_closing,
            has_end_tag,
            location,
        } = element;

        let unknown = self.attach_plugins(&mut context, ctx)?;
        let raw_text = is_raw_text_element(&name);
        if raw_text {
            ctx.enter_raw_text();
        }

        let invoke = context.plugin_invoke();
        invoke.before_element(ctx, &name)?;
        let skip = if is_sly_element(&name) {
            TagSkip::Always
        } else {
            invoke.skip_tag()
        };

        if skip != TagSkip::Always {
            invoke.before_tag_open(ctx)?;
            self.write_start_tag(&name, &context, &unknown, self_closing, &skip, ctx)?;
            invoke.after_tag_open(ctx)?;
        }

        invoke.before_children(ctx)?;
        if invoke.replaces_children() {
            if !children.is_empty() {
                log::debug!("Content of <{}> at {} replaced by a directive", name, location);
            }
        } else {
            for child in children {
                self.visit(child, ctx)?;
            }
        }
        invoke.after_children(ctx)?;

        if skip != TagSkip::Always && has_end_tag && !self_closing {
            invoke.before_tag_close(ctx)?;
            self.write_tag(&name, invoke, &skip, "</", ">", ctx);
            invoke.after_tag_close(ctx)?;
        }
        invoke.after_element(ctx)?;

        if raw_text {
            ctx.leave_raw_text();
        }
        Ok(())
    }

    /// Invoke the plugin of every directive attribute. Returns the indices of
    /// directive attributes no plugin handles; those are written as plain
    /// attributes.
    fn attach_plugins(&self, context: &mut ElementContext, ctx: &mut CompilerContext<'_>) -> Result<HashSet<usize>> {
        let mut unknown = HashSet::new();
        let mut invocations = Vec::new();
        for (index, attribute) in context.attributes().iter().enumerate() {
            let AttributeValue::PluginCall { descriptor, expression } = &attribute.value else {
                continue;
            };
            match self.plugins.get(&descriptor.name) {
                Some(plugin) => {
                    let invoke = plugin.invoke(descriptor, expression, attribute.location, ctx)?;
                    invocations.push((invoke, plugin.priority()));
                }
                None => {
                    ctx.diagnostics()
                        .error(attribute.location, format!("Unknown directive {}", descriptor));
                    unknown.insert(index);
                }
            }
        }
        for (invoke, priority) in invocations {
            context.add_plugin(invoke, priority);
        }
        Ok(unknown)
    }

    fn write_start_tag(
        &self,
        name: &str,
        context: &ElementContext,
        unknown: &HashSet<usize>,
        self_closing: bool,
        skip: &TagSkip,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<()> {
        let invoke = context.plugin_invoke();
        if let TagSkip::When(variable) = skip {
            ctx.start_conditional(variable, false);
        }
        ctx.out_text("<");
        self.write_tag_name(name, invoke, ctx);

        invoke.before_attributes(ctx)?;
        for (index, attribute) in context.attributes().iter().enumerate() {
            if attribute.is_plugin_call() && !unknown.contains(&index) {
                continue;
            }
            if invoke.overrides_attribute(&attribute.name) {
                continue;
            }
            invoke.before_attribute(ctx, &attribute.name)?;
            self.write_attribute(attribute, ctx)?;
            invoke.after_attribute(ctx, &attribute.name)?;
        }
        invoke.after_attributes(ctx)?;

        ctx.out_text(if self_closing { "/>" } else { ">" });
        if let TagSkip::When(_) = skip {
            ctx.end_conditional();
        }
        Ok(())
    }

    fn write_tag(
        &self,
        name: &str,
        invoke: &dyn PluginInvoke,
        skip: &TagSkip,
        open: &str,
        close: &str,
        ctx: &mut CompilerContext<'_>,
    ) {
        if let TagSkip::When(variable) = skip {
            ctx.start_conditional(variable, false);
        }
        ctx.out_text(open);
        self.write_tag_name(name, invoke, ctx);
        ctx.out_text(close);
        if let TagSkip::When(_) = skip {
            ctx.end_conditional();
        }
    }

    fn write_tag_name(&self, name: &str, invoke: &dyn PluginInvoke, ctx: &mut CompilerContext<'_>) {
        match invoke.tag_name_variable() {
            Some(variable) => ctx.out_variable(variable),
            None => ctx.out_text(name),
        }
    }

    fn write_attribute(&self, attribute: &Attribute, ctx: &mut CompilerContext<'_>) -> Result<()> {
        let quote = attribute.quote.unwrap_or('"');
        let markup = if is_uri_attribute(&attribute.name) {
            MarkupContext::Uri
        } else {
            MarkupContext::Attribute
        };
        match &attribute.value {
            AttributeValue::Empty => {
                ctx.out_text(&format!(" {}", attribute.name));
                Ok(())
            }
            AttributeValue::PluginCall { expression, .. } => self.write_dynamic_attribute(
                &attribute.name,
                expression,
                attribute.value_location(),
                markup,
                quote,
                ctx,
            ),
            AttributeValue::Literal { text } => {
                let value_location = attribute.value_location();
                let interpolation = match Interpolation::parse(text, value_location) {
                    Ok(interpolation) => interpolation,
                    Err(e) => {
                        report(ctx, e, value_location);
                        ctx.out_text(&format!(" {}={}{}{}", attribute.name, quote, text, quote));
                        return Ok(());
                    }
                };
                if let [Fragment::Expr { expression, location }] = interpolation.fragments() {
                    return self.write_dynamic_attribute(&attribute.name, expression, *location, markup, quote, ctx);
                }
                ctx.out_text(&format!(" {}={}", attribute.name, quote));
                self.write_fragments(interpolation.into_fragments(), Some(markup), ctx)?;
                ctx.out_text(&quote.to_string());
                Ok(())
            }
        }
    }

    /// An attribute whose whole value is one expression. A falsy value drops
    /// the attribute.
    fn write_dynamic_attribute(
        &self,
        name: &str,
        expression: &Expression,
        location: Location,
        markup: MarkupContext,
        quote: char,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<()> {
        let (root, _) = ctx.transform(expression, Some(markup), location).into_parts();
        let variable = ctx.bind_temporary(root, location);
        ctx.start_conditional(&variable, true);
        ctx.out_text(&format!(" {}={}", name, quote));
        ctx.out_variable(&variable);
        ctx.out_text(&quote.to_string());
        ctx.end_conditional();
        ctx.unbind()
    }

    /// Text with embedded expressions. `None` means element content.
    fn write_interpolated(
        &self,
        text: &str,
        location: Location,
        markup: Option<MarkupContext>,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<()> {
        match Interpolation::parse(text, location) {
            Ok(interpolation) => self.write_fragments(interpolation.into_fragments(), markup, ctx),
            Err(e) => {
                report(ctx, e, location);
                ctx.out_text(text);
                Ok(())
            }
        }
    }

    fn write_fragments(
        &self,
        fragments: Vec<Fragment>,
        markup: Option<MarkupContext>,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<()> {
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => ctx.out_text(&text),
                Fragment::Expr { expression, location } => {
                    let transformed = match markup {
                        Some(markup) => ctx.transform(&expression, Some(markup), location),
                        None => ctx.transform_text(&expression, location),
                    };
                    let (root, _) = transformed.into_parts();
                    let variable = ctx.bind_temporary(root, location);
                    ctx.out_variable(&variable);
                    ctx.unbind()?;
                }
            }
        }
        Ok(())
    }
}

fn report(ctx: &mut CompilerContext<'_>, error: CompilerError, fallback: Location) {
    let location = error.location().unwrap_or(fallback);
    let message = match error {
        CompilerError::Expression { message, .. } | CompilerError::Parse { message, .. } => message,
        other => other.to_string(),
    };
    ctx.diagnostics().error(location, message);
}
