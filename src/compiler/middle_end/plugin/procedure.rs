// FILE: src/compiler/middle_end/plugin/procedure.rs

use super::{options_map, required_identifier, NoOpInvoke, Plugin, PluginInvoke, TagSkip};
use crate::compiler::frontend::ast::PluginCallInfo;
use crate::compiler::frontend::expression::Expression;
use crate::compiler::middle_end::context::CompilerContext;
use crate::error::{Location, Result};
use std::rc::Rc;

/// `data-sly-template.name="${@ param1, param2}"`: define a procedure whose
/// body is the element content.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePlugin;

struct TemplateInvoke {
    name: String,
    parameters: Vec<String>,
    location: Location,
}

impl Plugin for TemplatePlugin {
    fn name(&self) -> &'static str {
        "template"
    }

    fn priority(&self) -> i32 {
        2
    }

    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        let Some(name) = required_identifier(call, location, ctx) else {
            return Ok(Rc::new(NoOpInvoke));
        };
        if !expression.root().is_null() {
            ctx.diagnostics().warning(
                location,
                format!("{} ignores its expression, only options declare parameters", call),
            );
        }
        // Declared up front so calls earlier in the document resolve
        ctx.declare_global(name, location);
        Ok(Rc::new(TemplateInvoke {
            name: name.to_string(),
            parameters: expression
                .sorted_option_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            location,
        }))
    }
}

impl PluginInvoke for TemplateInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        ctx.start_procedure(&self.name, self.parameters.clone(), self.location);
        Ok(())
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        ctx.end_procedure()
    }

    fn skip_tag(&self) -> TagSkip {
        TagSkip::Always
    }
}

/// `data-sly-call="${name @ param1=value}"`: call a procedure in place of
/// the element content.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallPlugin;

struct CallInvoke {
    expression: Expression,
    location: Location,
    template_variable: String,
    arguments_variable: String,
}

impl Plugin for CallPlugin {
    fn name(&self) -> &'static str {
        "call"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn invoke(
        &self,
        _call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(CallInvoke {
            expression: expression.clone(),
            location,
            template_variable: ctx.generate_variable(),
            arguments_variable: ctx.generate_variable(),
        }))
    }
}

impl PluginInvoke for CallInvoke {
    fn before_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        let (root, options) = ctx.transform(&self.expression, None, self.location).into_parts();
        ctx.bind(&self.template_variable, root, self.location);
        ctx.bind(&self.arguments_variable, options_map(options), self.location);
        ctx.call_procedure(&self.template_variable, &self.arguments_variable);
        ctx.unbind()?;
        ctx.unbind()
    }

    fn replaces_children(&self) -> bool {
        true
    }
}
