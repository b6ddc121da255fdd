// FILE: src/compiler/middle_end/plugin/include.rs

use super::{options_map, Plugin, PluginInvoke};
use crate::compiler::frontend::ast::PluginCallInfo;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::middle_end::context::CompilerContext;
use crate::core::{RUNTIME_INCLUDE, RUNTIME_RESOURCE};
use crate::error::{Location, Result};
use std::rc::Rc;

/// `data-sly-include="path @ options"`: output another script in place of the content.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludePlugin;

/// `data-sly-resource="path @ options"`: output a rendered resource in place of the content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourcePlugin;

struct IncludeInvoke {
    function: &'static str,
    expression: Expression,
    location: Location,
    variable: String,
}

fn include_invoke(
    function: &'static str,
    expression: &Expression,
    location: Location,
    ctx: &mut CompilerContext<'_>,
) -> Rc<dyn PluginInvoke> {
    Rc::new(IncludeInvoke {
        function,
        expression: expression.clone(),
        location,
        variable: ctx.generate_variable(),
    })
}

impl Plugin for IncludePlugin {
    fn name(&self) -> &'static str {
        "include"
    }

    fn priority(&self) -> i32 {
        70
    }

    fn invoke(
        &self,
        _call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(include_invoke(RUNTIME_INCLUDE, expression, location, ctx))
    }
}

impl Plugin for ResourcePlugin {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn priority(&self) -> i32 {
        70
    }

    fn invoke(
        &self,
        _call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(include_invoke(RUNTIME_RESOURCE, expression, location, ctx))
    }
}

impl PluginInvoke for IncludeInvoke {
    fn before_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        let (root, options) = ctx.transform(&self.expression, None, self.location).into_parts();
        let call = ExpressionNode::runtime_call(self.function, vec![root, options_map(options)]);
        ctx.bind(&self.variable, call, self.location);
        ctx.out_variable(&self.variable);
        ctx.unbind()
    }

    fn replaces_children(&self) -> bool {
        true
    }
}
