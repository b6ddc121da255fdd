// FILE: src/compiler/middle_end/plugin/binding.rs

use super::{options_map, required_identifier, NoOpInvoke, Plugin, PluginInvoke};
use crate::compiler::frontend::ast::PluginCallInfo;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::middle_end::context::CompilerContext;
use crate::core::{DEFAULT_USE_NAME, RUNTIME_USE};
use crate::error::{Location, Result};
use std::rc::Rc;

/// `data-sly-use.name="target @ options"`: bind the object the runtime
/// builds for `target`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsePlugin;

/// Global binding made before the element is written.
struct GlobalBindingInvoke {
    name: String,
    expression: Expression,
    location: Location,
    /// Lower the expression to `use(target, options)`.
    as_use: bool,
}

impl Plugin for UsePlugin {
    fn name(&self) -> &'static str {
        "use"
    }

    fn priority(&self) -> i32 {
        1
    }

    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        _ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(GlobalBindingInvoke {
            name: call.identifier().unwrap_or(DEFAULT_USE_NAME).to_string(),
            expression: expression.clone(),
            location,
            as_use: true,
        }))
    }
}

/// `data-sly-set.name="${expr}"`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetPlugin;

impl Plugin for SetPlugin {
    fn name(&self) -> &'static str {
        "set"
    }

    fn priority(&self) -> i32 {
        1
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
        Ok(Rc::new(GlobalBindingInvoke {
            name: name.to_string(),
            expression: expression.clone(),
            location,
            as_use: false,
        }))
    }
}

impl PluginInvoke for GlobalBindingInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        let (root, options) = ctx.transform(&self.expression, None, self.location).into_parts();
        let value = if self.as_use {
            ExpressionNode::runtime_call(RUNTIME_USE, vec![root, options_map(options)])
        } else {
            root
        };
        ctx.bind_global(&self.name, value, self.location);
        Ok(())
    }
}
