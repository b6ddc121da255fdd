// FILE: src/compiler/middle_end/plugin/control.rs

use super::{Plugin, PluginInvoke};
use crate::compiler::frontend::ast::PluginCallInfo;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::middle_end::context::CompilerContext;
use crate::core::{DEFAULT_LIST_ITEM, LIST_STATUS_SUFFIX, RUNTIME_LIST_STATUS};
use crate::error::{Location, Result};
use std::rc::Rc;

/// `data-sly-test[.name]`: render the element only when the condition holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestPlugin;

struct TestInvoke {
    expression: Expression,
    location: Location,
    variable: String,
    /// Named tests stay visible to the rest of the document.
    global: bool,
}

impl Plugin for TestPlugin {
    fn name(&self) -> &'static str {
        "test"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        let (variable, global) = match call.identifier() {
            Some(name) => (name.to_string(), true),
            None => (ctx.generate_variable(), false),
        };
        Ok(Rc::new(TestInvoke {
            expression: expression.clone(),
            location,
            variable,
            global,
        }))
    }
}

impl PluginInvoke for TestInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        let condition = ctx.transform(&self.expression, None, self.location);
        let (root, _) = condition.into_parts();
        if self.global {
            ctx.bind_global(&self.variable, root, self.location);
        } else {
            ctx.bind(&self.variable, root, self.location);
        }
        ctx.start_conditional(&self.variable, true);
        Ok(())
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        ctx.end_conditional();
        if !self.global {
            ctx.unbind()?;
        }
        Ok(())
    }
}

/// Names shared by `list` and `repeat`.
struct LoopNames {
    list: String,
    item: String,
    index: String,
    status: String,
}

impl LoopNames {
    fn new(call: &PluginCallInfo, ctx: &mut CompilerContext<'_>) -> Self {
        let item = call.identifier().unwrap_or(DEFAULT_LIST_ITEM).to_string();
        Self {
            list: ctx.generate_variable(),
            index: ctx.generate_variable(),
            status: format!("{}{}", item, LIST_STATUS_SUFFIX),
            item,
        }
    }

    fn bind_collection(&self, expression: &Expression, location: Location, ctx: &mut CompilerContext<'_>) {
        let collection = ctx.transform(expression, None, location);
        let (root, _) = collection.into_parts();
        ctx.bind(&self.list, root, location);
    }

    fn enter_loop(&self, location: Location, ctx: &mut CompilerContext<'_>) {
        ctx.start_loop(&self.list, &self.item, &self.index, location);
        let status = ExpressionNode::runtime_call(
            RUNTIME_LIST_STATUS,
            vec![
                ExpressionNode::identifier(self.index.as_str()),
                ExpressionNode::identifier(self.list.as_str()),
            ],
        );
        ctx.bind(&self.status, status, location);
    }

    fn leave_loop(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        ctx.unbind()?;
        ctx.end_loop()
    }
}

/// `data-sly-list[.item]`: repeat the element content once per item.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPlugin;

struct ListInvoke {
    expression: Expression,
    location: Location,
    names: LoopNames,
}

impl Plugin for ListPlugin {
    fn name(&self) -> &'static str {
        "list"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(ListInvoke {
            expression: expression.clone(),
            location,
            names: LoopNames::new(call, ctx),
        }))
    }
}

impl PluginInvoke for ListInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        self.names.bind_collection(&self.expression, self.location, ctx);
        // An empty collection removes the element entirely
        ctx.start_conditional(&self.names.list, true);
        Ok(())
    }

    fn before_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.names.enter_loop(self.location, ctx);
        Ok(())
    }

    fn after_children(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.names.leave_loop(ctx)
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        ctx.end_conditional();
        ctx.unbind()
    }
}

/// `data-sly-repeat[.item]`: repeat the whole element once per item.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatPlugin;

struct RepeatInvoke {
    expression: Expression,
    location: Location,
    names: LoopNames,
}

impl Plugin for RepeatPlugin {
    fn name(&self) -> &'static str {
        "repeat"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn invoke(
        &self,
        call: &PluginCallInfo,
        expression: &Expression,
        location: Location,
        ctx: &mut CompilerContext<'_>,
    ) -> Result<Rc<dyn PluginInvoke>> {
        Ok(Rc::new(RepeatInvoke {
            expression: expression.clone(),
            location,
            names: LoopNames::new(call, ctx),
        }))
    }
}

impl PluginInvoke for RepeatInvoke {
    fn before_element(&self, ctx: &mut CompilerContext<'_>, _tag_name: &str) -> Result<()> {
        self.names.bind_collection(&self.expression, self.location, ctx);
        self.names.enter_loop(self.location, ctx);
        Ok(())
    }

    fn after_element(&self, ctx: &mut CompilerContext<'_>) -> Result<()> {
        self.names.leave_loop(ctx)?;
        ctx.unbind()
    }
}
