use super::Filter;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::runtime::{check_arity, RenderContext, RuntimeExtension, RuntimeFunction};
use serde_json::Value;

pub const JOIN_OPTION: &str = "join";

/// `${items @ join=', '}` becomes `join(items, ', ')`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinFilter;

impl Filter for JoinFilter {
    fn option_name(&self) -> &'static str {
        JOIN_OPTION
    }

    fn priority(&self) -> i32 {
        30
    }

    fn apply(&self, expression: &Expression) -> Expression {
        if !expression.contains_option(JOIN_OPTION) {
            return expression.clone();
        }
        let root = ExpressionNode::runtime_call(
            JOIN_OPTION,
            vec![expression.root().clone(), expression.option_or_null(JOIN_OPTION)],
        );
        expression.with_root(root).remove_options(&[JOIN_OPTION])
    }
}

impl RuntimeExtension for JoinFilter {
    fn name(&self) -> &'static str {
        JOIN_OPTION
    }

    fn provide<'a>(&self, context: &'a dyn RenderContext) -> RuntimeFunction<'a> {
        Box::new(move |arguments: &[Value]| {
            check_arity(JOIN_OPTION, arguments, 2)?;
            let model = context.object_model();
            let separator = model.coerce_to_string(&arguments[1]);
            let joined = model
                .coerce_to_collection(&arguments[0])
                .iter()
                .map(|item| model.coerce_to_string(item))
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(Value::String(joined))
        })
    }
}
