use super::Filter;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};

pub const CONTEXT_OPTION: &str = "context";

/// Wraps the root in an escaping call for the markup context it is written in.
#[derive(Debug, Clone, Copy, Default)]
pub struct XssFilter;

impl Filter for XssFilter {
    fn option_name(&self) -> &'static str {
        CONTEXT_OPTION
    }

    fn priority(&self) -> i32 {
        100
    }

    fn apply(&self, expression: &Expression) -> Expression {
        let Some(context) = expression.get_option(CONTEXT_OPTION) else {
            return expression.clone();
        };
        let root = ExpressionNode::runtime_call(
            "xss",
            vec![expression.root().clone(), context.clone()],
        );
        expression.with_root(root).remove_options(&[CONTEXT_OPTION])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_lowers_to_xss_call() {
        let expression = Expression::from_root(ExpressionNode::identifier("title"))
            .with_option(CONTEXT_OPTION, ExpressionNode::string("attribute"));
        let result = XssFilter.apply(&expression);
        assert!(!result.contains_option(CONTEXT_OPTION));
        assert_eq!(result.root().to_string(), "xss(title, 'attribute')");
    }
}
