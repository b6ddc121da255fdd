use super::Filter;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::runtime::{check_arity, RenderContext, RuntimeExtension, RuntimeFunction};
use crate::error::{CompilerError, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

pub const FORMAT_OPTION: &str = "format";

/// `${'{0} of {1}' @ format=[page, total]}` becomes `format('{0} of {1}', [page, total])`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatFilter;

impl Filter for FormatFilter {
    fn option_name(&self) -> &'static str {
        FORMAT_OPTION
    }

    fn priority(&self) -> i32 {
        20
    }

    fn apply(&self, expression: &Expression) -> Expression {
        if !expression.contains_option(FORMAT_OPTION) {
            return expression.clone();
        }
        let root = ExpressionNode::runtime_call(
            FORMAT_OPTION,
            vec![expression.root().clone(), expression.option_or_null(FORMAT_OPTION)],
        );
        expression.with_root(root).remove_options(&[FORMAT_OPTION])
    }
}

impl RuntimeExtension for FormatFilter {
    fn name(&self) -> &'static str {
        FORMAT_OPTION
    }

    fn provide<'a>(&self, context: &'a dyn RenderContext) -> RuntimeFunction<'a> {
        Box::new(move |arguments: &[Value]| {
            check_arity(FORMAT_OPTION, arguments, 2)?;
            let model = context.object_model();
            let pattern = model.coerce_to_string(&arguments[0]);
            let params: Vec<String> = model
                .coerce_to_collection(&arguments[1])
                .iter()
                .map(|param| model.coerce_to_string(param))
                .collect();
            Ok(Value::String(substitute(&pattern, &params)?))
        })
    }
}

fn placeholder_pattern() -> Result<&'static Regex> {
    static PLACEHOLDER: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\s*(\d+)\s*\}"))
        .as_ref()
        .map_err(|e| CompilerError::runtime(FORMAT_OPTION, e.to_string()))
}

/// Replace `{N}` placeholders. Placeholders without a matching parameter are kept.
fn substitute(pattern: &str, params: &[String]) -> Result<String> {
    let replaced = placeholder_pattern()?.replace_all(pattern, |captures: &Captures<'_>| {
        captures[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| params.get(index))
            .cloned()
            .unwrap_or_else(|| captures[0].to_string())
    });
    Ok(replaced.into_owned())
}
