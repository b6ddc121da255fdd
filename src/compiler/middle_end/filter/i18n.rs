use super::Filter;
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use std::collections::BTreeMap;

/// `${'Hello' @ i18n, locale='de', hint='greeting'}` becomes
/// `i18n('Hello', {locale: 'de', hint: 'greeting'})`.
#[derive(Debug, Clone, Copy, Default)]
pub struct I18nFilter;

pub const I18N_OPTION: &str = "i18n";
pub const LOCALE_OPTION: &str = "locale";
pub const HINT_OPTION: &str = "hint";

impl Filter for I18nFilter {
    fn option_name(&self) -> &'static str {
        I18N_OPTION
    }

    fn consumed_options(&self) -> &'static [&'static str] {
        &[LOCALE_OPTION, HINT_OPTION]
    }

    fn priority(&self) -> i32 {
        10
    }

    fn apply(&self, expression: &Expression) -> Expression {
        if !expression.contains_option(I18N_OPTION) {
            return expression.clone();
        }
        let arguments: BTreeMap<String, ExpressionNode> = [LOCALE_OPTION, HINT_OPTION]
            .into_iter()
            .filter_map(|name| {
                expression
                    .get_option(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();
        let root = ExpressionNode::runtime_call(
            I18N_OPTION,
            vec![expression.root().clone(), ExpressionNode::MapLiteral(arguments)],
        );
        expression
            .with_root(root)
            .remove_options(&[I18N_OPTION, LOCALE_OPTION, HINT_OPTION])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontend::expression::ExpressionParser;
    use crate::error::Location;

    #[test]
    fn test_locale_and_hint_are_folded_into_the_call() {
        let expression =
            ExpressionParser::parse_str("'Hello' @ i18n, locale='de', hint='greeting'", Location::new(1, 1))
                .unwrap();
        let result = I18nFilter.apply(&expression);
        assert!(result.is_terminal());
        assert_eq!(
            result.root().to_string(),
            "i18n('Hello', {hint: 'greeting', locale: 'de'})"
        );
    }

    #[test]
    fn test_locale_without_i18n_is_left_alone() {
        let expression =
            ExpressionParser::parse_str("'Hello' @ locale='de'", Location::new(1, 1)).unwrap();
        assert_eq!(I18nFilter.apply(&expression), expression);
    }
}
