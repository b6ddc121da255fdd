//! Expression filters
//!
//! A filter consumes one or more expression options and rewrites the root
//! into a runtime call. The pipeline applies registered filters in ascending
//! priority; every filter must leave an expression that lacks its trigger
//! option unchanged.

pub mod format;
pub mod i18n;
pub mod join;
pub mod xss;

use crate::compiler::frontend::expression::Expression;
use crate::error::{CompilerError, Result};
use std::collections::HashSet;

pub use format::FormatFilter;
pub use i18n::I18nFilter;
pub use join::JoinFilter;
pub use xss::XssFilter;

pub trait Filter: Send + Sync {
    /// The option whose presence activates this filter.
    fn option_name(&self) -> &'static str;

    /// Additional options this filter removes when it runs.
    fn consumed_options(&self) -> &'static [&'static str] {
        &[]
    }

    fn priority(&self) -> i32;

    fn apply(&self, expression: &Expression) -> Expression;

    /// Every option name the filter owns.
    fn owned_options(&self) -> Vec<&'static str> {
        let mut names = vec![self.option_name()];
        names.extend(self.consumed_options().iter().copied());
        names
    }
}

/// Ordered set of filters with disjoint option ownership.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in filters: i18n, format, join and xss.
    pub fn with_defaults() -> Self {
        Self::without(&[])
    }

    /// The built-in filters minus the ones named in `disabled`.
    pub fn without(disabled: &[String]) -> Self {
        let defaults: Vec<Box<dyn Filter>> = vec![
            Box::new(I18nFilter),
            Box::new(FormatFilter),
            Box::new(JoinFilter),
            Box::new(XssFilter),
        ];
        let mut pipeline = Self::new();
        for filter in defaults {
            if disabled.iter().any(|name| name == filter.option_name()) {
                log::debug!("Filter '{}' disabled by configuration", filter.option_name());
                continue;
            }
            // Built-in filters own disjoint options, registration cannot fail
            if let Err(e) = pipeline.register(filter) {
                log::error!("{}", e);
            }
        }
        pipeline
    }

    /// Add a filter, keeping the pipeline sorted by priority. Filters of equal
    /// priority run in registration order.
    pub fn register(&mut self, filter: Box<dyn Filter>) -> Result<()> {
        let claimed: HashSet<&str> = self
            .filters
            .iter()
            .flat_map(|existing| existing.owned_options())
            .collect();
        if let Some(conflict) = filter
            .owned_options()
            .into_iter()
            .find(|name| claimed.contains(name))
        {
            return Err(CompilerError::configuration(format!(
                "Option '{}' is already consumed by another filter, cannot register '{}'",
                conflict,
                filter.option_name()
            )));
        }

        let position = self
            .filters
            .iter()
            .position(|existing| existing.priority() > filter.priority())
            .unwrap_or(self.filters.len());
        log::debug!(
            "Registered filter '{}' with priority {}",
            filter.option_name(),
            filter.priority()
        );
        self.filters.insert(position, filter);
        Ok(())
    }

    pub fn apply(&self, expression: &Expression) -> Expression {
        self.filters
            .iter()
            .fold(expression.clone(), |current, filter| filter.apply(&current))
    }

    /// Trigger option names in application order.
    pub fn option_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.option_name()).collect()
    }

    /// The filter owning `option`, either as trigger or as consumed option.
    pub fn filter_for(&self, option: &str) -> Option<&dyn Filter> {
        self.filters
            .iter()
            .find(|f| f.owned_options().contains(&option))
            .map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontend::expression::{ExpressionNode, ExpressionParser};
    use crate::error::Location;

    fn parse(source: &str) -> Expression {
        ExpressionParser::parse_str(source, Location::new(1, 1)).unwrap()
    }

    struct Upper;

    impl Filter for Upper {
        fn option_name(&self) -> &'static str {
            "upper"
        }

        fn priority(&self) -> i32 {
            50
        }

        fn apply(&self, expression: &Expression) -> Expression {
            if !expression.contains_option("upper") {
                return expression.clone();
            }
            expression
                .with_root(ExpressionNode::runtime_call("upper", vec![expression.root().clone()]))
                .remove_options(&["upper"])
        }
    }

    struct ClaimsLocale;

    impl Filter for ClaimsLocale {
        fn option_name(&self) -> &'static str {
            "localeName"
        }

        fn consumed_options(&self) -> &'static [&'static str] {
            &["locale"]
        }

        fn priority(&self) -> i32 {
            5
        }

        fn apply(&self, expression: &Expression) -> Expression {
            expression.clone()
        }
    }

    #[test]
    fn test_default_order() {
        let pipeline = FilterPipeline::with_defaults();
        assert_eq!(pipeline.option_names(), vec!["i18n", "format", "join", "context"]);
    }

    #[test]
    fn test_every_filter_is_identity_without_its_option() {
        let expression = parse("a.b @ unrelated='x'");
        let pipeline = FilterPipeline::with_defaults();
        for name in pipeline.option_names() {
            let filter = pipeline.filter_for(name).unwrap();
            assert_eq!(filter.apply(&expression), expression, "filter {}", name);
        }
    }

    #[test]
    fn test_every_filter_removes_what_it_consumes() {
        let expression = parse("a @ i18n, locale='de', hint='h', format=[1], join=',', context='text'");
        let pipeline = FilterPipeline::with_defaults();
        let result = pipeline.apply(&expression);
        assert!(result.is_terminal(), "left options {:?}", result.options());
    }

    #[test]
    fn test_pipeline_nests_calls_by_priority() {
        let result = FilterPipeline::with_defaults().apply(&parse("items @ join=', ', context='html'"));
        assert_eq!(result.root().to_string(), "xss(join(items, ', '), 'html')");
    }

    #[test]
    fn test_custom_filter_is_ordered_by_priority() {
        let mut pipeline = FilterPipeline::with_defaults();
        pipeline.register(Box::new(Upper)).unwrap();
        assert_eq!(
            pipeline.option_names(),
            vec!["i18n", "format", "join", "upper", "context"]
        );
        let result = pipeline.apply(&parse("name @ upper, context='text'"));
        assert_eq!(result.root().to_string(), "xss(upper(name), 'text')");
    }

    #[test]
    fn test_overlapping_options_are_rejected() {
        let mut pipeline = FilterPipeline::with_defaults();
        let err = pipeline.register(Box::new(ClaimsLocale)).unwrap_err();
        assert!(err.to_string().contains("'locale'"));
        assert_eq!(pipeline.len(), 4);
    }

    #[test]
    fn test_disabled_filters() {
        let pipeline = FilterPipeline::without(&["join".to_string()]);
        assert_eq!(pipeline.option_names(), vec!["i18n", "format", "context"]);
        let result = pipeline.apply(&parse("items @ join=','"));
        assert!(result.contains_option("join"));
    }
}
