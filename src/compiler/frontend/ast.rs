//! Node tree produced by the markup parser

use crate::compiler::frontend::expression::Expression;
use crate::compiler::middle_end::element_context::ElementContext;
use crate::error::Location;
use serde::Serialize;
use std::fmt;

/// Root of a parsed document.
#[derive(Debug, PartialEq, Serialize)]
pub struct Template {
    /// Empty for a document root.
    pub name: String,
    pub children: Vec<TemplateNode>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: TemplateNode) {
        self.children.push(child);
    }

    /// Number of element nodes anywhere in the tree.
    pub fn element_count(&self) -> usize {
        fn count(nodes: &[TemplateNode]) -> usize {
            nodes
                .iter()
                .map(|node| match node {
                    TemplateNode::Element(element) => 1 + count(&element.children),
                    _ => 0,
                })
                .sum()
        }
        count(&self.children)
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Comment(CommentNode),
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ElementNode {
    pub name: String,
    pub children: Vec<TemplateNode>,
    pub context: ElementContext,
    /// Written as `<name ... />`.
    pub self_closing: bool,
    /// False for void elements, which have no closing tag.
    pub has_end_tag: bool,
    pub location: Location,
}

impl ElementNode {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        let name = name.into();
        Self {
            context: ElementContext::new(name.clone()),
            name,
            children: Vec::new(),
            self_closing: false,
            has_end_tag: true,
            location,
        }
    }

    pub fn add_child(&mut self, child: TemplateNode) {
        self.children.push(child);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextNode {
    pub text: String,
    pub location: Location,
}

/// Comment content with the `<!--` and `-->` delimiters stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    pub text: String,
    pub location: Location,
}

impl CommentNode {
    /// `<!--/* ... */-->` comments never reach the output.
    pub fn is_server_comment(&self) -> bool {
        let trimmed = self.text.trim();
        trimmed.starts_with("/*") && trimmed.ends_with("*/")
    }
}

/// The `data-sly-<name>.<arg>...` part of a directive attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginCallInfo {
    pub name: String,
    pub arguments: Vec<String>,
}

impl PluginCallInfo {
    /// Split a directive attribute name that already had its prefix removed.
    pub fn parse(directive: &str) -> Self {
        let mut parts = directive.split('.');
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        Self {
            name,
            arguments: parts.map(str::to_string).collect(),
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }
}

impl fmt::Display for PluginCallInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", crate::core::SLY_ATTRIBUTE_PREFIX, self.name)?;
        for arg in &self.arguments {
            write!(f, ".{}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AttributeValue {
    /// Attribute written without `=`.
    Empty,
    Literal { text: String },
    PluginCall {
        descriptor: PluginCallInfo,
        expression: Expression,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    /// Quote character used in the source, kept for regeneration.
    pub quote: Option<char>,
    pub location: Location,
}

impl Attribute {
    pub fn literal(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Literal { text: text.into() },
            quote: Some('"'),
            location: Location::default(),
        }
    }

    pub fn is_plugin_call(&self) -> bool {
        matches!(self.value, AttributeValue::PluginCall { .. })
    }

    /// Location of the first character of the value, past `name=` and the quote.
    pub fn value_location(&self) -> Location {
        self.location
            .advance_columns(self.name.chars().count() + 1 + usize::from(self.quote.is_some()))
    }
}
