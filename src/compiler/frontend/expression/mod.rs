//! Expression model: a root node plus named option subtrees

pub mod interpolation;
pub mod lexer;
pub mod parser;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub use interpolation::{Fragment, Interpolation};
pub use parser::ExpressionParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOperator {
    Not,
    IsWhiteSpace,
    Length,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Not => write!(f, "!"),
            UnaryOperator::IsWhiteSpace => write!(f, "isWhiteSpace "),
            UnaryOperator::Length => write!(f, "length "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    And,
    Or,
    Equal,
    NotEqual,
    Lt,
    Leq,
    Gt,
    Geq,
    In,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Leq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Geq => ">=",
            BinaryOperator::In => "in",
        }
    }
}

/// A node of an expression tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ExpressionNode {
    NullLiteral,
    StringConstant(String),
    NumericConstant(f64),
    BooleanConstant(bool),
    Identifier(String),
    PropertyAccess {
        target: Box<ExpressionNode>,
        property: Box<ExpressionNode>,
    },
    ArrayLiteral(Vec<ExpressionNode>),
    MapLiteral(BTreeMap<String, ExpressionNode>),
    UnaryOperation {
        operator: UnaryOperator,
        target: Box<ExpressionNode>,
    },
    BinaryOperation {
        operator: BinaryOperator,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    TernaryOperation {
        condition: Box<ExpressionNode>,
        then_branch: Box<ExpressionNode>,
        else_branch: Box<ExpressionNode>,
    },
    /// Invocation of a function the runtime provides.
    RuntimeCall {
        function: String,
        arguments: Vec<ExpressionNode>,
    },
}

impl ExpressionNode {
    pub fn string(value: impl Into<String>) -> Self {
        ExpressionNode::StringConstant(value.into())
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        ExpressionNode::Identifier(name.into())
    }

    pub fn runtime_call(function: impl Into<String>, arguments: Vec<ExpressionNode>) -> Self {
        ExpressionNode::RuntimeCall {
            function: function.into(),
            arguments,
        }
    }

    pub fn property_access(target: ExpressionNode, property: impl Into<String>) -> Self {
        ExpressionNode::PropertyAccess {
            target: Box::new(target),
            property: Box::new(ExpressionNode::string(property)),
        }
    }

    pub fn binary(operator: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::BinaryOperation {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(target: ExpressionNode) -> Self {
        ExpressionNode::UnaryOperation {
            operator: UnaryOperator::Not,
            target: Box::new(target),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExpressionNode::NullLiteral)
    }

    /// String value of a constant node, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExpressionNode::StringConstant(s) => Some(s),
            _ => None,
        }
    }

    /// Every identifier referenced from this subtree, in depth-first order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.collect_identifiers(&mut found);
        found
    }

    fn collect_identifiers<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            ExpressionNode::Identifier(name) => found.push(name),
            ExpressionNode::PropertyAccess { target, property } => {
                target.collect_identifiers(found);
                property.collect_identifiers(found);
            }
            ExpressionNode::ArrayLiteral(items) => {
                items.iter().for_each(|item| item.collect_identifiers(found))
            }
            ExpressionNode::MapLiteral(entries) => {
                entries.values().for_each(|item| item.collect_identifiers(found))
            }
            ExpressionNode::UnaryOperation { target, .. } => target.collect_identifiers(found),
            ExpressionNode::BinaryOperation { left, right, .. } => {
                left.collect_identifiers(found);
                right.collect_identifiers(found);
            }
            ExpressionNode::TernaryOperation {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_identifiers(found);
                then_branch.collect_identifiers(found);
                else_branch.collect_identifiers(found);
            }
            ExpressionNode::RuntimeCall { arguments, .. } => {
                arguments.iter().for_each(|arg| arg.collect_identifiers(found))
            }
            ExpressionNode::NullLiteral
            | ExpressionNode::StringConstant(_)
            | ExpressionNode::NumericConstant(_)
            | ExpressionNode::BooleanConstant(_) => {}
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    write!(f, "'")?;
    for ch in value.chars() {
        match ch {
            '\'' => write!(f, "\\'")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            _ => write!(f, "{}", ch)?,
        }
    }
    write!(f, "'")
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::NullLiteral => write!(f, "null"),
            ExpressionNode::StringConstant(s) => write_string_literal(f, s),
            ExpressionNode::NumericConstant(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            ExpressionNode::BooleanConstant(b) => write!(f, "{}", b),
            ExpressionNode::Identifier(name) => write!(f, "{}", name),
            ExpressionNode::PropertyAccess { target, property } => match property.as_ref() {
                ExpressionNode::StringConstant(name) if crate::core::util::is_valid_identifier(name) => {
                    write!(f, "{}.{}", target, name)
                }
                other => write!(f, "{}[{}]", target, other),
            },
            ExpressionNode::ArrayLiteral(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ExpressionNode::MapLiteral(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            ExpressionNode::UnaryOperation { operator, target } => write!(f, "{}{}", operator, target),
            ExpressionNode::BinaryOperation { operator, left, right } => {
                write!(f, "({} {} {})", left, operator.symbol(), right)
            }
            ExpressionNode::TernaryOperation {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "({} ? {} : {})", condition, then_branch, else_branch),
            ExpressionNode::RuntimeCall { function, arguments } => {
                write!(f, "{}(", function)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// An expression root together with the options written after `@`.
///
/// Transformations never mutate an expression in place; each one returns
/// a new value and the caller replaces the old one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    root: ExpressionNode,
    options: HashMap<String, ExpressionNode>,
}

impl Expression {
    pub fn new(root: ExpressionNode, options: HashMap<String, ExpressionNode>) -> Self {
        Self { root, options }
    }

    pub fn from_root(root: ExpressionNode) -> Self {
        Self::new(root, HashMap::new())
    }

    pub fn root(&self) -> &ExpressionNode {
        &self.root
    }

    pub fn options(&self) -> &HashMap<String, ExpressionNode> {
        &self.options
    }

    pub fn contains_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn get_option(&self, name: &str) -> Option<&ExpressionNode> {
        self.options.get(name)
    }

    /// Option value, or a null literal when the option is absent.
    pub fn option_or_null(&self, name: &str) -> ExpressionNode {
        self.options.get(name).cloned().unwrap_or(ExpressionNode::NullLiteral)
    }

    /// An expression with no options left for a filter to consume.
    pub fn is_terminal(&self) -> bool {
        self.options.is_empty()
    }

    pub fn with_root(&self, root: ExpressionNode) -> Self {
        Self {
            root,
            options: self.options.clone(),
        }
    }

    pub fn with_option(&self, name: impl Into<String>, value: ExpressionNode) -> Self {
        let mut options = self.options.clone();
        options.insert(name.into(), value);
        Self {
            root: self.root.clone(),
            options,
        }
    }

    pub fn remove_options(&self, names: &[&str]) -> Self {
        let options = self
            .options
            .iter()
            .filter(|(name, _)| !names.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            root: self.root.clone(),
            options,
        }
    }

    /// Option names in a stable order, for output that must not depend on hashing.
    pub fn sorted_option_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.options.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn into_parts(self) -> (ExpressionNode, HashMap<String, ExpressionNode>) {
        (self.root, self.options)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}", self.root)?;
        for (i, name) in self.sorted_option_names().into_iter().enumerate() {
            write!(f, "{}", if i == 0 { " @ " } else { ", " })?;
            match &self.options[name] {
                ExpressionNode::NullLiteral => write!(f, "{}", name)?,
                value => write!(f, "{}={}", name, value)?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Expression {
        let mut options = HashMap::new();
        options.insert("join".to_string(), ExpressionNode::string(", "));
        options.insert("context".to_string(), ExpressionNode::string("text"));
        Expression::new(ExpressionNode::identifier("items"), options)
    }

    #[test]
    fn test_remove_options_leaves_original_untouched() {
        let expr = sample();
        let trimmed = expr.remove_options(&["join"]);
        assert!(expr.contains_option("join"));
        assert!(!trimmed.contains_option("join"));
        assert!(trimmed.contains_option("context"));
        assert_eq!(trimmed.root(), expr.root());
    }

    #[test]
    fn test_option_or_null() {
        let expr = sample();
        assert_eq!(expr.option_or_null("missing"), ExpressionNode::NullLiteral);
        assert_eq!(expr.option_or_null("join"), ExpressionNode::string(", "));
    }

    #[test]
    fn test_terminal_when_no_options() {
        assert!(Expression::from_root(ExpressionNode::NullLiteral).is_terminal());
        assert!(!sample().is_terminal());
    }

    #[test]
    fn test_identifiers_walks_whole_tree() {
        let node = ExpressionNode::TernaryOperation {
            condition: Box::new(ExpressionNode::identifier("a")),
            then_branch: Box::new(ExpressionNode::PropertyAccess {
                target: Box::new(ExpressionNode::identifier("b")),
                property: Box::new(ExpressionNode::identifier("c")),
            }),
            else_branch: Box::new(ExpressionNode::string("d")),
        };
        assert_eq!(node.identifiers(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_display_sorts_options() {
        assert_eq!(sample().to_string(), "${items @ context='text', join=', '}");
    }
}
