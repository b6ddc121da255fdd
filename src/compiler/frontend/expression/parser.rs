//! Recursive descent parser for expression bodies

use super::lexer::{ExprLexer, ExprToken, ExprTokenType};
use super::{BinaryOperator, Expression, ExpressionNode};
use crate::core::MAX_EXPRESSION_DEPTH;
use crate::error::{CompilerError, Location, Result};
use std::collections::HashMap;

pub struct ExpressionParser {
    tokens: Vec<ExprToken>,
    current: usize,
    depth: usize,
}

impl ExpressionParser {
    /// A token list missing its end marker gets one appended.
    pub fn new(mut tokens: Vec<ExprToken>) -> Self {
        if !matches!(tokens.last().map(|t| &t.token_type), Some(ExprTokenType::Eof)) {
            let location = tokens.last().map(|t| t.location).unwrap_or(Location::new(1, 1));
            tokens.push(ExprToken {
                token_type: ExprTokenType::Eof,
                location,
            });
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    /// Parse the text between `${` and `}`; `start` is the location of its first character.
    pub fn parse_str(body: &str, start: Location) -> Result<Expression> {
        let tokens = ExprLexer::new(body, start).tokenize()?;
        ExpressionParser::new(tokens).parse()
    }

    pub fn parse(&mut self) -> Result<Expression> {
        let root = if self.check(&ExprTokenType::At) || self.is_at_end() {
            ExpressionNode::NullLiteral
        } else {
            self.parse_node()?
        };

        let mut options = HashMap::new();
        if self.match_token(&ExprTokenType::At) {
            loop {
                let (name, value) = self.parse_option()?;
                options.insert(name, value);
                if !self.match_token(&ExprTokenType::Comma) {
                    break;
                }
            }
        }

        if !self.is_at_end() {
            return Err(self.error(format!("Unexpected {}", self.peek().token_type)));
        }

        Ok(Expression::new(root, options))
    }

    fn parse_option(&mut self) -> Result<(String, ExpressionNode)> {
        let name = match &self.advance().token_type {
            ExprTokenType::Identifier(name) => name.clone(),
            // `in` and literal keywords are legal option names
            ExprTokenType::In => "in".to_string(),
            other => {
                let message = format!("Expected option name, found {}", other);
                return Err(CompilerError::expression(self.previous().location, message));
            }
        };
        let value = if self.match_token(&ExprTokenType::Assign) {
            self.parse_node()?
        } else {
            ExpressionNode::NullLiteral
        };
        Ok((name, value))
    }

    fn parse_node(&mut self) -> Result<ExpressionNode> {
        self.descend()?;
        let node = self.parse_ternary();
        self.depth -= 1;
        node
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(self.error(format!(
                "Expression nesting exceeds {} levels",
                MAX_EXPRESSION_DEPTH
            )));
        }
        Ok(())
    }

    fn parse_ternary(&mut self) -> Result<ExpressionNode> {
        let condition = self.parse_or()?;
        if self.match_token(&ExprTokenType::Question) {
            let then_branch = self.parse_node()?;
            self.consume(&ExprTokenType::Colon, "Expected ':' in ternary expression")?;
            let else_branch = self.parse_node()?;
            return Ok(ExpressionNode::TernaryOperation {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(condition)
    }

    fn parse_or(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_and()?;
        while self.match_token(&ExprTokenType::Or) {
            let right = self.parse_and()?;
            left = ExpressionNode::binary(BinaryOperator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ExpressionNode> {
        let mut left = self.parse_comparison()?;
        while self.match_token(&ExprTokenType::And) {
            let right = self.parse_comparison()?;
            left = ExpressionNode::binary(BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<ExpressionNode> {
        let left = self.parse_unary()?;
        let operator = match self.peek().token_type {
            ExprTokenType::Equal => BinaryOperator::Equal,
            ExprTokenType::NotEqual => BinaryOperator::NotEqual,
            ExprTokenType::Lt => BinaryOperator::Lt,
            ExprTokenType::Leq => BinaryOperator::Leq,
            ExprTokenType::Gt => BinaryOperator::Gt,
            ExprTokenType::Geq => BinaryOperator::Geq,
            ExprTokenType::In => BinaryOperator::In,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_unary()?;
        Ok(ExpressionNode::binary(operator, left, right))
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode> {
        if self.match_token(&ExprTokenType::Not) {
            self.descend()?;
            let target = self.parse_unary();
            self.depth -= 1;
            return Ok(ExpressionNode::not(target?));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExpressionNode> {
        let mut node = self.parse_primary()?;
        loop {
            if self.match_token(&ExprTokenType::Dot) {
                let property = match &self.advance().token_type {
                    ExprTokenType::Identifier(name) => name.clone(),
                    ExprTokenType::Number(n) => ExpressionNode::NumericConstant(*n).to_string(),
                    other => {
                        let message = format!("Expected property name after '.', found {}", other);
                        return Err(CompilerError::expression(self.previous().location, message));
                    }
                };
                node = ExpressionNode::property_access(node, property);
            } else if self.match_token(&ExprTokenType::LeftBracket) {
                let property = self.parse_node()?;
                self.consume(&ExprTokenType::RightBracket, "Expected ']' after property")?;
                node = ExpressionNode::PropertyAccess {
                    target: Box::new(node),
                    property: Box::new(property),
                };
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        let token = self.advance().clone();
        match token.token_type {
            ExprTokenType::String(s) => Ok(ExpressionNode::StringConstant(s)),
            ExprTokenType::Number(n) => Ok(ExpressionNode::NumericConstant(n)),
            ExprTokenType::True => Ok(ExpressionNode::BooleanConstant(true)),
            ExprTokenType::False => Ok(ExpressionNode::BooleanConstant(false)),
            ExprTokenType::Null => Ok(ExpressionNode::NullLiteral),
            ExprTokenType::Identifier(name) => Ok(ExpressionNode::Identifier(name)),
            ExprTokenType::LeftParen => {
                let inner = self.parse_node()?;
                self.consume(&ExprTokenType::RightParen, "Expected ')'")?;
                Ok(inner)
            }
            ExprTokenType::LeftBracket => {
                let mut items = Vec::new();
                if !self.check(&ExprTokenType::RightBracket) {
                    loop {
                        items.push(self.parse_node()?);
                        if !self.match_token(&ExprTokenType::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&ExprTokenType::RightBracket, "Expected ']' after array items")?;
                Ok(ExpressionNode::ArrayLiteral(items))
            }
            other => Err(CompilerError::expression(
                token.location,
                format!("Unexpected {}", other),
            )),
        }
    }

    fn consume(&mut self, expected: &ExprTokenType, message: &str) -> Result<()> {
        if self.check(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("{}, found {}", message, self.peek().token_type)))
        }
    }

    fn error(&self, message: String) -> CompilerError {
        CompilerError::expression(self.peek().location, message)
    }

    fn match_token(&mut self, expected: &ExprTokenType) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, expected: &ExprTokenType) -> bool {
        &self.peek().token_type == expected
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, ExprTokenType::Eof)
    }

    fn peek(&self) -> &ExprToken {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &ExprToken {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> &ExprToken {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Expression {
        ExpressionParser::parse_str(body, Location::new(1, 3)).unwrap()
    }

    #[test]
    fn test_property_access() {
        let expr = parse("properties.jcr:title");
        assert_eq!(
            expr.root(),
            &ExpressionNode::property_access(ExpressionNode::identifier("properties"), "jcr:title")
        );
        let expr = parse("list[0]");
        assert_eq!(expr.root().to_string(), "list[0]");
    }

    #[test]
    fn test_options() {
        let expr = parse("'Hello {0}' @ format=[name], i18n, context='html'");
        assert_eq!(expr.root(), &ExpressionNode::string("Hello {0}"));
        assert_eq!(
            expr.get_option("format"),
            Some(&ExpressionNode::ArrayLiteral(vec![ExpressionNode::identifier("name")]))
        );
        assert_eq!(expr.get_option("i18n"), Some(&ExpressionNode::NullLiteral));
        assert_eq!(expr.get_option("context"), Some(&ExpressionNode::string("html")));
    }

    #[test]
    fn test_options_only() {
        let expr = parse("@ title, count=1");
        assert!(expr.root().is_null());
        assert!(expr.contains_option("title"));
        assert_eq!(expr.get_option("count"), Some(&ExpressionNode::NumericConstant(1.0)));
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a || b && !c == d");
        assert_eq!(expr.root().to_string(), "(a || (b && (!c == d)))");
    }

    #[test]
    fn test_nested_ternary() {
        let expr = parse("a ? b : c ? d : e");
        assert_eq!(expr.root().to_string(), "(a ? b : (c ? d : e))");
    }

    #[test]
    fn test_in_operator() {
        let expr = parse("'a' in letters");
        assert_eq!(expr.root().to_string(), "('a' in letters)");
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        let err = ExpressionParser::parse_str("a b", Location::new(1, 3)).unwrap_err();
        assert_eq!(err.location(), Some(Location::new(1, 5)));
    }

    #[test]
    fn test_missing_bracket() {
        assert!(ExpressionParser::parse_str("[a, b", Location::new(1, 1)).is_err());
    }

    #[test]
    fn test_empty_token_list() {
        let expression = ExpressionParser::new(Vec::new()).parse().unwrap();
        assert_eq!(*expression.root(), ExpressionNode::NullLiteral);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        for body in [
            "!".repeat(100_000) + "a",
            "(".repeat(100_000) + "a",
            "[".repeat(100_000),
            "a ? b : ".repeat(100_000) + "c",
        ] {
            let err = ExpressionParser::parse_str(&body, Location::new(1, 1)).unwrap_err();
            assert!(matches!(err, CompilerError::Expression { .. }), "{:?}", err);
            assert!(err.to_string().contains("nesting"), "{}", err);
        }
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let body = format!("{}a{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse(&body).root(), &ExpressionNode::Identifier("a".into()));
        assert_eq!(
            parse("!!a").root(),
            &ExpressionNode::not(ExpressionNode::not(ExpressionNode::Identifier("a".into())))
        );
    }
}
