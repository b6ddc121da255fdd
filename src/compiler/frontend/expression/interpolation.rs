//! Splitting of text and attribute values into literal and `${...}` fragments

use super::{Expression, ExpressionParser};
use crate::error::{CompilerError, Location, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Expr {
        expression: Expression,
        location: Location,
    },
}

/// A sequence of fragments in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interpolation {
    fragments: Vec<Fragment>,
}

impl Interpolation {
    /// Split `text`, which starts at `start` in the template.
    pub fn parse(text: &str, start: Location) -> Result<Self> {
        let chars: Vec<char> = text.chars().collect();
        let mut fragments = Vec::new();
        let mut literal = String::new();
        let mut location = start;
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            if ch == '\\' && chars.get(i + 1) == Some(&'$') && chars.get(i + 2) == Some(&'{') {
                literal.push_str("${");
                location = location.advance_columns(3);
                i += 3;
                continue;
            }
            if ch == '$' && chars.get(i + 1) == Some(&'{') {
                let body_start = i + 2;
                let body_location = location.advance_columns(2);
                let end = find_expression_end(&chars, body_start)
                    .ok_or_else(|| CompilerError::expression(location, "Unterminated expression, missing '}'"))?;
                let body: String = chars[body_start..end].iter().collect();
                let expression = ExpressionParser::parse_str(&body, body_location)?;

                if !literal.is_empty() {
                    fragments.push(Fragment::Text(std::mem::take(&mut literal)));
                }
                fragments.push(Fragment::Expr { expression, location });
                location = body_location.advance_over(&body).advance_columns(1);
                i = end + 1;
                continue;
            }
            literal.push(ch);
            location = location.advance_over(ch.encode_utf8(&mut [0; 4]));
            i += 1;
        }

        if !literal.is_empty() {
            fragments.push(Fragment::Text(literal));
        }
        Ok(Self { fragments })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    pub fn has_expressions(&self) -> bool {
        self.fragments.iter().any(|f| matches!(f, Fragment::Expr { .. }))
    }

    /// The single expression when the whole value is exactly one `${...}`.
    pub fn single_expression(&self) -> Option<&Expression> {
        match self.fragments.as_slice() {
            [Fragment::Expr { expression, .. }] => Some(expression),
            _ => None,
        }
    }

    /// Literal text when the value holds no expressions at all.
    pub fn constant_text(&self) -> Option<String> {
        if self.has_expressions() {
            return None;
        }
        Some(
            self.fragments
                .iter()
                .filter_map(|f| match f {
                    Fragment::Text(text) => Some(text.as_str()),
                    Fragment::Expr { .. } => None,
                })
                .collect(),
        )
    }
}

// Index of the closing brace, skipping braces inside string literals.
fn find_expression_end(chars: &[char], from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut i = from;
    while i < chars.len() {
        let ch = chars[i];
        match quote {
            Some(q) => {
                if ch == '\\' {
                    i += 1;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '}' => return Some(i),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontend::expression::ExpressionNode;

    #[test]
    fn test_mixed_text_and_expressions() {
        let interp = Interpolation::parse("Hello ${name}!", Location::new(1, 1)).unwrap();
        let fragments = interp.fragments();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], Fragment::Text("Hello ".into()));
        match &fragments[1] {
            Fragment::Expr { expression, location } => {
                assert_eq!(expression.root(), &ExpressionNode::identifier("name"));
                assert_eq!(*location, Location::new(1, 7));
            }
            other => panic!("Expected expression, got {:?}", other),
        }
        assert_eq!(fragments[2], Fragment::Text("!".into()));
    }

    #[test]
    fn test_brace_inside_string_literal() {
        let interp = Interpolation::parse("${'a}b' @ context='text'}", Location::new(1, 1)).unwrap();
        let expr = interp.single_expression().unwrap();
        assert_eq!(expr.root(), &ExpressionNode::string("a}b"));
    }

    #[test]
    fn test_escaped_expression_is_literal() {
        let interp = Interpolation::parse(r"cost: \${price}", Location::new(1, 1)).unwrap();
        assert_eq!(interp.constant_text().as_deref(), Some("cost: ${price}"));
    }

    #[test]
    fn test_location_after_newline() {
        let interp = Interpolation::parse("a\n  ${b}", Location::new(3, 5)).unwrap();
        match &interp.fragments()[1] {
            Fragment::Expr { location, .. } => assert_eq!(*location, Location::new(4, 3)),
            other => panic!("Expected expression, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_expression() {
        let err = Interpolation::parse("x ${foo", Location::new(1, 1)).unwrap_err();
        assert_eq!(err.location(), Some(Location::new(1, 3)));
    }
}
