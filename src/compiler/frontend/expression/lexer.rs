//! Lexical analysis for `${ ... }` expression bodies

use crate::error::{CompilerError, Location, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprTokenType {
    // Literals
    String(String),
    Number(f64),
    Identifier(String),
    True,
    False,
    Null,

    // Operators and punctuation
    Dot,          // .
    LeftBracket,  // [
    RightBracket, // ]
    LeftParen,    // (
    RightParen,   // )
    Comma,        // ,
    Not,          // !
    And,          // &&
    Or,           // ||
    Equal,        // ==
    NotEqual,     // !=
    Lt,           // <
    Leq,          // <=
    Gt,           // >
    Geq,          // >=
    In,           // in
    Question,     // ?
    Colon,        // :
    At,           // @
    Assign,       // =

    Eof,
}

impl fmt::Display for ExprTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprTokenType::String(s) => write!(f, "string('{}')", s),
            ExprTokenType::Number(n) => write!(f, "number({})", n),
            ExprTokenType::Identifier(id) => write!(f, "identifier({})", id),
            ExprTokenType::True => write!(f, "true"),
            ExprTokenType::False => write!(f, "false"),
            ExprTokenType::Null => write!(f, "null"),
            ExprTokenType::Dot => write!(f, "."),
            ExprTokenType::LeftBracket => write!(f, "["),
            ExprTokenType::RightBracket => write!(f, "]"),
            ExprTokenType::LeftParen => write!(f, "("),
            ExprTokenType::RightParen => write!(f, ")"),
            ExprTokenType::Comma => write!(f, ","),
            ExprTokenType::Not => write!(f, "!"),
            ExprTokenType::And => write!(f, "&&"),
            ExprTokenType::Or => write!(f, "||"),
            ExprTokenType::Equal => write!(f, "=="),
            ExprTokenType::NotEqual => write!(f, "!="),
            ExprTokenType::Lt => write!(f, "<"),
            ExprTokenType::Leq => write!(f, "<="),
            ExprTokenType::Gt => write!(f, ">"),
            ExprTokenType::Geq => write!(f, ">="),
            ExprTokenType::In => write!(f, "in"),
            ExprTokenType::Question => write!(f, "?"),
            ExprTokenType::Colon => write!(f, ":"),
            ExprTokenType::At => write!(f, "@"),
            ExprTokenType::Assign => write!(f, "="),
            ExprTokenType::Eof => write!(f, "end of expression"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExprToken {
    pub token_type: ExprTokenType,
    pub location: Location,
}

pub struct ExprLexer {
    input: Vec<char>,
    position: usize,
    location: Location,
}

impl ExprLexer {
    /// `start` is where the first character of `input` sits in the template.
    pub fn new(input: &str, start: Location) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            location: start,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<ExprToken>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let location = self.location;
            let Some(ch) = self.advance() else {
                tokens.push(ExprToken {
                    token_type: ExprTokenType::Eof,
                    location,
                });
                return Ok(tokens);
            };

            let token_type = match ch {
                '.' if self.peek().map_or(false, |c| c.is_ascii_digit()) => self.number(ch)?,
                '.' => ExprTokenType::Dot,
                '[' => ExprTokenType::LeftBracket,
                ']' => ExprTokenType::RightBracket,
                '(' => ExprTokenType::LeftParen,
                ')' => ExprTokenType::RightParen,
                ',' => ExprTokenType::Comma,
                '?' => ExprTokenType::Question,
                ':' => ExprTokenType::Colon,
                '@' => ExprTokenType::At,
                '!' => {
                    if self.match_char('=') {
                        ExprTokenType::NotEqual
                    } else {
                        ExprTokenType::Not
                    }
                }
                '=' => {
                    if self.match_char('=') {
                        ExprTokenType::Equal
                    } else {
                        ExprTokenType::Assign
                    }
                }
                '<' => {
                    if self.match_char('=') {
                        ExprTokenType::Leq
                    } else {
                        ExprTokenType::Lt
                    }
                }
                '>' => {
                    if self.match_char('=') {
                        ExprTokenType::Geq
                    } else {
                        ExprTokenType::Gt
                    }
                }
                '&' => {
                    if self.match_char('&') {
                        ExprTokenType::And
                    } else {
                        return Err(CompilerError::expression(location, "Expected '&&'"));
                    }
                }
                '|' => {
                    if self.match_char('|') {
                        ExprTokenType::Or
                    } else {
                        return Err(CompilerError::expression(location, "Expected '||'"));
                    }
                }
                '\'' | '"' => self.string(ch, location)?,
                c if c.is_ascii_digit() => self.number(c)?,
                c if c.is_alphabetic() || c == '_' => self.identifier(c),
                other => {
                    return Err(CompilerError::expression(
                        location,
                        format!("Unexpected character '{}'", other),
                    ))
                }
            };

            tokens.push(ExprToken { token_type, location });
        }
    }

    fn string(&mut self, quote: char, start: Location) -> Result<ExprTokenType> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(CompilerError::expression(start, "Unterminated string literal")),
                Some(c) if c == quote => return Ok(ExprTokenType::String(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('u') => value.push(self.unicode_escape(start)?),
                    Some(other) => value.push(other),
                    None => {
                        return Err(CompilerError::expression(start, "Unterminated string literal"))
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn unicode_escape(&mut self, start: Location) -> Result<char> {
        let mut code = String::new();
        for _ in 0..4 {
            match self.advance() {
                Some(c) if c.is_ascii_hexdigit() => code.push(c),
                _ => return Err(CompilerError::expression(start, "Invalid unicode escape")),
            }
        }
        u32::from_str_radix(&code, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| CompilerError::expression(start, "Invalid unicode escape"))
    }

    fn number(&mut self, first: char) -> Result<ExprTokenType> {
        let start = self.location;
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
                text.push(c);
                self.advance();
            } else if (c == '-' || c == '+') && text.ends_with(['e', 'E']) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map(ExprTokenType::Number)
            .map_err(|_| CompilerError::expression(start, format!("Invalid number '{}'", text)))
    }

    fn identifier(&mut self, first: char) -> ExprTokenType {
        let mut name = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == ':' && self.continues_identifier() {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match name.as_str() {
            "true" => ExprTokenType::True,
            "false" => ExprTokenType::False,
            "null" => ExprTokenType::Null,
            "in" => ExprTokenType::In,
            _ => ExprTokenType::Identifier(name),
        }
    }

    // Namespaced identifiers like `jcr:title`; a bare ':' belongs to a ternary.
    fn continues_identifier(&self) -> bool {
        self.input
            .get(self.position + 1)
            .map_or(false, |c| c.is_alphabetic() || *c == '_')
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.input.get(self.position).copied()?;
        self.position += 1;
        if ch == '\n' {
            self.location.line += 1;
            self.location.column = 1;
        } else {
            self.location.column += 1;
        }
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<ExprTokenType> {
        let mut lexer = ExprLexer::new(input, Location::new(1, 1));
        lexer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            types("a && b || !c == d != e <= f >= g"),
            vec![
                ExprTokenType::Identifier("a".into()),
                ExprTokenType::And,
                ExprTokenType::Identifier("b".into()),
                ExprTokenType::Or,
                ExprTokenType::Not,
                ExprTokenType::Identifier("c".into()),
                ExprTokenType::Equal,
                ExprTokenType::Identifier("d".into()),
                ExprTokenType::NotEqual,
                ExprTokenType::Identifier("e".into()),
                ExprTokenType::Leq,
                ExprTokenType::Identifier("f".into()),
                ExprTokenType::Geq,
                ExprTokenType::Identifier("g".into()),
                ExprTokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            types(r#"'it\'s' "a\nb" 'A'"#),
            vec![
                ExprTokenType::String("it's".into()),
                ExprTokenType::String("a\nb".into()),
                ExprTokenType::String("A".into()),
                ExprTokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_and_keywords() {
        assert_eq!(
            types("42 3.5 true false null in"),
            vec![
                ExprTokenType::Number(42.0),
                ExprTokenType::Number(3.5),
                ExprTokenType::True,
                ExprTokenType::False,
                ExprTokenType::Null,
                ExprTokenType::In,
                ExprTokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_namespaced_identifier_versus_ternary() {
        assert_eq!(types("jcr:title")[0], ExprTokenType::Identifier("jcr:title".into()));
        assert_eq!(
            types("a ? b : c")[3..5],
            [ExprTokenType::Colon, ExprTokenType::Identifier("c".into())]
        );
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let mut lexer = ExprLexer::new("x @ format='abc", Location::new(2, 10));
        let err = lexer.tokenize().unwrap_err();
        assert_eq!(err.location(), Some(Location::new(2, 21)));
    }

    #[test]
    fn test_single_ampersand_is_an_error() {
        let mut lexer = ExprLexer::new("a & b", Location::new(1, 1));
        assert!(lexer.tokenize().is_err());
    }
}
