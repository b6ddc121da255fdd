//! Error and diagnostic types for the Sly compiler

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A position in the template source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Location of `offset` characters into `self`, for text that did not contain a newline.
    pub fn advance_columns(self, offset: usize) -> Self {
        Self {
            line: self.line,
            column: self.column + offset,
        }
    }

    /// Location reached after walking over `text` starting at `self`.
    pub fn advance_over(self, text: &str) -> Self {
        let mut location = self;
        for ch in text.chars() {
            if ch == '\n' {
                location.line += 1;
                location.column = 1;
            } else {
                location.column += 1;
            }
        }
        location
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}, column {column}: {message} (near \"{excerpt}\")")]
    Parse {
        line: usize,
        column: usize,
        excerpt: String,
        message: String,
    },

    #[error("Expression error at line {line}, column {column}: {message}")]
    Expression {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Variable scope underflow: no declaration left to pop")]
    ScopeUnderflow,

    #[error("Runtime error in '{function}': {message}")]
    Runtime { function: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(location: Location, excerpt: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            line: location.line,
            column: location.column,
            excerpt: excerpt.into(),
            message: message.into(),
        }
    }

    pub fn expression(location: Location, message: impl Into<String>) -> Self {
        Self::Expression {
            line: location.line,
            column: location.column,
            message: message.into(),
        }
    }

    pub fn runtime(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Source location carried by the error, if any.
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::Parse { line, column, .. } | Self::Expression { line, column, .. } => {
                Some(Location::new(*line, *column))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A non-fatal problem found while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity,
            location,
            message: message.into(),
        }
    }
}

// `line:column: severity: message`, stable for editor integrations
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Ordered collection of diagnostics reported by one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => log::error!("{}", diagnostic),
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Info => log::info!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Error, location, message));
    }

    pub fn warning(&mut self, location: Location, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Warning, location, message));
    }

    pub fn info(&mut self, location: Location, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Info, location, message));
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_is_tool_friendly() {
        let diagnostic = Diagnostic::new(Severity::Warning, Location::new(3, 7), "shadowed");
        assert_eq!(diagnostic.to_string(), "3:7: warning: shadowed");
    }

    #[test]
    fn test_has_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning(Location::new(1, 1), "just a warning");
        assert!(!diagnostics.has_errors());
        diagnostics.error(Location::new(2, 1), "an error");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_location_advance_over_newlines() {
        let start = Location::new(1, 5);
        assert_eq!(start.advance_over("ab\ncd"), Location::new(2, 3));
        assert_eq!(start.advance_columns(2), Location::new(1, 7));
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = CompilerError::parse(Location::new(4, 2), "<div", "unterminated tag");
        assert_eq!(err.location(), Some(Location::new(4, 2)));
        assert!(err.to_string().contains("unterminated tag"));
    }
}
