//! Sly Template Compiler
//!
//! Compiles HTML templates annotated with `data-sly-*` directives and
//! `${ ... }` expressions into a flat stream of commands that a backend
//! turns into executable form.
//!
//! # Basic Usage
//!
//! ```rust
//! use slyc::{Compiler, Result};
//!
//! fn main() -> Result<()> {
//!     let result = Compiler::default().compile_str("<p data-sly-test=\"${show}\">${title}</p>")?;
//!     for command in &result.commands {
//!         println!("{}", command);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Frontend**: the streaming markup parser builds the node tree from
//!    fixed-size chunks; expressions are parsed where they appear.
//! 2. **Middle-end**: the walker runs directive plugins in priority order,
//!    pushes every expression through the filter pipeline and writes
//!    commands while tracking variable scopes.
//! 3. **Backend**: validation handlers (balance, global shadowing) observe
//!    the stream on its way to the terminal backend.

pub mod cli;
pub mod compiler;
pub mod core;
pub mod error;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use compiler::backend::{
    Backend, Command, CommandCollector, CommandStream, GlobalShadowCheckBackend, JsonBackend, TextBackend,
};
pub use compiler::frontend::{Template, TemplateNode, TemplateParser};
pub use compiler::middle_end::{ElementContext, Filter, FilterPipeline, Plugin, PluginInvoke, VariableTracker};
pub use compiler::{CompilationResult, Compiler};
pub use error::{CompilerError, Diagnostic, Diagnostics, Location, Result, Severity};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// What to do when a template declares a variable named like a global binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowPolicy {
    Ignore,
    #[default]
    Warn,
    Error,
}

/// Compilation options and settings
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Chunk size of the streaming parser in bytes
    pub buffer_size: usize,

    /// Names the runtime binds for every template; compared case-insensitively
    pub globals: Vec<String>,

    /// Reaction to local declarations hiding a global
    pub shadow_policy: ShadowPolicy,

    /// Warn about identifiers that are neither declared nor global
    pub strict_identifiers: bool,

    /// Option names of built-in filters to leave out of the pipeline
    pub disabled_filters: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            buffer_size: crate::core::DEFAULT_BUFFER_SIZE,
            globals: crate::core::DEFAULT_GLOBALS.iter().map(|g| g.to_string()).collect(),
            shadow_policy: ShadowPolicy::default(),
            strict_identifiers: false,
            disabled_filters: Vec::new(),
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Source size in bytes
    pub source_size: u64,

    /// Number of elements in the node tree
    pub element_count: usize,

    /// Number of expressions pushed through the filter pipeline
    pub expression_count: usize,

    /// Number of commands handed to the backend
    pub command_count: usize,

    pub diagnostic_count: usize,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Compile a template file into its command list
pub fn compile_file<P: AsRef<Path>>(path: P, options: CompilerOptions) -> Result<CompilationResult> {
    Compiler::new(options)?.compile_file(path)
}

/// Compile template source with default options
pub fn compile_source(source: &str) -> Result<CompilationResult> {
    Compiler::default().compile_str(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompilerOptions::default();
        assert_eq!(options.buffer_size, 8192);
        assert_eq!(options.shadow_policy, ShadowPolicy::Warn);
        assert!(options.globals.iter().any(|g| g == "pageProperties"));
        assert_eq!(options.globals.len(), 20);
    }

    #[test]
    fn test_compile_source() {
        let result = compile_source("<p>${title}</p>").unwrap();
        let lines: Vec<String> = result.commands.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                r#"out "<p>""#,
                "let var_0 = xss(title, 'text')",
                "out var_0",
                "end let",
                r#"out "</p>""#,
            ]
        );
    }

    #[test]
    fn test_shadow_policy_names() {
        let policy: ShadowPolicy = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(policy, ShadowPolicy::Error);
        assert!(serde_json::from_str::<ShadowPolicy>("\"loud\"").is_err());
    }
}
