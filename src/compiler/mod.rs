// FILE: src/compiler/mod.rs

// This file defines the main "compiler" module and orchestrates the pipeline.

pub mod backend;
pub mod frontend;
pub mod middle_end;
pub mod runtime;

use crate::core::util::is_valid_identifier;
use crate::error::{CompilerError, Diagnostics, Result};
use crate::{CompilationStats, CompilerOptions, ShadowPolicy};

use backend::{Backend, BalanceCheck, Command, CommandCollector, CommandHandler, GlobalShadowCheckBackend, HandlerBackend};
use frontend::ast::Template;
use frontend::parser::TemplateParser;
use middle_end::context::CompilerContext;
use middle_end::filter::FilterPipeline;
use middle_end::plugin::PluginRegistry;
use middle_end::walker::TemplateWalker;

use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Commands and diagnostics of one compiled document.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationResult {
    pub commands: Vec<Command>,
    pub diagnostics: Diagnostics,
    pub stats: CompilationStats,
}

impl CompilationResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// A configured compiler. Filters, plugins and globals are fixed at
/// construction; one compiler can compile any number of documents.
pub struct Compiler {
    options: CompilerOptions,
    filters: FilterPipeline,
    plugins: PluginRegistry,
    globals: Arc<HashSet<String>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            filters: FilterPipeline::with_defaults(),
            plugins: PluginRegistry::with_defaults(),
            globals: Arc::new(lowercase_set(&CompilerOptions::default().globals)),
            options: CompilerOptions::default(),
        }
    }
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Result<Self> {
        for name in &options.globals {
            if !is_valid_identifier(name) {
                return Err(CompilerError::configuration(format!(
                    "Global binding name '{}' is not a valid identifier",
                    name
                )));
            }
        }
        let known = FilterPipeline::with_defaults().option_names();
        for name in &options.disabled_filters {
            if !known.contains(&name.as_str()) {
                return Err(CompilerError::configuration(format!(
                    "Cannot disable unknown filter '{}'",
                    name
                )));
            }
        }

        log::debug!("Compiler options: {:?}", options);
        Ok(Self {
            filters: FilterPipeline::without(&options.disabled_filters),
            plugins: PluginRegistry::with_defaults(),
            globals: Arc::new(lowercase_set(&options.globals)),
            options,
        })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn filters_mut(&mut self) -> &mut FilterPipeline {
        &mut self.filters
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn parse<R: Read>(&self, input: R) -> Result<Template> {
        TemplateParser::new(self.options.buffer_size).parse(input)
    }

    pub fn parse_str(&self, source: &str) -> Result<Template> {
        self.parse(source.as_bytes())
    }

    /// Compile `input` and hand the command stream to `backend`, wrapped in
    /// the balance check and, unless disabled, the global shadow check.
    pub fn compile<R: Read>(&self, input: R, backend: &mut dyn Backend) -> Result<Diagnostics> {
        let (diagnostics, _) = self.compile_with_stats(input, backend)?;
        Ok(diagnostics)
    }

    /// Like [`Compiler::compile`], also returning pipeline statistics.
    pub fn compile_with_stats<R: Read>(
        &self,
        input: R,
        backend: &mut dyn Backend,
    ) -> Result<(Diagnostics, CompilationStats)> {
        let start_time = Instant::now();

        // =======================================================
        // THE COMPILER PIPELINE
        // =======================================================

        // STAGE 1: PARSING (Frontend)
        let template = self.parse(input)?;
        let element_count = template.element_count();

        // STAGE 2: WALK (Middle-End)
        // Plugins and filters rewrite expressions while the tree is turned into commands.
        let mut ctx = CompilerContext::new(&self.filters, &self.globals, self.options.strict_identifiers);
        TemplateWalker::new(&self.plugins).walk(template, &mut ctx)?;
        let expression_count = ctx.expression_count();
        let (stream, mut diagnostics) = ctx.finish();
        let command_count = stream.len();

        // STAGE 3: BACKEND
        // Validation wrappers observe the stream on its way to the terminal backend.
        let balanced = HandlerBackend::new(backend, || Box::new(BalanceCheck::new()) as Box<dyn CommandHandler>);
        let mut chain = GlobalShadowCheckBackend::with_shared_globals(
            balanced,
            Arc::clone(&self.globals),
            self.options.shadow_policy,
        );
        chain.handle(stream, &mut diagnostics)?;

        let stats = CompilationStats {
            element_count,
            expression_count,
            command_count,
            diagnostic_count: diagnostics.len(),
            compile_time_ms: start_time.elapsed().as_millis() as u64,
            ..Default::default()
        };
        log::info!(
            "Compiled {} elements into {} commands with {} diagnostics in {}ms",
            stats.element_count,
            stats.command_count,
            stats.diagnostic_count,
            stats.compile_time_ms
        );
        Ok((diagnostics, stats))
    }

    pub fn compile_str(&self, source: &str) -> Result<CompilationResult> {
        let mut collector = CommandCollector::new();
        let (diagnostics, mut stats) = self.compile_with_stats(source.as_bytes(), &mut collector)?;
        stats.source_size = source.len() as u64;
        Ok(CompilationResult {
            commands: collector.into_commands(),
            diagnostics,
            stats,
        })
    }

    pub fn compile_file<P: AsRef<Path>>(&self, path: P) -> Result<CompilationResult> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| CompilerError::FileNotFound {
            path: format!("{}: {}", path.display(), e),
        })?;
        let source_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        log::info!("Compiling '{}'...", path.display());
        let mut collector = CommandCollector::new();
        let (diagnostics, mut stats) = self.compile_with_stats(file, &mut collector)?;
        stats.source_size = source_size;
        Ok(CompilationResult {
            commands: collector.into_commands(),
            diagnostics,
            stats,
        })
    }
}

fn lowercase_set(names: &[String]) -> HashSet<String> {
    names.iter().map(|name| name.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::backend::TextBackend;
    use crate::error::{Location, Severity};
    use std::io::Write;

    fn compile(source: &str) -> CompilationResult {
        Compiler::default().compile_str(source).unwrap()
    }

    #[test]
    fn test_local_shadowing_a_global_is_reported() {
        let result = compile("<div data-sly-list.Resource=\"${children}\">\n${Resource.name}</div>");
        let shadows: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.message.contains("shadows the global binding"))
            .collect();
        assert_eq!(shadows.len(), 1);
        assert_eq!(shadows[0].severity, Severity::Warning);
        assert_eq!(shadows[0].location, Location::new(1, 6));
    }

    #[test]
    fn test_plain_local_names_are_not_reported() {
        let result = compile(r#"<div data-sly-test.myVar="${a}">${myVar}</div>"#);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_shadow_policy_error() {
        let options = CompilerOptions {
            shadow_policy: ShadowPolicy::Error,
            ..Default::default()
        };
        let result = Compiler::new(options)
            .unwrap()
            .compile_str(r#"<sly data-sly-set.request="${1}"/>"#)
            .unwrap();
        assert!(result.has_errors());

        let ignore = CompilerOptions {
            shadow_policy: ShadowPolicy::Ignore,
            ..Default::default()
        };
        let result = Compiler::new(ignore)
            .unwrap()
            .compile_str(r#"<sly data-sly-set.request="${1}"/>"#)
            .unwrap();
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_custom_globals() {
        let options = CompilerOptions {
            globals: vec!["site".to_string()],
            ..Default::default()
        };
        let compiler = Compiler::new(options).unwrap();
        let result = compiler.compile_str(r#"<p data-sly-test.Site="${x}"></p>"#).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        let result = compiler.compile_str(r#"<p data-sly-test.resource="${x}"></p>"#).unwrap();
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let bad_global = CompilerOptions {
            globals: vec!["not valid".to_string()],
            ..Default::default()
        };
        assert!(matches!(Compiler::new(bad_global), Err(CompilerError::Configuration { .. })));

        let bad_filter = CompilerOptions {
            disabled_filters: vec!["nope".to_string()],
            ..Default::default()
        };
        assert!(Compiler::new(bad_filter).is_err());
    }

    #[test]
    fn test_parse_errors_abort() {
        let err = Compiler::default().compile_str("<div><!-- open").unwrap_err();
        assert!(matches!(err, CompilerError::Parse { .. }));
    }

    #[test]
    fn test_compile_into_text_backend() {
        let mut backend = TextBackend::new(Vec::new());
        let diagnostics = Compiler::default()
            .compile(r#"<b data-sly-test="${on}">x</b>"#.as_bytes(), &mut backend)
            .unwrap();
        assert!(diagnostics.is_empty());
        let text = String::from_utf8(backend.into_inner()).unwrap();
        assert_eq!(text, "let var_0 = on\n  if var_0\n    out \"<b>x</b>\"\n  end if\nend let\n");
    }

    #[test]
    fn test_output_is_independent_of_buffer_size() {
        let source = "<ul data-sly-list=\"${items @ join=', '}\"><!-- ${item} --><li>${item.name @ context='html'}</li></ul>";
        let reference = compile(source).commands;
        for buffer_size in [1, 2, 3, 7, 64] {
            let options = CompilerOptions {
                buffer_size,
                ..Default::default()
            };
            let commands = Compiler::new(options).unwrap().compile_str(source).unwrap().commands;
            assert_eq!(commands, reference, "buffer size {}", buffer_size);
        }
    }

    #[test]
    fn test_compile_file_and_stats() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<p>${{a}}</p><br>").unwrap();
        let result = Compiler::default().compile_file(file.path()).unwrap();
        assert_eq!(result.stats.element_count, 2);
        assert_eq!(result.stats.expression_count, 1);
        assert_eq!(result.stats.command_count, result.commands.len());
        assert_eq!(result.stats.source_size, 15);

        let missing = Compiler::default().compile_file("/definitely/not/here.html");
        assert!(matches!(missing, Err(CompilerError::FileNotFound { .. })));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_compiler_is_shareable_across_threads() {
        assert_send_sync::<Compiler>();
        assert_send_sync::<FilterPipeline>();
        assert_send_sync::<PluginRegistry>();
        assert_send_sync::<crate::compiler::runtime::ExtensionHost>();

        let compiler = std::sync::Arc::new(Compiler::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let compiler = std::sync::Arc::clone(&compiler);
                std::thread::spawn(move || {
                    compiler
                        .compile_str(&format!("<p data-sly-test=\"${{on{}}}\">x</p>", i))
                        .unwrap()
                        .commands
                        .len()
                })
            })
            .collect();
        let counts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(counts.iter().all(|&c| c == counts[0]));
    }
}
