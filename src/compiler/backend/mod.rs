//! Backends consuming the command stream
//!
//! A [`Backend`] takes ownership of a [`CommandStream`]. Wrapping backends
//! attach handlers to the stream and delegate to the backend they decorate,
//! so validation happens in the same single pass that feeds the terminal
//! backend.

pub mod command;
pub mod handler;

pub use command::{Command, CommandHandler, CommandStream, CommandVisitor};
pub use handler::{BalanceCheck, GlobalShadowCheck};

use crate::error::{Diagnostics, Result};
use crate::ShadowPolicy;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

pub trait Backend {
    fn handle(&mut self, stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn handle(&mut self, stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()> {
        (**self).handle(stream, diagnostics)
    }
}

/// Decorates a backend with a handler created fresh for every stream.
pub struct HandlerBackend<B, F> {
    inner: B,
    factory: F,
}

impl<B, F> HandlerBackend<B, F>
where
    B: Backend,
    F: FnMut() -> Box<dyn CommandHandler>,
{
    pub fn new(inner: B, factory: F) -> Self {
        Self { inner, factory }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B, F> Backend for HandlerBackend<B, F>
where
    B: Backend,
    F: FnMut() -> Box<dyn CommandHandler>,
{
    fn handle(&mut self, mut stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()> {
        stream.add_handler((self.factory)());
        self.inner.handle(stream, diagnostics)
    }
}

/// Reports declarations that hide one of `globals`, then delegates the
/// unchanged stream.
pub struct GlobalShadowCheckBackend<B> {
    inner: B,
    globals: Arc<HashSet<String>>,
    policy: ShadowPolicy,
}

impl<B: Backend> GlobalShadowCheckBackend<B> {
    pub fn new<I, S>(inner: B, globals: I, policy: ShadowPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let globals = globals.into_iter().map(|g| g.as_ref().to_lowercase()).collect();
        Self::with_shared_globals(inner, Arc::new(globals), policy)
    }

    /// `globals` must already be lower-cased.
    pub fn with_shared_globals(inner: B, globals: Arc<HashSet<String>>, policy: ShadowPolicy) -> Self {
        Self { inner, globals, policy }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Backend> Backend for GlobalShadowCheckBackend<B> {
    fn handle(&mut self, mut stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()> {
        if self.policy != ShadowPolicy::Ignore {
            stream.add_handler(Box::new(GlobalShadowCheck::new(
                Arc::clone(&self.globals),
                self.policy,
            )));
        }
        self.inner.handle(stream, diagnostics)
    }
}

/// Keeps every command it receives.
#[derive(Debug, Default)]
pub struct CommandCollector {
    commands: Vec<Command>,
}

impl CommandCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

impl Backend for CommandCollector {
    fn handle(&mut self, stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()> {
        self.commands.extend(stream.into_commands(diagnostics)?);
        Ok(())
    }
}

/// Writes the stream as a JSON array.
pub struct JsonBackend<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonBackend<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        Self { writer, pretty }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Backend for JsonBackend<W> {
    fn handle(&mut self, stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()> {
        let commands = stream.into_commands(diagnostics)?;
        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &commands)
        } else {
            serde_json::to_writer(&mut self.writer, &commands)
        };
        written.map_err(std::io::Error::from)?;
        writeln!(self.writer)?;
        Ok(())
    }
}

/// Writes one command per line, indented by block depth.
pub struct TextBackend<W: Write> {
    writer: W,
}

impl<W: Write> TextBackend<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Backend for TextBackend<W> {
    fn handle(&mut self, stream: CommandStream, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut printer = TextPrinter {
            writer: &mut self.writer,
            depth: 0,
        };
        stream.drain(&mut printer, diagnostics)
    }
}

struct TextPrinter<'w, W: Write> {
    writer: &'w mut W,
    depth: usize,
}

impl<W: Write> CommandVisitor for TextPrinter<'_, W> {
    fn visit_command(&mut self, command: &Command) -> Result<()> {
        let closes = matches!(
            command,
            Command::VariableBindingEnd | Command::ConditionalEnd | Command::LoopEnd | Command::ProcedureEnd
        );
        let opens = matches!(
            command,
            Command::VariableBindingStart { .. }
                | Command::ConditionalStart { .. }
                | Command::LoopStart { .. }
                | Command::ProcedureStart { .. }
        );
        if closes {
            self.depth = self.depth.saturating_sub(1);
        }
        writeln!(self.writer, "{}{}", "  ".repeat(self.depth), command)?;
        if opens {
            self.depth += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontend::expression::ExpressionNode;
    use crate::error::{Location, Severity};

    fn sample_stream() -> CommandStream {
        let mut stream = CommandStream::new();
        stream.write(Command::VariableBindingStart {
            variable: "Resource".into(),
            expression: ExpressionNode::identifier("page"),
            location: Location::new(2, 5),
        });
        stream.write(Command::OutVariable { variable: "Resource".into() });
        stream.write(Command::VariableBindingEnd);
        stream
    }

    #[test]
    fn test_shadow_check_wraps_and_delegates_unchanged() {
        let mut collector = CommandCollector::new();
        let expected = sample_stream().commands().to_vec();
        let mut diagnostics = Diagnostics::new();
        {
            let mut backend =
                GlobalShadowCheckBackend::new(&mut collector, ["resource", "request"], ShadowPolicy::Warn);
            backend.handle(sample_stream(), &mut diagnostics).unwrap();
        }
        assert_eq!(collector.commands(), expected.as_slice());
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.location, Location::new(2, 5));
    }

    #[test]
    fn test_non_global_names_pass_silently() {
        let mut stream = CommandStream::new();
        stream.write(Command::VariableBindingStart {
            variable: "myVar".into(),
            expression: ExpressionNode::NullLiteral,
            location: Location::new(1, 1),
        });
        stream.write(Command::VariableBindingEnd);
        let mut diagnostics = Diagnostics::new();
        GlobalShadowCheckBackend::new(CommandCollector::new(), ["resource"], ShadowPolicy::Error)
            .handle(stream, &mut diagnostics)
            .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_handler_backend_composition() {
        let mut diagnostics = Diagnostics::new();
        let mut stream = CommandStream::new();
        stream.write(Command::LoopEnd);
        let mut backend = HandlerBackend::new(CommandCollector::new(), || {
            Box::new(BalanceCheck::new()) as Box<dyn CommandHandler>
        });
        backend.handle(stream, &mut diagnostics).unwrap();
        assert!(diagnostics.has_errors());
        assert_eq!(backend.into_inner().commands().len(), 1);
    }

    #[test]
    fn test_text_backend_indents_blocks() {
        let mut backend = TextBackend::new(Vec::new());
        let mut diagnostics = Diagnostics::new();
        backend.handle(sample_stream(), &mut diagnostics).unwrap();
        let output = String::from_utf8(backend.into_inner()).unwrap();
        assert_eq!(output, "let Resource = page\n  out Resource\nend let\n");
    }

    #[test]
    fn test_json_backend() {
        let mut backend = JsonBackend::new(Vec::new(), false);
        let mut diagnostics = Diagnostics::new();
        backend.handle(sample_stream(), &mut diagnostics).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&backend.into_inner()).unwrap();
        assert_eq!(value[0]["command"], "variableBindingStart");
        assert_eq!(value[0]["variable"], "Resource");
        assert_eq!(value[1]["command"], "outVariable");
        assert_eq!(value[2]["command"], "variableBindingEnd");
    }
}
