//! Commands emitted by the tree walk

use crate::compiler::frontend::expression::ExpressionNode;
use crate::error::{Diagnostics, Location, Result};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    VariableBindingStart {
        variable: String,
        expression: ExpressionNode,
        location: Location,
    },
    VariableBindingEnd,
    #[serde(rename_all = "camelCase")]
    GlobalBinding {
        variable: String,
        expression: ExpressionNode,
        location: Location,
    },
    #[serde(rename_all = "camelCase")]
    ConditionalStart { variable: String, expected: bool },
    ConditionalEnd,
    #[serde(rename_all = "camelCase")]
    LoopStart {
        list_variable: String,
        item_variable: String,
        index_variable: String,
        location: Location,
    },
    LoopEnd,
    OutText { text: String },
    OutVariable { variable: String },
    #[serde(rename_all = "camelCase")]
    ProcedureStart {
        name: String,
        parameters: Vec<String>,
        location: Location,
    },
    ProcedureEnd,
    #[serde(rename_all = "camelCase")]
    ProcedureCall {
        template_variable: String,
        arguments_variable: String,
    },
}

impl Command {
    /// Name and location of every variable this command declares.
    pub fn declared_variables(&self) -> Vec<(&str, Location)> {
        match self {
            Command::VariableBindingStart { variable, location, .. }
            | Command::GlobalBinding { variable, location, .. } => vec![(variable.as_str(), *location)],
            Command::LoopStart {
                item_variable,
                index_variable,
                location,
                ..
            } => vec![
                (item_variable.as_str(), *location),
                (index_variable.as_str(), *location),
            ],
            Command::ProcedureStart {
                parameters, location, ..
            } => parameters.iter().map(|p| (p.as_str(), *location)).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::VariableBindingStart { variable, expression, .. } => {
                write!(f, "let {} = {}", variable, expression)
            }
            Command::VariableBindingEnd => write!(f, "end let"),
            Command::GlobalBinding { variable, expression, .. } => {
                write!(f, "global {} = {}", variable, expression)
            }
            Command::ConditionalStart { variable, expected } => {
                write!(f, "if {}{}", if *expected { "" } else { "!" }, variable)
            }
            Command::ConditionalEnd => write!(f, "end if"),
            Command::LoopStart {
                list_variable,
                item_variable,
                index_variable,
                ..
            } => write!(
                f,
                "for {}, {} in {}",
                item_variable, index_variable, list_variable
            ),
            Command::LoopEnd => write!(f, "end for"),
            Command::OutText { text } => write!(f, "out {:?}", text),
            Command::OutVariable { variable } => write!(f, "out {}", variable),
            Command::ProcedureStart { name, parameters, .. } => {
                write!(f, "procedure {}({})", name, parameters.join(", "))
            }
            Command::ProcedureEnd => write!(f, "end procedure"),
            Command::ProcedureCall {
                template_variable,
                arguments_variable,
            } => write!(f, "call {}({})", template_variable, arguments_variable),
        }
    }
}

/// Per-variant callbacks over a command stream. Unhandled variants fall
/// through to no-ops.
pub trait CommandVisitor {
    fn visit_variable_binding_start(
        &mut self,
        _variable: &str,
        _expression: &ExpressionNode,
        _location: Location,
    ) -> Result<()> {
        Ok(())
    }

    fn visit_variable_binding_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn visit_global_binding(
        &mut self,
        _variable: &str,
        _expression: &ExpressionNode,
        _location: Location,
    ) -> Result<()> {
        Ok(())
    }

    fn visit_conditional_start(&mut self, _variable: &str, _expected: bool) -> Result<()> {
        Ok(())
    }

    fn visit_conditional_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn visit_loop_start(
        &mut self,
        _list_variable: &str,
        _item_variable: &str,
        _index_variable: &str,
        _location: Location,
    ) -> Result<()> {
        Ok(())
    }

    fn visit_loop_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn visit_out_text(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn visit_out_variable(&mut self, _variable: &str) -> Result<()> {
        Ok(())
    }

    fn visit_procedure_start(&mut self, _name: &str, _parameters: &[String], _location: Location) -> Result<()> {
        Ok(())
    }

    fn visit_procedure_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn visit_procedure_call(&mut self, _template_variable: &str, _arguments_variable: &str) -> Result<()> {
        Ok(())
    }

    fn visit_command(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::VariableBindingStart {
                variable,
                expression,
                location,
            } => self.visit_variable_binding_start(variable, expression, *location),
            Command::VariableBindingEnd => self.visit_variable_binding_end(),
            Command::GlobalBinding {
                variable,
                expression,
                location,
            } => self.visit_global_binding(variable, expression, *location),
            Command::ConditionalStart { variable, expected } => {
                self.visit_conditional_start(variable, *expected)
            }
            Command::ConditionalEnd => self.visit_conditional_end(),
            Command::LoopStart {
                list_variable,
                item_variable,
                index_variable,
                location,
            } => self.visit_loop_start(list_variable, item_variable, index_variable, *location),
            Command::LoopEnd => self.visit_loop_end(),
            Command::OutText { text } => self.visit_out_text(text),
            Command::OutVariable { variable } => self.visit_out_variable(variable),
            Command::ProcedureStart {
                name,
                parameters,
                location,
            } => self.visit_procedure_start(name, parameters, *location),
            Command::ProcedureEnd => self.visit_procedure_end(),
            Command::ProcedureCall {
                template_variable,
                arguments_variable,
            } => self.visit_procedure_call(template_variable, arguments_variable),
        }
    }
}

/// An observer attached to a [`CommandStream`], called once per command
/// before the stream reaches its backend.
pub trait CommandHandler {
    fn on_command(&mut self, command: &Command, diagnostics: &mut Diagnostics) -> Result<()>;

    /// Called after the last command.
    fn on_done(&mut self, _diagnostics: &mut Diagnostics) -> Result<()> {
        Ok(())
    }
}

impl<F> CommandHandler for F
where
    F: FnMut(&Command, &mut Diagnostics) -> Result<()>,
{
    fn on_command(&mut self, command: &Command, diagnostics: &mut Diagnostics) -> Result<()> {
        self(command, diagnostics)
    }
}

/// Ordered commands of one compiled document plus the handlers that observe
/// them. A stream is consumed exactly once.
#[derive(Default)]
pub struct CommandStream {
    commands: Vec<Command>,
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl CommandStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command. Consecutive text output is merged into one command.
    pub fn write(&mut self, command: Command) {
        if let Command::OutText { text } = &command {
            if text.is_empty() {
                return;
            }
            if let Some(Command::OutText { text: previous }) = self.commands.last_mut() {
                previous.push_str(text);
                return;
            }
        }
        log::trace!("emit {}", command);
        self.commands.push(command);
    }

    pub fn add_handler(&mut self, handler: Box<dyn CommandHandler>) {
        self.handlers.push(handler);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Walk the stream once: each command goes to every handler, then to `visitor`.
    pub fn drain(mut self, visitor: &mut dyn CommandVisitor, diagnostics: &mut Diagnostics) -> Result<()> {
        for command in &self.commands {
            for handler in self.handlers.iter_mut() {
                handler.on_command(command, diagnostics)?;
            }
            visitor.visit_command(command)?;
        }
        for handler in self.handlers.iter_mut() {
            handler.on_done(diagnostics)?;
        }
        Ok(())
    }

    /// Run the handlers and hand back the plain command list.
    pub fn into_commands(self, diagnostics: &mut Diagnostics) -> Result<Vec<Command>> {
        struct Ignore;
        impl CommandVisitor for Ignore {}

        let commands = self.commands.clone();
        self.drain(&mut Ignore, diagnostics)?;
        Ok(commands)
    }
}

impl std::fmt::Debug for CommandStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandStream")
            .field("commands", &self.commands)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn text(s: &str) -> Command {
        Command::OutText { text: s.to_string() }
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let mut stream = CommandStream::new();
        stream.write(text("<p>"));
        stream.write(text("hi"));
        stream.write(Command::OutVariable { variable: "v".into() });
        stream.write(text(""));
        stream.write(text("</p>"));
        assert_eq!(
            stream.commands(),
            &[text("<p>hi"), Command::OutVariable { variable: "v".into() }, text("</p>")]
        );
    }

    #[test]
    fn test_handlers_see_every_command_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut stream = CommandStream::new();
        let log = Rc::clone(&seen);
        stream.add_handler(Box::new(move |command: &Command, _: &mut Diagnostics| {
            log.borrow_mut().push(command.to_string());
            Ok(())
        }));
        stream.write(Command::ConditionalStart { variable: "c".into(), expected: true });
        stream.write(text("x"));
        stream.write(Command::ConditionalEnd);

        let mut diagnostics = Diagnostics::new();
        let commands = stream.into_commands(&mut diagnostics).unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(*seen.borrow(), vec!["if c", "out \"x\"", "end if"]);
    }

    #[test]
    fn test_visitor_dispatch() {
        #[derive(Default)]
        struct Counter {
            loops: usize,
            outputs: usize,
        }
        impl CommandVisitor for Counter {
            fn visit_loop_start(&mut self, _: &str, _: &str, _: &str, _: Location) -> Result<()> {
                self.loops += 1;
                Ok(())
            }
            fn visit_out_variable(&mut self, _: &str) -> Result<()> {
                self.outputs += 1;
                Ok(())
            }
        }

        let mut stream = CommandStream::new();
        stream.write(Command::LoopStart {
            list_variable: "l".into(),
            item_variable: "item".into(),
            index_variable: "i".into(),
            location: Location::new(1, 1),
        });
        stream.write(Command::OutVariable { variable: "item".into() });
        stream.write(Command::LoopEnd);

        let mut counter = Counter::default();
        let mut diagnostics = Diagnostics::new();
        stream.drain(&mut counter, &mut diagnostics).unwrap();
        assert_eq!((counter.loops, counter.outputs), (1, 1));
        assert!(diagnostics.iter().all(|d| d.severity != Severity::Error));
    }

    #[test]
    fn test_declared_variables() {
        let command = Command::ProcedureStart {
            name: "card".into(),
            parameters: vec!["title".into(), "link".into()],
            location: Location::new(2, 3),
        };
        assert_eq!(
            command.declared_variables(),
            vec![("title", Location::new(2, 3)), ("link", Location::new(2, 3))]
        );
        assert!(Command::LoopEnd.declared_variables().is_empty());
    }
}
