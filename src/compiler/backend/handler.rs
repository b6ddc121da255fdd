//! Stream handlers that validate commands as they pass

use super::command::{Command, CommandHandler};
use crate::error::{Diagnostics, Location, Result};
use crate::ShadowPolicy;
use std::collections::HashSet;
use std::sync::Arc;

/// Reports declarations whose name hides a global binding.
pub struct GlobalShadowCheck {
    globals: Arc<HashSet<String>>,
    policy: ShadowPolicy,
}

impl GlobalShadowCheck {
    /// `globals` must hold lower-cased names.
    pub fn new(globals: Arc<HashSet<String>>, policy: ShadowPolicy) -> Self {
        Self { globals, policy }
    }
}

impl CommandHandler for GlobalShadowCheck {
    fn on_command(&mut self, command: &Command, diagnostics: &mut Diagnostics) -> Result<()> {
        for (name, location) in command.declared_variables() {
            if !self.globals.contains(&name.to_lowercase()) {
                continue;
            }
            let message = format!("Variable '{}' shadows the global binding of the same name", name);
            match self.policy {
                ShadowPolicy::Ignore => {}
                ShadowPolicy::Warn => diagnostics.warning(location, message),
                ShadowPolicy::Error => diagnostics.error(location, message),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Binding,
    Conditional,
    Loop,
    Procedure,
}

impl Block {
    fn describe(self) -> &'static str {
        match self {
            Block::Binding => "variable binding",
            Block::Conditional => "conditional",
            Block::Loop => "loop",
            Block::Procedure => "procedure",
        }
    }
}

/// Checks that every start command is closed by its matching end command.
#[derive(Debug, Default)]
pub struct BalanceCheck {
    open: Vec<(Block, Location)>,
    last_location: Location,
}

impl BalanceCheck {
    pub fn new() -> Self {
        Self::default()
    }

    fn close(&mut self, block: Block, diagnostics: &mut Diagnostics) {
        match self.open.pop() {
            Some((open, _)) if open == block => {}
            Some((open, location)) => diagnostics.error(
                location,
                format!(
                    "Command stream closes a {} while a {} is open",
                    block.describe(),
                    open.describe()
                ),
            ),
            None => diagnostics.error(
                self.last_location,
                format!("Command stream closes a {} that was never opened", block.describe()),
            ),
        }
    }
}

impl CommandHandler for BalanceCheck {
    fn on_command(&mut self, command: &Command, diagnostics: &mut Diagnostics) -> Result<()> {
        match command {
            Command::VariableBindingStart { location, .. } => {
                self.last_location = *location;
                self.open.push((Block::Binding, *location));
            }
            Command::ConditionalStart { .. } => self.open.push((Block::Conditional, self.last_location)),
            Command::LoopStart { location, .. } => {
                self.last_location = *location;
                self.open.push((Block::Loop, *location));
            }
            Command::ProcedureStart { location, .. } => {
                self.last_location = *location;
                self.open.push((Block::Procedure, *location));
            }
            Command::VariableBindingEnd => self.close(Block::Binding, diagnostics),
            Command::ConditionalEnd => self.close(Block::Conditional, diagnostics),
            Command::LoopEnd => self.close(Block::Loop, diagnostics),
            Command::ProcedureEnd => self.close(Block::Procedure, diagnostics),
            Command::GlobalBinding { location, .. } => self.last_location = *location,
            Command::OutText { .. } | Command::OutVariable { .. } | Command::ProcedureCall { .. } => {}
        }
        Ok(())
    }

    fn on_done(&mut self, diagnostics: &mut Diagnostics) -> Result<()> {
        while let Some((block, location)) = self.open.pop() {
            diagnostics.error(location, format!("Unclosed {} in command stream", block.describe()));
        }
        Ok(())
    }
}
