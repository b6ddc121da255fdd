//! Per-compilation state shared by the tree walk and the plugins

use crate::compiler::backend::{Command, CommandStream};
use crate::compiler::frontend::expression::{Expression, ExpressionNode};
use crate::compiler::middle_end::filter::xss::CONTEXT_OPTION;
use crate::compiler::middle_end::filter::FilterPipeline;
use crate::compiler::middle_end::variable_tracker::VariableTracker;
use crate::core::SYMBOL_PREFIX;
use crate::error::{Diagnostics, Location, Result};
use std::collections::{HashMap, HashSet};

/// Where in the markup an expression is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupContext {
    Text,
    Attribute,
    Uri,
    Comment,
    ElementName,
}

impl MarkupContext {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkupContext::Text => "text",
            MarkupContext::Attribute => "attribute",
            MarkupContext::Uri => "uri",
            MarkupContext::Comment => "comment",
            MarkupContext::ElementName => "elementName",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// Named by the template author.
    Local,
    /// Compiler-generated symbol.
    Temporary,
    LoopItem,
    LoopIndex,
    Parameter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub location: Location,
}

/// Hands out `var_0`, `var_1`, ... for compiler temporaries.
#[derive(Debug, Default)]
pub struct SymbolGenerator {
    counter: usize,
}

impl SymbolGenerator {
    pub fn next(&mut self) -> String {
        let symbol = format!("{}{}", SYMBOL_PREFIX, self.counter);
        self.counter += 1;
        symbol
    }
}

/// Everything the walk mutates while compiling one document: the command
/// stream, the variable scopes and the diagnostics.
pub struct CompilerContext<'a> {
    stream: CommandStream,
    variables: VariableTracker<Declaration>,
    global_declarations: HashMap<String, Location>,
    procedure_scopes: Vec<usize>,
    symbols: SymbolGenerator,
    filters: &'a FilterPipeline,
    globals: &'a HashSet<String>,
    strict_identifiers: bool,
    diagnostics: Diagnostics,
    expression_count: usize,
    raw_text_depth: usize,
}

impl<'a> CompilerContext<'a> {
    /// `globals` must hold lower-cased names.
    pub fn new(filters: &'a FilterPipeline, globals: &'a HashSet<String>, strict_identifiers: bool) -> Self {
        Self {
            stream: CommandStream::new(),
            variables: VariableTracker::new(),
            global_declarations: HashMap::new(),
            procedure_scopes: Vec::new(),
            symbols: SymbolGenerator::default(),
            filters,
            globals,
            strict_identifiers,
            diagnostics: Diagnostics::new(),
            expression_count: 0,
            raw_text_depth: 0,
        }
    }

    pub fn generate_variable(&mut self) -> String {
        self.symbols.next()
    }

    pub fn diagnostics(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn variables(&self) -> &VariableTracker<Declaration> {
        &self.variables
    }

    pub fn expression_count(&self) -> usize {
        self.expression_count
    }

    /// Add the markup context when the author gave none, then run the filters.
    pub fn transform(
        &mut self,
        expression: &Expression,
        markup: Option<MarkupContext>,
        location: Location,
    ) -> Expression {
        let expression = match markup {
            Some(markup) if !expression.contains_option(CONTEXT_OPTION) => {
                expression.with_option(CONTEXT_OPTION, ExpressionNode::string(markup.as_str()))
            }
            _ => expression.clone(),
        };
        let filtered = self.filters.apply(&expression);
        if !filtered.is_terminal() {
            log::trace!(
                "Options {:?} at {} left for the consuming directive",
                filtered.sorted_option_names(),
                location
            );
        }
        self.check_identifiers(filtered.root(), location);
        self.expression_count += 1;
        filtered
    }

    /// Transform an expression written in element content.
    pub fn transform_text(&mut self, expression: &Expression, location: Location) -> Expression {
        if self.raw_text_depth > 0 && !expression.contains_option(CONTEXT_OPTION) {
            self.diagnostics.warning(
                location,
                "Expression inside <script> or <style> has no explicit context, using 'text'",
            );
        }
        self.transform(expression, Some(MarkupContext::Text), location)
    }

    /// Entering `<script>` or `<style>`.
    pub fn enter_raw_text(&mut self) {
        self.raw_text_depth += 1;
    }

    pub fn leave_raw_text(&mut self) {
        self.raw_text_depth = self.raw_text_depth.saturating_sub(1);
    }

    /// A name is resolvable when it is bound locally, declared globally by
    /// the template, or provided by the runtime.
    pub fn is_resolvable(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.variables.is_in_scope(&lower)
            || self.global_declarations.contains_key(&lower)
            || self.globals.contains(&lower)
    }

    fn check_identifiers(&mut self, root: &ExpressionNode, location: Location) {
        let unresolved: Vec<String> = root
            .identifiers()
            .into_iter()
            .filter(|name| !self.is_resolvable(name))
            .map(str::to_string)
            .collect();
        for name in unresolved {
            if self.strict_identifiers {
                self.diagnostics.warning(
                    location,
                    format!("Identifier '{}' is neither declared nor a global binding", name),
                );
            } else {
                log::debug!("Unresolved identifier '{}' at {}", name, location);
            }
        }
    }

    fn declare(&mut self, name: &str, kind: DeclarationKind, location: Location) {
        self.variables.push_variable(name, Declaration { kind, location });
        if kind != DeclarationKind::Temporary && self.variables.get_occurrence_count(name) > 1 {
            self.diagnostics.info(
                location,
                format!("Variable '{}' hides an outer declaration of the same name", name),
            );
        }
    }

    pub fn bind(&mut self, name: &str, expression: ExpressionNode, location: Location) {
        self.stream.write(Command::VariableBindingStart {
            variable: name.to_string(),
            expression,
            location,
        });
        self.declare(name, DeclarationKind::Local, location);
    }

    /// Bind `expression` to a fresh compiler symbol and return the symbol.
    pub fn bind_temporary(&mut self, expression: ExpressionNode, location: Location) -> String {
        let variable = self.generate_variable();
        self.stream.write(Command::VariableBindingStart {
            variable: variable.clone(),
            expression,
            location,
        });
        self.declare(&variable, DeclarationKind::Temporary, location);
        variable
    }

    pub fn unbind(&mut self) -> Result<()> {
        let name = self.variables.pop_variable()?;
        log::trace!("Leaving scope of '{}'", name);
        self.stream.write(Command::VariableBindingEnd);
        Ok(())
    }

    pub fn bind_global(&mut self, name: &str, expression: ExpressionNode, location: Location) {
        self.stream.write(Command::GlobalBinding {
            variable: name.to_string(),
            expression,
            location,
        });
        self.declare_global(name, location);
    }

    /// Record a document-wide name without emitting a binding.
    pub fn declare_global(&mut self, name: &str, location: Location) {
        if let Some(previous) = self.global_declarations.insert(name.to_lowercase(), location) {
            self.diagnostics.info(
                location,
                format!("'{}' redeclares the global name first declared at {}", name, previous),
            );
        }
    }

    pub fn start_conditional(&mut self, variable: &str, expected: bool) {
        self.stream.write(Command::ConditionalStart {
            variable: variable.to_string(),
            expected,
        });
    }

    pub fn end_conditional(&mut self) {
        self.stream.write(Command::ConditionalEnd);
    }

    pub fn start_loop(&mut self, list_variable: &str, item_variable: &str, index_variable: &str, location: Location) {
        self.stream.write(Command::LoopStart {
            list_variable: list_variable.to_string(),
            item_variable: item_variable.to_string(),
            index_variable: index_variable.to_string(),
            location,
        });
        self.declare(item_variable, DeclarationKind::LoopItem, location);
        self.declare(index_variable, DeclarationKind::LoopIndex, location);
    }

    pub fn end_loop(&mut self) -> Result<()> {
        self.variables.pop_variable()?;
        self.variables.pop_variable()?;
        self.stream.write(Command::LoopEnd);
        Ok(())
    }

    pub fn start_procedure(&mut self, name: &str, parameters: Vec<String>, location: Location) {
        for parameter in &parameters {
            self.declare(parameter, DeclarationKind::Parameter, location);
        }
        self.procedure_scopes.push(parameters.len());
        self.stream.write(Command::ProcedureStart {
            name: name.to_string(),
            parameters,
            location,
        });
    }

    pub fn end_procedure(&mut self) -> Result<()> {
        let parameters = self
            .procedure_scopes
            .pop()
            .ok_or(crate::error::CompilerError::ScopeUnderflow)?;
        for _ in 0..parameters {
            self.variables.pop_variable()?;
        }
        self.stream.write(Command::ProcedureEnd);
        Ok(())
    }

    pub fn call_procedure(&mut self, template_variable: &str, arguments_variable: &str) {
        self.stream.write(Command::ProcedureCall {
            template_variable: template_variable.to_string(),
            arguments_variable: arguments_variable.to_string(),
        });
    }

    pub fn out_text(&mut self, text: &str) {
        self.stream.write(Command::OutText { text: text.to_string() });
    }

    pub fn out_variable(&mut self, variable: &str) {
        self.stream.write(Command::OutVariable {
            variable: variable.to_string(),
        });
    }

    /// Finish the walk and hand over the stream and the diagnostics.
    pub fn finish(self) -> (CommandStream, Diagnostics) {
        if !self.variables.is_empty() {
            log::warn!(
                "{} variable declarations still open at the end of the document",
                self.variables.len()
            );
        }
        (self.stream, self.diagnostics)
    }
}
