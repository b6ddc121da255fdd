// FILE: src/compiler/middle_end/mod.rs

// Scope tracking, filters, plugins and the walk that turns the tree into commands
pub mod context;
pub mod element_context;
pub mod filter;
pub mod plugin;
pub mod variable_tracker;
pub mod walker;

pub use context::{CompilerContext, MarkupContext};
pub use element_context::{AggregatePluginInvoke, ElementContext};
pub use filter::{Filter, FilterPipeline};
pub use plugin::{Plugin, PluginInvoke, PluginRegistry, TagSkip};
pub use variable_tracker::VariableTracker;
pub use walker::TemplateWalker;
