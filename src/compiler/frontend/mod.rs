// FILE: src/compiler/frontend/mod.rs

// Everything between raw markup and the node tree
pub mod ast;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod reader;

pub use ast::{Template, TemplateNode};
pub use parser::TemplateParser;
