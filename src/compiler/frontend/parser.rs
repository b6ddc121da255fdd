//! Builds the node tree from tokenizer events

use crate::compiler::frontend::ast::*;
use crate::compiler::frontend::expression::{Expression, ExpressionNode, Interpolation};
use crate::compiler::frontend::lexer::{MarkupHandler, MarkupTokenizer, RawAttribute, StartTag};
use crate::compiler::frontend::reader::ChunkedReader;
use crate::core::util::{excerpt, is_void_element};
use crate::core::{DEFAULT_BUFFER_SIZE, SLY_ATTRIBUTE_PREFIX};
use crate::error::{CompilerError, Location, Result};
use std::io::Read;

/// Parses markup into a [`Template`], reading through a buffer of
/// `buffer_size` bytes.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    buffer_size: usize,
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl TemplateParser {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn parse<R: Read>(&self, input: R) -> Result<Template> {
        let mut reader = ChunkedReader::new(input, self.buffer_size);
        let mut tokenizer = MarkupTokenizer::new();
        let mut builder = TreeBuilder::new();

        while let Some(chunk) = reader.next_chunk()? {
            tokenizer.feed(&chunk, &mut builder)?;
        }
        tokenizer.finish(&mut builder)?;

        let template = builder.root;
        log::debug!(
            "Parsed template with {} top-level nodes and {} elements (buffer size {})",
            template.children.len(),
            template.element_count(),
            self.buffer_size
        );
        Ok(template)
    }

    pub fn parse_str(&self, source: &str) -> Result<Template> {
        self.parse(source.as_bytes())
    }
}

struct TreeBuilder {
    root: Template,
    open_elements: Vec<ElementNode>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            root: Template::new(""),
            open_elements: Vec::new(),
        }
    }

    fn attach(&mut self, node: TemplateNode) {
        match self.open_elements.last_mut() {
            Some(parent) => parent.add_child(node),
            None => self.root.add_child(node),
        }
    }
}

impl MarkupHandler for TreeBuilder {
    fn on_text(&mut self, text: String, location: Location) -> Result<()> {
        self.attach(TemplateNode::Text(TextNode { text, location }));
        Ok(())
    }

    fn on_comment(&mut self, text: String, location: Location) -> Result<()> {
        self.attach(TemplateNode::Comment(CommentNode { text, location }));
        Ok(())
    }

    fn on_start_tag(&mut self, tag: StartTag) -> Result<()> {
        let mut element = ElementNode::new(tag.name, tag.location);
        for raw in tag.attributes {
            element.context.push_attribute(convert_attribute(raw)?);
        }

        if tag.self_closing || is_void_element(&element.name) {
            element.self_closing = tag.self_closing;
            element.has_end_tag = false;
            self.attach(TemplateNode::Element(element));
        } else {
            self.open_elements.push(element);
        }
        Ok(())
    }

    fn on_end_tag(&mut self, name: String, location: Location) -> Result<()> {
        let matches_open = match self.open_elements.last() {
            Some(open) => open.name.eq_ignore_ascii_case(&name),
            None => false,
        };
        if matches_open {
            if let Some(element) = self.open_elements.pop() {
                self.attach(TemplateNode::Element(element));
            }
            return Ok(());
        }
        if is_void_element(&name) {
            log::debug!("Ignoring closing tag </{}> of a void element at {}", name, location);
            return Ok(());
        }

        let source = format!("</{}>", name);
        let message = match self.open_elements.last() {
            Some(open) => format!(
                "Mismatched closing tag </{}>, expected </{}> for the element opened at {}",
                name, open.name, open.location
            ),
            None => format!("Closing tag </{}> has no matching open element", name),
        };
        Err(CompilerError::parse(location, excerpt(&source), message))
    }

    fn on_document_end(&mut self, _location: Location) -> Result<()> {
        match self.open_elements.last() {
            Some(open) => Err(CompilerError::parse(
                open.location,
                excerpt(&format!("<{}", open.name)),
                format!("Unclosed element <{}>", open.name),
            )),
            None => Ok(()),
        }
    }
}

fn convert_attribute(raw: RawAttribute) -> Result<Attribute> {
    let prefixed = raw.name.len() > SLY_ATTRIBUTE_PREFIX.len()
        && raw.name.is_char_boundary(SLY_ATTRIBUTE_PREFIX.len())
        && raw.name[..SLY_ATTRIBUTE_PREFIX.len()].eq_ignore_ascii_case(SLY_ATTRIBUTE_PREFIX);

    let value = if prefixed {
        let descriptor = PluginCallInfo::parse(&raw.name[SLY_ATTRIBUTE_PREFIX.len()..]);
        let value_location = raw
            .location
            .advance_columns(raw.name.chars().count() + 1 + usize::from(raw.quote.is_some()));
        let expression = directive_expression(raw.value.as_deref(), value_location)?;
        AttributeValue::PluginCall { descriptor, expression }
    } else {
        match raw.value {
            None => AttributeValue::Empty,
            Some(text) => AttributeValue::Literal { text },
        }
    };

    Ok(Attribute {
        name: raw.name,
        value,
        quote: raw.quote,
        location: raw.location,
    })
}

fn directive_expression(value: Option<&str>, location: Location) -> Result<Expression> {
    let Some(text) = value else {
        return Ok(Expression::from_root(ExpressionNode::NullLiteral));
    };
    let interpolation = Interpolation::parse(text, location)?;
    if let Some(expression) = interpolation.single_expression() {
        return Ok(expression.clone());
    }
    match interpolation.constant_text() {
        Some(constant) => Ok(Expression::from_root(ExpressionNode::StringConstant(constant))),
        None => Err(CompilerError::expression(
            location,
            "Directive values must be a single expression or plain text",
        )),
    }
}
