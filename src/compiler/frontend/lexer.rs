//! Streaming markup tokenizer
//!
//! Characters are consumed one at a time and all partial state (open tags,
//! half-read delimiters, pending text) lives in the tokenizer, so the events
//! it reports do not depend on how the input was split into chunks.

use crate::core::util::{excerpt, is_raw_text_element};
use crate::error::{CompilerError, Location, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    /// `None` when the attribute has no `=value` part.
    pub value: Option<String>,
    pub quote: Option<char>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub name: String,
    pub attributes: Vec<RawAttribute>,
    pub self_closing: bool,
    pub location: Location,
}

/// Receiver of tokenizer events, in document order.
pub trait MarkupHandler {
    fn on_text(&mut self, text: String, location: Location) -> Result<()>;
    fn on_comment(&mut self, text: String, location: Location) -> Result<()>;
    fn on_start_tag(&mut self, tag: StartTag) -> Result<()>;
    fn on_end_tag(&mut self, name: String, location: Location) -> Result<()>;
    fn on_document_end(&mut self, location: Location) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Text,
    TagOpen,
    MarkupDeclaration,
    Comment,
    Declaration,
    TagName,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValueQuoted(char),
    AttrValueUnquoted,
    SelfClosingStart,
    EndTagOpen,
    EndTagName,
    AfterEndTagName,
    RawText,
}

pub struct MarkupTokenizer {
    state: State,
    location: Location,

    text: String,
    text_start: Location,

    // raw source of the construct being read, for fallbacks and error excerpts
    markup: String,
    markup_start: Location,

    declaration: String,
    comment: String,

    tag_name: String,
    attributes: Vec<RawAttribute>,
    attr_name: String,
    attr_value: Option<String>,
    attr_quote: Option<char>,
    attr_start: Location,

    raw_text_tag: Option<String>,
}

impl Default for MarkupTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_tag_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '-' | ':' | '_' | '.')
}

impl MarkupTokenizer {
    pub fn new() -> Self {
        Self {
            state: State::Text,
            location: Location::new(1, 1),
            text: String::new(),
            text_start: Location::new(1, 1),
            markup: String::new(),
            markup_start: Location::new(1, 1),
            declaration: String::new(),
            comment: String::new(),
            tag_name: String::new(),
            attributes: Vec::new(),
            attr_name: String::new(),
            attr_value: None,
            attr_quote: None,
            attr_start: Location::new(1, 1),
            raw_text_tag: None,
        }
    }

    /// Feed the next chunk of input.
    pub fn feed<H: MarkupHandler>(&mut self, chunk: &str, handler: &mut H) -> Result<()> {
        for ch in chunk.chars() {
            self.step(ch, handler)?;
            if ch == '\n' {
                self.location.line += 1;
                self.location.column = 1;
            } else {
                self.location.column += 1;
            }
        }
        Ok(())
    }

    /// Signal end of input.
    pub fn finish<H: MarkupHandler>(&mut self, handler: &mut H) -> Result<()> {
        match self.state {
            State::Text | State::RawText => {}
            State::TagOpen => {
                self.markup_into_text();
                self.state = State::Text;
            }
            State::Comment => {
                let source = format!("<!--{}", self.comment);
                return Err(CompilerError::parse(self.markup_start, excerpt(&source), "Unterminated comment"));
            }
            State::MarkupDeclaration | State::Declaration => {
                return Err(self.error("Unterminated markup declaration"));
            }
            _ => return Err(self.error("Unterminated tag")),
        }
        self.flush_text(handler)?;
        handler.on_document_end(self.location)
    }

    fn step<H: MarkupHandler>(&mut self, ch: char, handler: &mut H) -> Result<()> {
        let loc = self.location;
        match self.state {
            State::Text => {
                if ch == '<' {
                    self.markup.clear();
                    self.markup.push(ch);
                    self.markup_start = loc;
                    self.state = State::TagOpen;
                } else {
                    self.push_text(ch, loc);
                }
            }
            State::TagOpen => match ch {
                '!' => {
                    self.markup.push(ch);
                    self.declaration.clear();
                    self.state = State::MarkupDeclaration;
                }
                '/' => {
                    self.markup.push(ch);
                    self.state = State::EndTagOpen;
                }
                '?' => {
                    self.markup.push(ch);
                    self.state = State::Declaration;
                }
                c if c.is_alphabetic() => {
                    self.markup.push(ch);
                    self.tag_name.clear();
                    self.tag_name.push(c);
                    self.attributes.clear();
                    self.state = State::TagName;
                }
                _ => {
                    // not a tag after all: keep the '<' as text and look at `ch` again
                    self.markup_into_text();
                    self.state = State::Text;
                    self.step(ch, handler)?;
                }
            },
            State::MarkupDeclaration => {
                self.markup.push(ch);
                self.declaration.push(ch);
                if self.declaration == "--" {
                    self.flush_text(handler)?;
                    self.comment.clear();
                    self.state = State::Comment;
                } else if !"--".starts_with(self.declaration.as_str()) {
                    if ch == '>' {
                        self.markup_into_text();
                        self.state = State::Text;
                    } else {
                        self.state = State::Declaration;
                    }
                }
            }
            State::Declaration => {
                self.markup.push(ch);
                if ch == '>' {
                    self.markup_into_text();
                    self.state = State::Text;
                }
            }
            State::Comment => {
                self.comment.push(ch);
                if ch == '>' && self.comment.ends_with("-->") {
                    let mut content = std::mem::take(&mut self.comment);
                    content.truncate(content.len() - 3);
                    handler.on_comment(content, self.markup_start)?;
                    self.state = State::Text;
                }
            }
            State::TagName => {
                self.markup.push(ch);
                match ch {
                    c if is_tag_name_char(c) => self.tag_name.push(c),
                    c if c.is_whitespace() => self.state = State::BeforeAttrName,
                    '/' => self.state = State::SelfClosingStart,
                    '>' => self.emit_start_tag(false, handler)?,
                    _ => return Err(self.error(format!("Invalid character '{}' in tag name", ch))),
                }
            }
            State::BeforeAttrName => {
                self.markup.push(ch);
                match ch {
                    c if c.is_whitespace() => {}
                    '>' => self.emit_start_tag(false, handler)?,
                    '/' => self.state = State::SelfClosingStart,
                    '"' | '\'' | '<' | '=' => {
                        return Err(self.error(format!("Unexpected '{}' in tag", ch)))
                    }
                    c => self.start_attribute(c, loc),
                }
            }
            State::AttrName => {
                self.markup.push(ch);
                match ch {
                    c if c.is_whitespace() => self.state = State::AfterAttrName,
                    '=' => self.state = State::BeforeAttrValue,
                    '>' => {
                        self.push_attribute();
                        self.emit_start_tag(false, handler)?;
                    }
                    '/' => {
                        self.push_attribute();
                        self.state = State::SelfClosingStart;
                    }
                    '"' | '\'' | '<' => {
                        return Err(self.error(format!("Unexpected '{}' in attribute name", ch)))
                    }
                    c => self.attr_name.push(c),
                }
            }
            State::AfterAttrName => {
                self.markup.push(ch);
                match ch {
                    c if c.is_whitespace() => {}
                    '=' => self.state = State::BeforeAttrValue,
                    '>' => {
                        self.push_attribute();
                        self.emit_start_tag(false, handler)?;
                    }
                    '/' => {
                        self.push_attribute();
                        self.state = State::SelfClosingStart;
                    }
                    '"' | '\'' | '<' => {
                        return Err(self.error(format!("Unexpected '{}' in tag", ch)))
                    }
                    c => {
                        self.push_attribute();
                        self.start_attribute(c, loc);
                    }
                }
            }
            State::BeforeAttrValue => {
                self.markup.push(ch);
                match ch {
                    c if c.is_whitespace() => {}
                    '"' | '\'' => {
                        self.attr_quote = Some(ch);
                        self.attr_value = Some(String::new());
                        self.state = State::AttrValueQuoted(ch);
                    }
                    '>' => {
                        self.attr_value = Some(String::new());
                        self.push_attribute();
                        self.emit_start_tag(false, handler)?;
                    }
                    c => {
                        self.attr_value = Some(c.to_string());
                        self.state = State::AttrValueUnquoted;
                    }
                }
            }
            State::AttrValueQuoted(quote) => {
                self.markup.push(ch);
                if ch == quote {
                    self.push_attribute();
                    self.state = State::BeforeAttrName;
                } else if let Some(value) = self.attr_value.as_mut() {
                    value.push(ch);
                }
            }
            State::AttrValueUnquoted => {
                self.markup.push(ch);
                match ch {
                    c if c.is_whitespace() => {
                        self.push_attribute();
                        self.state = State::BeforeAttrName;
                    }
                    '>' => {
                        self.push_attribute();
                        self.emit_start_tag(false, handler)?;
                    }
                    c => {
                        if let Some(value) = self.attr_value.as_mut() {
                            value.push(c);
                        }
                    }
                }
            }
            State::SelfClosingStart => {
                if ch == '>' {
                    self.markup.push(ch);
                    self.emit_start_tag(true, handler)?;
                } else {
                    self.state = State::BeforeAttrName;
                    self.step(ch, handler)?;
                }
            }
            State::EndTagOpen => {
                self.markup.push(ch);
                if ch.is_alphabetic() {
                    self.tag_name.clear();
                    self.tag_name.push(ch);
                    self.state = State::EndTagName;
                } else {
                    return Err(self.error("Malformed closing tag"));
                }
            }
            State::EndTagName => {
                self.markup.push(ch);
                match ch {
                    c if is_tag_name_char(c) => self.tag_name.push(c),
                    c if c.is_whitespace() => self.state = State::AfterEndTagName,
                    '>' => self.emit_end_tag(handler)?,
                    _ => return Err(self.error(format!("Invalid character '{}' in closing tag", ch))),
                }
            }
            State::AfterEndTagName => {
                self.markup.push(ch);
                match ch {
                    c if c.is_whitespace() => {}
                    '>' => self.emit_end_tag(handler)?,
                    _ => return Err(self.error("Malformed closing tag")),
                }
            }
            State::RawText => {
                self.push_text(ch, loc);
                self.check_raw_text_end(loc, handler)?;
            }
        }
        Ok(())
    }

    // Inside <script>/<style> only the matching closing tag ends the text. The
    // name must be followed by '>', '/' or whitespace, so `</scriptx>` stays raw.
    fn check_raw_text_end<H: MarkupHandler>(&mut self, loc: Location, handler: &mut H) -> Result<()> {
        let Some(tag) = self.raw_text_tag.as_deref() else {
            return Ok(());
        };
        let Some(terminator) = self.text.chars().next_back() else {
            return Ok(());
        };
        if !(terminator == '>' || terminator == '/' || terminator.is_whitespace()) {
            return Ok(());
        }
        let close = format!("</{}", tag);
        let name_end = self.text.len() - terminator.len_utf8();
        if name_end < close.len() {
            return Ok(());
        }
        let split = name_end - close.len();
        if !self.text.is_char_boundary(split) || !self.text[split..name_end].eq_ignore_ascii_case(&close) {
            return Ok(());
        }

        let written = self.text.split_off(split);
        self.markup_start = Location::new(loc.line, loc.column.saturating_sub(close.len()));
        self.tag_name = written[2..close.len()].to_string();
        self.markup = written;
        self.raw_text_tag = None;
        if terminator == '>' {
            self.emit_end_tag(handler)
        } else {
            self.state = State::AfterEndTagName;
            Ok(())
        }
    }

    fn start_attribute(&mut self, first: char, loc: Location) {
        self.attr_name.clear();
        self.attr_name.push(first);
        self.attr_value = None;
        self.attr_quote = None;
        self.attr_start = loc;
        self.state = State::AttrName;
    }

    fn push_attribute(&mut self) {
        self.attributes.push(RawAttribute {
            name: std::mem::take(&mut self.attr_name),
            value: self.attr_value.take(),
            quote: self.attr_quote.take(),
            location: self.attr_start,
        });
    }

    fn emit_start_tag<H: MarkupHandler>(&mut self, self_closing: bool, handler: &mut H) -> Result<()> {
        self.flush_text(handler)?;
        let name = std::mem::take(&mut self.tag_name);
        self.state = if !self_closing && is_raw_text_element(&name) {
            self.raw_text_tag = Some(name.to_ascii_lowercase());
            State::RawText
        } else {
            State::Text
        };
        handler.on_start_tag(StartTag {
            name,
            attributes: std::mem::take(&mut self.attributes),
            self_closing,
            location: self.markup_start,
        })
    }

    fn emit_end_tag<H: MarkupHandler>(&mut self, handler: &mut H) -> Result<()> {
        self.flush_text(handler)?;
        self.state = State::Text;
        let name = std::mem::take(&mut self.tag_name);
        handler.on_end_tag(name, self.markup_start)
    }

    fn push_text(&mut self, ch: char, loc: Location) {
        if self.text.is_empty() {
            self.text_start = loc;
        }
        self.text.push(ch);
    }

    fn markup_into_text(&mut self) {
        if self.text.is_empty() {
            self.text_start = self.markup_start;
        }
        self.text.push_str(&self.markup);
        self.markup.clear();
    }

    fn flush_text<H: MarkupHandler>(&mut self, handler: &mut H) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        handler.on_text(text, self.text_start)
    }

    fn error(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::parse(self.markup_start, excerpt(&self.markup), message)
    }
}
