//! Single-pass, character-level tokenizer for the stencil markup.
//!
//! The tokenizer never fails. Malformed input is reported as a
//! [`ParseError`] and scanning resumes at the nearest sensible point, so the
//! token spans (plus skipped spans) always tile the input.

use crate::error::ParseError;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub name_span: Span,
    pub value: String,
    pub value_span: Span,
    pub verbatim: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartTag {
        name: String,
        name_span: Span,
        attributes: Vec<RawAttribute>,
        self_closing: bool,
        span: Span,
    },
    EndTag {
        name: String,
        span: Span,
    },
    Text {
        content: String,
        blank: bool,
        span: Span,
    },
    Comment {
        content: String,
        span: Span,
    },
    /// Doctype, processing instructions and nameless end tags.
    Skipped {
        span: Span,
    },
}

impl Token {
    pub fn span(&self) -> Span {
        match self {
            Token::StartTag { span, .. }
            | Token::EndTag { span, .. }
            | Token::Text { span, .. }
            | Token::Comment { span, .. }
            | Token::Skipped { span } => *span,
        }
    }
}

/// Tokenize markup text. Never fails; problems come back alongside the tokens.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    Tokenizer::new(source).run()
}

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

fn decode_entity(body: &str) -> Option<char> {
    match body {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Data,
    TagOpen,
    TagName,
    EndTagOpen,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueQuoted(char),
    AttributeValueUnquoted,
    SelfClosingStartTag,
    Comment,
    Bogus,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

#[derive(Default)]
struct TextBuffer {
    start: Option<Mark>,
    content: String,
    last_was_space: bool,
    blank: bool,
}

impl TextBuffer {
    fn push(&mut self, c: char) {
        if c.is_whitespace() {
            if !self.last_was_space {
                self.content.push(' ');
            }
            self.last_was_space = true;
        } else {
            self.content.push(c);
            self.last_was_space = false;
            self.blank = false;
        }
    }
}

#[derive(Default)]
struct TagBuffer {
    name: String,
    name_span: Span,
    attributes: Vec<RawAttribute>,
}

#[derive(Default)]
struct AttributeBuffer {
    name: String,
    name_span: Span,
    value: String,
    verbatim: bool,
}

struct Tokenizer<'src> {
    src: &'src str,
    offset: usize,
    line: usize,
    column: usize,
    tag_start: Mark,
    value_start: Mark,
    text: TextBuffer,
    tag: TagBuffer,
    attr: AttributeBuffer,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
}

impl<'src> Tokenizer<'src> {
    fn new(src: &'src str) -> Self {
        let start = Mark {
            offset: 0,
            line: 1,
            column: 1,
        };
        Self {
            src,
            offset: 0,
            line: 1,
            column: 1,
            tag_start: start,
            value_start: start,
            text: TextBuffer::default(),
            tag: TagBuffer::default(),
            attr: AttributeBuffer::default(),
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<ParseError>) {
        let mut state = State::Data;
        loop {
            let next = match state {
                State::Data => self.data(),
                State::TagOpen => self.tag_open(),
                State::TagName => self.tag_name(),
                State::EndTagOpen => self.end_tag(),
                State::BeforeAttributeName => self.before_attribute_name(),
                State::AttributeName => self.attribute_name(),
                State::AfterAttributeName => self.after_attribute_name(),
                State::BeforeAttributeValue => self.before_attribute_value(),
                State::AttributeValueQuoted(quote) => self.attribute_value_quoted(quote),
                State::AttributeValueUnquoted => self.attribute_value_unquoted(),
                State::SelfClosingStartTag => self.self_closing_start_tag(),
                State::Comment => self.comment(),
                State::Bogus => self.bogus(),
            };
            match next {
                Some(next) => state = next,
                None => break,
            }
        }
        self.flush_text();
        (self.tokens, self.errors)
    }

    // ---- cursor ----

    fn peek(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.offset..].chars().nth(1)
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.src[self.offset..].starts_with(pattern)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_to(&mut self, offset: usize) {
        while self.offset < offset && self.bump().is_some() {}
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn span_from(&self, mark: Mark) -> Span {
        Span::new(mark.offset, mark.line, mark.column, self.offset - mark.offset)
    }

    fn here(&self) -> Span {
        self.span_from(self.mark())
    }

    fn take_name(&mut self) -> (String, Span) {
        let start = self.mark();
        while matches!(self.peek(), Some(c) if is_name_char(c)) {
            self.bump();
        }
        let span = self.span_from(start);
        (self.src[span.range()].to_string(), span)
    }

    /// Consumes an entity starting at `&`. Returns the text to append and
    /// whether it differs from the source text.
    fn entity(&mut self) -> (String, bool) {
        let start = self.mark();
        let src = self.src;
        let rest = &src[self.offset + 1..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .unwrap_or(rest.len());

        if len == 0 || len > 10 || !rest[len..].starts_with(';') {
            self.bump();
            self.errors.push(ParseError::UnterminatedEntity {
                span: self.span_from(start),
            });
            return ("&".to_string(), false);
        }

        let body = &rest[..len];
        self.advance_to(start.offset + len + 2);
        let span = self.span_from(start);
        match decode_entity(body) {
            Some(c) => (c.to_string(), true),
            None => {
                let raw = format!("&{};", body);
                self.errors.push(ParseError::UnknownEntity {
                    entity: raw.clone(),
                    span,
                });
                (raw, false)
            }
        }
    }

    // ---- text ----

    fn begin_text(&mut self) {
        if self.text.start.is_none() {
            self.text.start = Some(self.mark());
            self.text.blank = true;
        }
    }

    fn flush_text(&mut self) {
        let text = std::mem::take(&mut self.text);
        if let Some(start) = text.start {
            self.tokens.push(Token::Text {
                content: text.content,
                blank: text.blank,
                span: self.span_from(start),
            });
        }
    }

    /// `<` followed by something that can open a tag.
    fn at_tag_start(&self) -> bool {
        matches!(self.peek_second(), Some(c) if is_name_start(c) || matches!(c, '/' | '!' | '?'))
    }

    fn data(&mut self) -> Option<State> {
        loop {
            let c = self.peek()?;
            match c {
                '<' if self.at_tag_start() => {
                    self.flush_text();
                    self.tag_start = self.mark();
                    self.bump();
                    return Some(State::TagOpen);
                }
                '<' => {
                    self.begin_text();
                    let start = self.mark();
                    self.bump();
                    self.errors.push(ParseError::StrayLessThan {
                        span: self.span_from(start),
                    });
                    self.text.push('<');
                }
                '&' => {
                    self.begin_text();
                    let (decoded, _) = self.entity();
                    for c in decoded.chars() {
                        self.text.push(c);
                    }
                }
                c => {
                    self.begin_text();
                    self.bump();
                    self.text.push(c);
                }
            }
        }
    }

    // ---- tags ----

    fn tag_open(&mut self) -> Option<State> {
        match self.peek() {
            Some('/') => {
                self.bump();
                Some(State::EndTagOpen)
            }
            Some('!') if self.starts_with("!--") => {
                self.advance_to(self.offset + 3);
                Some(State::Comment)
            }
            Some('!') | Some('?') => Some(State::Bogus),
            _ => Some(State::TagName),
        }
    }

    fn tag_name(&mut self) -> Option<State> {
        let (name, span) = self.take_name();
        self.tag = TagBuffer {
            name,
            name_span: span,
            attributes: Vec::new(),
        };
        Some(State::BeforeAttributeName)
    }

    fn emit_start_tag(&mut self, self_closing: bool) {
        let tag = std::mem::take(&mut self.tag);
        self.tokens.push(Token::StartTag {
            name: tag.name,
            name_span: tag.name_span,
            attributes: tag.attributes,
            self_closing,
            span: self.span_from(self.tag_start),
        });
    }

    fn eof_in(&mut self, context: &'static str) {
        self.errors.push(ParseError::UnexpectedEof {
            context,
            span: self.span_from(self.tag_start),
        });
    }

    fn before_attribute_name(&mut self) -> Option<State> {
        loop {
            match self.peek() {
                None => {
                    self.eof_in("a tag");
                    self.emit_start_tag(false);
                    return None;
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('>') => {
                    self.bump();
                    self.emit_start_tag(false);
                    return Some(State::Data);
                }
                Some('/') => {
                    self.bump();
                    return Some(State::SelfClosingStartTag);
                }
                Some('<') => {
                    self.errors.push(ParseError::UnterminatedTag {
                        tag: self.tag.name.clone(),
                        span: self.here(),
                    });
                    self.emit_start_tag(false);
                    return Some(State::Data);
                }
                Some(c) if is_name_start(c) => return Some(State::AttributeName),
                Some(c) => {
                    let start = self.mark();
                    self.bump();
                    self.errors.push(ParseError::UnexpectedCharacter {
                        found: c,
                        tag: self.tag.name.clone(),
                        span: self.span_from(start),
                    });
                }
            }
        }
    }

    fn attribute_name(&mut self) -> Option<State> {
        let (name, span) = self.take_name();
        self.attr = AttributeBuffer {
            name,
            name_span: span,
            value: String::new(),
            verbatim: true,
        };
        Some(State::AfterAttributeName)
    }

    fn finish_attribute(&mut self, value_span: Span) {
        let attr = std::mem::take(&mut self.attr);
        if self.tag.attributes.iter().any(|a| a.name == attr.name) {
            self.errors.push(ParseError::DuplicateAttribute {
                name: attr.name,
                span: attr.name_span,
            });
            return;
        }
        self.tag.attributes.push(RawAttribute {
            name: attr.name,
            name_span: attr.name_span,
            value: attr.value,
            value_span,
            verbatim: attr.verbatim,
        });
    }

    fn missing_value(&mut self) -> Option<State> {
        self.errors.push(ParseError::MissingAttributeValue {
            name: self.attr.name.clone(),
            span: self.attr.name_span,
        });
        let span = self.attr.name_span.at_end();
        self.finish_attribute(span);
        Some(State::BeforeAttributeName)
    }

    fn after_attribute_name(&mut self) -> Option<State> {
        self.skip_whitespace();
        if self.peek() == Some('=') {
            self.bump();
            return Some(State::BeforeAttributeValue);
        }
        self.missing_value()
    }

    fn before_attribute_value(&mut self) -> Option<State> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.value_start = self.mark();
                Some(State::AttributeValueQuoted(quote))
            }
            None | Some('>') | Some('<') => self.missing_value(),
            Some('/') if self.peek_second() == Some('>') => self.missing_value(),
            Some(_) => {
                self.value_start = self.mark();
                Some(State::AttributeValueUnquoted)
            }
        }
    }

    fn push_value_entity(&mut self) {
        let (decoded, changed) = self.entity();
        self.attr.value.push_str(&decoded);
        if changed {
            self.attr.verbatim = false;
        }
    }

    fn attribute_value_quoted(&mut self, quote: char) -> Option<State> {
        loop {
            match self.peek() {
                None => {
                    self.errors.push(ParseError::UnexpectedEof {
                        context: "an attribute value",
                        span: self.span_from(self.value_start),
                    });
                    let span = self.span_from(self.value_start);
                    self.finish_attribute(span);
                    self.emit_start_tag(false);
                    return None;
                }
                Some(c) if c == quote => {
                    let span = self.span_from(self.value_start);
                    self.bump();
                    self.finish_attribute(span);
                    return Some(State::BeforeAttributeName);
                }
                Some('&') => self.push_value_entity(),
                Some(c) => {
                    self.bump();
                    self.attr.value.push(c);
                }
            }
        }
    }

    fn attribute_value_unquoted(&mut self) -> Option<State> {
        loop {
            match self.peek() {
                None | Some('>') | Some('<') => break,
                Some(c) if c.is_whitespace() => break,
                Some('/') if self.peek_second() == Some('>') => break,
                Some('&') => self.push_value_entity(),
                Some(c) => {
                    self.bump();
                    self.attr.value.push(c);
                }
            }
        }
        let span = self.span_from(self.value_start);
        self.errors.push(ParseError::UnquotedAttributeValue {
            name: self.attr.name.clone(),
            span,
        });
        self.finish_attribute(span);
        Some(State::BeforeAttributeName)
    }

    fn self_closing_start_tag(&mut self) -> Option<State> {
        if self.peek() == Some('>') {
            self.bump();
            self.emit_start_tag(true);
            return Some(State::Data);
        }
        self.errors.push(ParseError::ExpectedTagEnd {
            tag: self.tag.name.clone(),
            span: self.here(),
        });
        Some(State::BeforeAttributeName)
    }

    fn end_tag(&mut self) -> Option<State> {
        let (name, _) = self.take_name();
        self.skip_whitespace();
        let mut reported = false;
        let mut at_eof = false;
        loop {
            match self.peek() {
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('<') => {
                    self.errors.push(ParseError::UnterminatedTag {
                        tag: format!("/{}", name),
                        span: self.here(),
                    });
                    break;
                }
                None => {
                    self.eof_in("an end tag");
                    at_eof = true;
                    break;
                }
                Some(c) => {
                    let start = self.mark();
                    self.bump();
                    if !reported {
                        self.errors.push(ParseError::UnexpectedCharacter {
                            found: c,
                            tag: format!("/{}", name),
                            span: self.span_from(start),
                        });
                        reported = true;
                    }
                }
            }
        }

        let span = self.span_from(self.tag_start);
        if name.is_empty() {
            self.errors.push(ParseError::EmptyEndTag { span });
            self.tokens.push(Token::Skipped { span });
        } else {
            self.tokens.push(Token::EndTag { name, span });
        }
        if at_eof {
            None
        } else {
            Some(State::Data)
        }
    }

    // ---- comments and declarations ----

    fn comment(&mut self) -> Option<State> {
        let body_start = self.offset;
        let content = match self.src[body_start..].find("-->") {
            Some(len) => {
                let content = self.src[body_start..body_start + len].to_string();
                self.advance_to(body_start + len + 3);
                content
            }
            None => {
                let content = self.src[body_start..].to_string();
                self.advance_to(self.src.len());
                self.eof_in("a comment");
                content
            }
        };
        self.tokens.push(Token::Comment {
            content,
            span: self.span_from(self.tag_start),
        });
        Some(State::Data)
    }

    fn bogus(&mut self) -> Option<State> {
        match self.src[self.offset..].find('>') {
            Some(len) => self.advance_to(self.offset + len + 1),
            None => {
                self.advance_to(self.src.len());
                self.eof_in("a declaration");
            }
        }
        self.tokens.push(Token::Skipped {
            span: self.span_from(self.tag_start),
        });
        Some(State::Data)
    }
}
