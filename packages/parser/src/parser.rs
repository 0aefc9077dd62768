use crate::diagnostic::Diagnostics;
use crate::error::ParseError;
use crate::node::{Arena, Attribute, Element, Node, NodeId, NodeKind, Text};
use crate::span::Span;
use crate::tokenizer::{tokenize, RawAttribute, Token};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOptions {
    /// Keep comments as tree nodes instead of skipped spans.
    pub keep_comments: bool,
}

/// Result of parsing one markup document.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    pub arena: Arena,
    /// First top-level element.
    pub root: Option<NodeId>,
    /// Every top-level node in source order, including blank text.
    pub top_level: Vec<NodeId>,
    /// Source ranges not represented by any node (declarations, dropped
    /// comments, end tags that matched nothing).
    pub skipped: Vec<Span>,
    pub diagnostics: Diagnostics,
}

impl ParsedDocument {
    pub fn root_element(&self) -> Option<&Element> {
        self.root.and_then(|id| self.arena.element(id))
    }
}

/// Parse with default options.
pub fn parse(source: &str) -> ParsedDocument {
    parse_document(source, &ParseOptions::default())
}

/// Parse markup text into a tree. Never fails: every problem is a diagnostic
/// and the tree holds whatever could be recovered.
#[instrument(skip(source, options), fields(len = source.len()))]
pub fn parse_document(source: &str, options: &ParseOptions) -> ParsedDocument {
    let (tokens, errors) = tokenize(source);
    let mut builder = TreeBuilder::new(options);
    for error in errors {
        builder.report(error);
    }
    for token in tokens {
        builder.token(token);
    }
    let doc = builder.finish();
    debug!(
        nodes = doc.arena.len(),
        diagnostics = doc.diagnostics.len(),
        "parsed document"
    );
    doc
}

struct TreeBuilder<'a> {
    options: &'a ParseOptions,
    arena: Arena,
    stack: Vec<NodeId>,
    root: Option<NodeId>,
    top_level: Vec<NodeId>,
    skipped: Vec<Span>,
    diagnostics: Diagnostics,
}

impl<'a> TreeBuilder<'a> {
    fn new(options: &'a ParseOptions) -> Self {
        Self {
            options,
            arena: Arena::new(),
            stack: Vec::new(),
            root: None,
            top_level: Vec::new(),
            skipped: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn report(&mut self, error: ParseError) {
        let span = error.span();
        warn!(line = span.line, column = span.column, "{}", error);
        self.diagnostics.push(error);
    }

    fn attach(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let parent = self.stack.last().copied();
        let id = self.arena.alloc(Node {
            kind,
            span,
            parent,
            origin: None,
        });
        match parent {
            Some(parent) => {
                if let NodeKind::Element(element) = &mut self.arena.get_mut(parent).kind {
                    element.children.push(id);
                }
            }
            None => self.top_level.push(id),
        }
        id
    }

    fn token(&mut self, token: Token) {
        match token {
            Token::StartTag {
                name,
                name_span,
                attributes,
                self_closing,
                span,
            } => self.start_tag(name, name_span, attributes, self_closing, span),
            Token::EndTag { name, span } => self.end_tag(name, span),
            Token::Text {
                content,
                blank,
                span,
            } => {
                if self.stack.is_empty() && !blank {
                    self.report(ParseError::TextOutsideRoot { span });
                }
                self.attach(NodeKind::Text(Text { content, blank }), span);
            }
            Token::Comment { content, span } => {
                if self.options.keep_comments {
                    self.attach(NodeKind::Comment(content), span);
                } else {
                    self.skipped.push(span);
                }
            }
            Token::Skipped { span } => self.skipped.push(span),
        }
    }

    fn start_tag(
        &mut self,
        name: String,
        name_span: Span,
        attributes: Vec<RawAttribute>,
        self_closing: bool,
        span: Span,
    ) {
        if self.stack.is_empty() && self.root.is_some() {
            self.report(ParseError::MultipleRoots { span: name_span });
        }
        let id = self.attach(
            NodeKind::Element(Element {
                name,
                name_span,
                attributes: Vec::new(),
                children: Vec::new(),
                end_tag: None,
                self_closing,
            }),
            span,
        );
        let attributes = attributes
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Attribute {
                name: raw.name,
                value: raw.value,
                name_span: raw.name_span,
                value_span: raw.value_span,
                owner: id,
                index,
                verbatim: raw.verbatim,
            })
            .collect();
        if let NodeKind::Element(element) = &mut self.arena.get_mut(id).kind {
            element.attributes = attributes;
        }

        if self.stack.is_empty() && self.root.is_none() {
            self.root = Some(id);
        }
        if !self_closing {
            self.stack.push(id);
        }
    }

    fn open_name(&self, id: NodeId) -> &str {
        self.arena.element(id).map(|e| e.name.as_str()).unwrap_or("")
    }

    fn report_unclosed(&mut self, id: NodeId) {
        if let Some(element) = self.arena.element(id) {
            let error = ParseError::UnclosedElement {
                name: element.name.clone(),
                span: element.name_span,
            };
            self.report(error);
        }
    }

    fn end_tag(&mut self, name: String, span: Span) {
        let Some(depth) = self.stack.iter().rposition(|id| self.open_name(*id) == name) else {
            self.report(ParseError::UnmatchedEndTag { name, span });
            self.skipped.push(span);
            return;
        };

        // Everything opened after the matching element is closed implicitly.
        let inner: Vec<NodeId> = self.stack.drain(depth + 1..).collect();
        for id in inner {
            self.report_unclosed(id);
        }
        let Some(open) = self.stack.pop() else {
            return;
        };
        let end = self.arena.alloc(Node {
            kind: NodeKind::EndTag(name),
            span,
            parent: Some(open),
            origin: None,
        });
        if let NodeKind::Element(element) = &mut self.arena.get_mut(open).kind {
            element.end_tag = Some(end);
        }
    }

    fn finish(mut self) -> ParsedDocument {
        let open: Vec<NodeId> = std::mem::take(&mut self.stack);
        for id in open {
            self.report_unclosed(id);
        }
        ParsedDocument {
            arena: self.arena,
            root: self.root,
            top_level: self.top_level,
            skipped: self.skipped,
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(doc: &ParsedDocument) -> Vec<String> {
        doc.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn builds_nested_tree() {
        let doc = parse("<library name=\"lib\">\n  <pattern name=\"a\"/>\n</library>");
        assert!(doc.diagnostics.is_empty(), "{:?}", messages(&doc));
        let root = doc.root_element().unwrap();
        assert_eq!(root.name, "library");
        assert_eq!(root.children.len(), 3);
        let pattern = doc.arena.element(root.children[1]).unwrap();
        assert_eq!(pattern.name, "pattern");
        assert_eq!(pattern.attribute("name").unwrap().value, "a");
        assert!(root.end_tag.is_some());
        assert!(doc.arena.get(root.children[0]).is_blank_text());
    }

    #[test]
    fn mismatched_end_tag_reports_inner_start_tag() {
        let doc = parse("<a><b><c></a>");
        let messages = messages(&doc);
        assert_eq!(
            messages,
            vec!["element <b> is not closed", "element <c> is not closed"]
        );
        // The diagnostic points at the open start tag, not the end tag.
        assert_eq!(doc.diagnostics.as_slice()[0].span.offset, 4);
        assert!(doc.root_element().unwrap().end_tag.is_some());
    }

    #[test]
    fn unmatched_end_tag_is_ignored() {
        let doc = parse("<a></b></a>");
        assert_eq!(messages(&doc), vec!["end tag </b> does not match any open element"]);
        assert_eq!(doc.skipped.len(), 1);
        assert!(doc.root_element().unwrap().end_tag.is_some());
    }

    #[test]
    fn unclosed_elements_reported_once_at_end() {
        let doc = parse("<a><b>");
        assert_eq!(
            messages(&doc),
            vec!["element <a> is not closed", "element <b> is not closed"]
        );
    }

    #[test]
    fn second_root_and_stray_text() {
        let doc = parse("<a/>oops<b/>");
        assert_eq!(
            messages(&doc),
            vec![
                "text outside the root element",
                "more than one top-level element; only the first is used"
            ]
        );
        assert_eq!(doc.top_level.len(), 3);
        assert_eq!(doc.root_element().unwrap().name, "a");
    }

    #[test]
    fn comments_kept_on_request() {
        let source = "<a><!-- c --></a>";
        let dropped = parse(source);
        assert!(dropped.root_element().unwrap().children.is_empty());
        assert_eq!(dropped.skipped.len(), 1);

        let kept = parse_document(source, &ParseOptions { keep_comments: true });
        let child = kept.root_element().unwrap().children[0];
        assert_eq!(kept.arena.get(child).kind, NodeKind::Comment(" c ".to_string()));
    }

    #[test]
    fn attributes_know_their_owner() {
        let doc = parse("<a x=\"1\" y=\"2\"/>");
        let root = doc.root.unwrap();
        let y = doc.arena.attribute(root, "y").unwrap();
        assert_eq!(y.owner, root);
        assert_eq!(y.index, 1);
    }
}
