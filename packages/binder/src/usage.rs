//! Consumption tracking and the exhaustiveness pass: anything in the source
//! the binder never read is reported, so nothing is silently ignored.

use std::collections::HashSet;
use stencil_common::{walk_element, Visitor};
use stencil_parser::{
    Arena, Attribute, Diagnostic, DiagnosticKind, Element, NodeId, ParsedDocument, Text,
};

/// What the binder has read, keyed by source node so reads through clones
/// count for the original.
#[derive(Debug, Default)]
pub struct Usage {
    nodes: HashSet<NodeId>,
    attributes: HashSet<(NodeId, usize)>,
}

impl Usage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_node(&mut self, arena: &Arena, id: NodeId) {
        self.nodes.insert(arena.original(id));
    }

    pub fn mark_attribute(&mut self, attribute: &Attribute) {
        self.attributes.insert((attribute.owner, attribute.index));
    }

    /// Marks a node with all its attributes and descendants.
    pub fn mark_subtree(&mut self, arena: &Arena, id: NodeId) {
        for node in arena.descendants(id) {
            self.mark_node(arena, node);
            if let Some(element) = arena.element(node) {
                for attribute in &element.attributes {
                    self.mark_attribute(attribute);
                }
            }
        }
    }

    pub fn is_node_used(&self, arena: &Arena, id: NodeId) -> bool {
        self.nodes.contains(&arena.original(id))
    }

    pub fn is_attribute_used(&self, attribute: &Attribute) -> bool {
        self.attributes.contains(&(attribute.owner, attribute.index))
    }

    /// Reports the topmost unread node of each unread subtree and every
    /// unread attribute of read elements.
    pub fn unused(&self, document: &ParsedDocument) -> Vec<Diagnostic> {
        let mut reporter = UnusedReporter {
            usage: self,
            arena: &document.arena,
            found: Vec::new(),
        };
        reporter.visit_document(document);
        reporter.found
    }
}

struct UnusedReporter<'a> {
    usage: &'a Usage,
    arena: &'a Arena,
    found: Vec<Diagnostic>,
}

impl Visitor for UnusedReporter<'_> {
    fn visit_element(&mut self, arena: &Arena, id: NodeId, element: &Element) {
        if !self.usage.is_node_used(arena, id) {
            self.found.push(Diagnostic::warning(
                DiagnosticKind::Semantic,
                arena.get(id).span,
                format!("<{}> is never used", element.name),
            ));
            return;
        }
        for attribute in &element.attributes {
            if !self.usage.is_attribute_used(attribute) {
                self.found.push(Diagnostic::warning(
                    DiagnosticKind::Semantic,
                    attribute.name_span,
                    format!("attribute '{}' on <{}> is never used", attribute.name, element.name),
                ));
            }
        }
        walk_element(self, arena, id, element);
    }

    fn visit_text(&mut self, id: NodeId, text: &Text) {
        if !text.blank && !self.usage.is_node_used(self.arena, id) {
            self.found.push(Diagnostic::warning(
                DiagnosticKind::Semantic,
                self.arena.get(id).span,
                "text is never used",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_parser::parse;

    #[test]
    fn test_reports_topmost_unused_only() {
        let doc = parse(r#"<a x="1" y="2"><b><c/></b>hello</a>"#);
        let root = doc.root.unwrap();
        let mut usage = Usage::new();
        usage.mark_node(&doc.arena, root);
        let x = doc.arena.attribute(root, "x").unwrap().clone();
        usage.mark_attribute(&x);

        let messages: Vec<String> = usage.unused(&doc).into_iter().map(|d| d.message).collect();
        assert_eq!(
            messages,
            vec![
                "attribute 'y' on <a> is never used",
                "<b> is never used",
                "text is never used"
            ]
        );
    }

    #[test]
    fn test_reads_through_clones_count() {
        let mut doc = parse(r#"<a><b k="v"/></a>"#);
        let root = doc.root.unwrap();
        let b = doc.arena.children(root)[0];
        let clone = doc.arena.clone_subtree(b, &[]);

        let mut usage = Usage::new();
        usage.mark_node(&doc.arena, root);
        usage.mark_subtree(&doc.arena, clone);
        assert!(usage.is_node_used(&doc.arena, b));
        assert!(usage.unused(&doc).is_empty());
    }
}
