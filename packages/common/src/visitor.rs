use stencil_parser::{Arena, Attribute, Element, NodeId, NodeKind, ParsedDocument, Text};

/// Visitor pattern for traversing the markup tree immutably
///
/// This trait provides default implementations that walk the entire tree.
/// Override specific visit_* methods to perform custom actions on nodes.
pub trait Visitor: Sized {
    fn visit_document(&mut self, doc: &ParsedDocument) {
        walk_document(self, doc);
    }

    fn visit_node(&mut self, arena: &Arena, id: NodeId) {
        walk_node(self, arena, id);
    }

    fn visit_element(&mut self, arena: &Arena, id: NodeId, element: &Element) {
        walk_element(self, arena, id, element);
    }

    fn visit_attribute(&mut self, _id: NodeId, _attribute: &Attribute) {
        // Leaf node, no children to walk
    }

    fn visit_text(&mut self, _id: NodeId, _text: &Text) {
        // Leaf node, no children to walk
    }

    fn visit_comment(&mut self, _id: NodeId, _comment: &str) {
        // Leaf node, no children to walk
    }
}

pub fn walk_document<V: Visitor>(visitor: &mut V, doc: &ParsedDocument) {
    for id in &doc.top_level {
        visitor.visit_node(&doc.arena, *id);
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, arena: &Arena, id: NodeId) {
    match &arena.get(id).kind {
        NodeKind::Element(element) => visitor.visit_element(arena, id, element),
        NodeKind::Text(text) => visitor.visit_text(id, text),
        NodeKind::Comment(comment) => visitor.visit_comment(id, comment),
        NodeKind::EndTag(_) => {}
    }
}

pub fn walk_element<V: Visitor>(visitor: &mut V, arena: &Arena, id: NodeId, element: &Element) {
    for attribute in &element.attributes {
        visitor.visit_attribute(id, attribute);
    }
    for child in &element.children {
        visitor.visit_node(arena, *child);
    }
}
