//! Arena-backed markup tree.
//!
//! Nodes are addressed by [`NodeId`]; parents, end tags and clone origins are
//! plain ids, so the tree can be shared read-only once built and identity
//! lookups are integer lookups.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Entity-decoded value; `""` when the attribute had no value.
    pub value: String,
    pub name_span: Span,
    /// Span of the raw value between the quotes.
    pub value_span: Span,
    /// Element the attribute was written on in the source.
    pub owner: NodeId,
    /// Position in the owner's source attribute list.
    pub index: usize,
    /// `false` when entity decoding changed the text, so offsets inside
    /// `value` no longer line up with the source.
    pub verbatim: bool,
}

impl Attribute {
    /// Span of a byte range of `value`, or the whole value span when the
    /// value no longer lines up with the source.
    pub fn sub_span(&self, range: std::ops::Range<usize>) -> Span {
        if self.verbatim {
            self.value_span.narrow(&self.value, range)
        } else {
            self.value_span
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub name_span: Span,
    pub attributes: Vec<Attribute>,
    pub children: Vec<NodeId>,
    pub end_tag: Option<NodeId>,
    pub self_closing: bool,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// Entity-decoded content with whitespace runs collapsed to one space.
    pub content: String,
    /// Whitespace only.
    pub blank: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Element(Element),
    Text(Text),
    Comment(String),
    EndTag(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    /// Set on clones: the source node this one was copied from.
    pub origin: Option<NodeId>,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(&self.kind, NodeKind::Text(text) if text.blank)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids are only minted by this arena, so indexing cannot go out of range.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.get(id).as_element()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&Attribute> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    /// The source node a clone was copied from, or the node itself.
    pub fn original(&self, id: NodeId) -> NodeId {
        self.get(id).origin.unwrap_or(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            for child in self.children(next).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Source extent of a node: for elements, from the start tag to the end
    /// tag (or the last descendant when the end tag is missing).
    pub fn extent(&self, id: NodeId) -> Span {
        let node = self.get(id);
        let Some(element) = node.as_element() else {
            return node.span;
        };
        if let Some(end) = element.end_tag {
            return node.span.join(&self.get(end).span);
        }
        match element.children.last() {
            Some(last) => node.span.join(&self.extent(*last)),
            None => node.span,
        }
    }

    /// Deep-copies the subtree under `id`. Every copy records the original
    /// source node in `origin`. `overrides` replace same-named attributes of
    /// the copied root or are appended to it; they keep their own owner so
    /// usage is credited to the element that wrote them.
    pub fn clone_subtree(&mut self, id: NodeId, overrides: &[Attribute]) -> NodeId {
        let parent = self.get(id).parent;
        let root = self.clone_node(id, parent);
        if let NodeKind::Element(element) = &mut self.get_mut(root).kind {
            for attr in overrides {
                match element.attributes.iter_mut().find(|a| a.name == attr.name) {
                    Some(existing) => *existing = attr.clone(),
                    None => element.attributes.push(attr.clone()),
                }
            }
        }
        root
    }

    fn clone_node(&mut self, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let source = self.get(id).clone();
        let origin = source.origin.unwrap_or(id);
        let children = match &source.kind {
            NodeKind::Element(element) => element.children.clone(),
            _ => Vec::new(),
        };
        let copy = self.alloc(Node {
            kind: source.kind,
            span: source.span,
            parent,
            origin: Some(origin),
        });

        let copied: Vec<NodeId> = children
            .into_iter()
            .map(|child| self.clone_node(child, Some(copy)))
            .collect();
        if let NodeKind::Element(element) = &mut self.get_mut(copy).kind {
            element.children = copied;
            // The end tag stays with the source tree.
            element.end_tag = None;
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str) -> NodeKind {
        NodeKind::Element(Element {
            name: name.to_string(),
            name_span: Span::origin(),
            attributes: Vec::new(),
            children: Vec::new(),
            end_tag: None,
            self_closing: false,
        })
    }

    fn attr(name: &str, value: &str, owner: NodeId, index: usize) -> Attribute {
        Attribute {
            name: name.to_string(),
            value: value.to_string(),
            name_span: Span::origin(),
            value_span: Span::origin(),
            owner,
            index,
            verbatim: true,
        }
    }

    fn tree() -> (Arena, NodeId, NodeId) {
        let mut arena = Arena::new();
        let root = arena.alloc(Node {
            kind: element("div"),
            span: Span::new(0, 1, 1, 5),
            parent: None,
            origin: None,
        });
        let child = arena.alloc(Node {
            kind: element("rect"),
            span: Span::new(5, 1, 6, 7),
            parent: Some(root),
            origin: None,
        });
        let width = attr("width", "10", root, 0);
        if let NodeKind::Element(e) = &mut arena.get_mut(root).kind {
            e.children.push(child);
            e.attributes.push(width);
        }
        (arena, root, child)
    }

    #[test]
    fn clone_keeps_origin_of_every_node() {
        let (mut arena, root, child) = tree();
        let copy = arena.clone_subtree(root, &[]);
        let copy_child = arena.children(copy)[0];
        assert_eq!(arena.original(copy), root);
        assert_eq!(arena.original(copy_child), child);
        assert_eq!(arena.parent(copy_child), Some(copy));

        // A clone of a clone still points at the source node.
        let again = arena.clone_subtree(copy, &[]);
        assert_eq!(arena.original(again), root);
    }

    #[test]
    fn overrides_replace_or_append() {
        let (mut arena, root, _) = tree();
        let user = NodeId(9);
        let copy = arena.clone_subtree(
            root,
            &[attr("width", "20", user, 1), attr("fill", "red", user, 2)],
        );
        let element = arena.element(copy).unwrap();
        assert_eq!(element.attributes.len(), 2);
        assert_eq!(element.attribute("width").unwrap().value, "20");
        assert_eq!(element.attribute("width").unwrap().owner, user);
        assert_eq!(element.attribute("fill").unwrap().value, "red");
        // The source is untouched.
        assert_eq!(arena.attribute(root, "width").unwrap().value, "10");
    }

    #[test]
    fn descendants_are_preorder() {
        let (arena, root, child) = tree();
        assert_eq!(arena.descendants(root), vec![root, child]);
        assert_eq!(arena.extent(root), Span::new(0, 1, 1, 12));
    }
}
