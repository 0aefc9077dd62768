use crate::element::ElementId;
use serde::Serialize;
use std::collections::BTreeMap;
use stencil_parser::NodeId;

/// Source node to bound element lookup for external tooling.
///
/// A node expanded several times through `use` maps to several elements;
/// clones map to the elements bound from them and their original node maps
/// to those same elements. Built once per bind and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityMap {
    by_node: BTreeMap<NodeId, Vec<ElementId>>,
    by_element: BTreeMap<ElementId, NodeId>,
    origins: BTreeMap<ElementId, NodeId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, node: NodeId, original: NodeId, element: ElementId) {
        self.by_node.entry(node).or_default().push(element);
        if original != node {
            self.by_node.entry(original).or_default().push(element);
        }
        self.by_element.insert(element, node);
        self.origins.insert(element, original);
    }

    pub fn elements_for(&self, node: NodeId) -> &[ElementId] {
        self.by_node.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node the element was bound from (possibly a clone).
    pub fn node_of(&self, element: ElementId) -> Option<NodeId> {
        self.by_element.get(&element).copied()
    }

    /// Source node behind the element, never a clone.
    pub fn source_of(&self, element: ElementId) -> Option<NodeId> {
        self.origins.get(&element).copied()
    }

    pub fn len(&self) -> usize {
        self.by_element.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_element.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_parser::{parse, Arena};

    fn ids(arena: &Arena) -> Vec<NodeId> {
        arena.iter().map(|(id, _)| id).collect()
    }

    #[test]
    fn test_clones_map_back_to_source() {
        let doc = parse("<a><b/></a>");
        let nodes = ids(&doc.arena);
        let (source, clone) = (nodes[0], nodes[1]);

        let mut map = IdentityMap::new();
        map.record(source, source, ElementId(0));
        map.record(clone, source, ElementId(1));

        assert_eq!(map.elements_for(source), &[ElementId(0), ElementId(1)]);
        assert_eq!(map.elements_for(clone), &[ElementId(1)]);
        assert_eq!(map.node_of(ElementId(1)), Some(clone));
        assert_eq!(map.source_of(ElementId(1)), Some(source));
        assert_eq!(map.len(), 2);
    }
}
