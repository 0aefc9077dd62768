use crate::node::NodeId;
use crc32fast::Hasher;

/// Generate document ID from file path using CRC32
pub fn document_id(path: &str) -> String {
    let mut buff = String::from(path);
    if !path.starts_with("file://") {
        buff = format!("file://{}", buff);
    }

    let mut hasher = Hasher::new();
    hasher.update(buff.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable key of a node for external tooling: `<document id>-<node index>`.
pub fn node_key(document_id: &str, node: NodeId) -> String {
    format!("{}-{}", document_id, node.index())
}
