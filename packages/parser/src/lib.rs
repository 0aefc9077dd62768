pub mod diagnostic;
pub mod error;
pub mod id_generator;
pub mod lossless;
pub mod node;
pub mod parser;
pub mod span;
pub mod tokenizer;

pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::ParseError;
pub use id_generator::{document_id, node_key};
pub use lossless::reassemble;
pub use node::{Arena, Attribute, Element, Node, NodeId, NodeKind, Text};
pub use parser::{parse, parse_document, ParseOptions, ParsedDocument};
pub use span::Span;
pub use tokenizer::{tokenize, Token};

#[cfg(feature = "pretty-errors")]
pub use diagnostic::format_diagnostics;
