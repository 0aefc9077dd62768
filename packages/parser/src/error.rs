//! Error types for the markup tokenizer and tree builder.
//!
//! None of these abort a parse: each is turned into a [`Diagnostic`] and the
//! tokenizer carries on from the nearest recovery point.

use crate::diagnostic::{Diagnostic, DiagnosticKind, Severity};
use crate::span::Span;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("'<' does not start a tag; write &lt; for a literal '<'")]
    StrayLessThan { span: Span },

    #[error("unexpected character '{found}' in tag <{tag}>")]
    UnexpectedCharacter { found: char, tag: String, span: Span },

    #[error("tag <{tag}> is not closed before the next '<'")]
    UnterminatedTag { tag: String, span: Span },

    #[error("expected '>' after '/' in tag <{tag}>")]
    ExpectedTagEnd { tag: String, span: Span },

    #[error("attribute '{name}' has no value")]
    MissingAttributeValue { name: String, span: Span },

    #[error("value of attribute '{name}' should be quoted")]
    UnquotedAttributeValue { name: String, span: Span },

    #[error("duplicate attribute '{name}'; the first one is used")]
    DuplicateAttribute { name: String, span: Span },

    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String, span: Span },

    #[error("'&' does not start an entity; write &amp; for a literal '&'")]
    UnterminatedEntity { span: Span },

    #[error("end tag is missing a name")]
    EmptyEndTag { span: Span },

    #[error("end tag </{name}> does not match any open element")]
    UnmatchedEndTag { name: String, span: Span },

    #[error("element <{name}> is not closed")]
    UnclosedElement { name: String, span: Span },

    #[error("unexpected end of input inside {context}")]
    UnexpectedEof { context: &'static str, span: Span },

    #[error("more than one top-level element; only the first is used")]
    MultipleRoots { span: Span },

    #[error("text outside the root element")]
    TextOutsideRoot { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::StrayLessThan { span }
            | ParseError::UnexpectedCharacter { span, .. }
            | ParseError::UnterminatedTag { span, .. }
            | ParseError::ExpectedTagEnd { span, .. }
            | ParseError::MissingAttributeValue { span, .. }
            | ParseError::UnquotedAttributeValue { span, .. }
            | ParseError::DuplicateAttribute { span, .. }
            | ParseError::UnknownEntity { span, .. }
            | ParseError::UnterminatedEntity { span }
            | ParseError::EmptyEndTag { span }
            | ParseError::UnmatchedEndTag { span, .. }
            | ParseError::UnclosedElement { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::MultipleRoots { span }
            | ParseError::TextOutsideRoot { span } => *span,
        }
    }

    /// Problems the tree still represents faithfully are warnings.
    pub fn severity(&self) -> Severity {
        match self {
            ParseError::UnquotedAttributeValue { .. } | ParseError::MissingAttributeValue { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(error: ParseError) -> Self {
        Diagnostic {
            span: error.span(),
            message: error.to_string(),
            severity: error.severity(),
            kind: DiagnosticKind::Syntax,
            cause: None,
        }
    }
}
