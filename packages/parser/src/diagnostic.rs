use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Which stage found the problem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Malformed tags, entities, unclosed or mismatched elements.
    Syntax,
    /// Unknown constructs, bad arguments, failed validation, unused input.
    Semantic,
    /// A formula failed while being evaluated.
    Evaluation,
}

/// A recoverable problem pinned to a source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Error,
            kind,
            cause: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, span, message)
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}: {}: {}",
            self.span.line, self.span.column, level, self.message
        )?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

/// Ordered diagnostic list; the first diagnostic reported for a span wins.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    #[serde(skip)]
    seen: HashSet<Span>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a diagnostic for the same span was already recorded.
    pub fn push(&mut self, diagnostic: impl Into<Diagnostic>) -> bool {
        let diagnostic = diagnostic.into();
        if !self.seen.insert(diagnostic.span) {
            return false;
        }
        self.items.push(diagnostic);
        true
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in other {
            self.push(diagnostic);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(iter);
        diagnostics
    }
}

/// Pretty-print diagnostics with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_diagnostics(source: &str, filename: &str, diagnostics: &Diagnostics) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let mut output = Vec::new();

    for diagnostic in diagnostics {
        let (kind, color) = match diagnostic.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };
        let start = diagnostic.span.offset.min(source.len());
        let end = diagnostic.span.end().clamp(start, source.len());

        let mut report = Report::build(kind, filename, start)
            .with_message(&diagnostic.message)
            .with_label(
                Label::new((filename, start..end))
                    .with_color(color)
                    .with_message(&diagnostic.message),
            );
        if let Some(cause) = &diagnostic.cause {
            report = report.with_note(cause);
        }

        if report
            .finish()
            .write((filename, Source::from(source)), &mut output)
            .is_err()
        {
            break;
        }
    }

    String::from_utf8(output).unwrap_or_else(|_| "Error formatting failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_by_span() {
        let mut diagnostics = Diagnostics::new();
        let span = Span::new(3, 1, 4, 2);
        assert!(diagnostics.push(Diagnostic::error(DiagnosticKind::Syntax, span, "first")));
        assert!(!diagnostics.push(Diagnostic::warning(DiagnosticKind::Semantic, span, "second")));
        assert!(diagnostics.push(Diagnostic::warning(
            DiagnosticKind::Semantic,
            Span::new(9, 1, 10, 1),
            "third"
        )));

        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "third"]);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[cfg(feature = "pretty-errors")]
    #[test]
    fn formats_with_source_context() {
        let source = "<pattern name=\"x\">\n</patern>";
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::Syntax,
            Span::new(19, 2, 1, 9),
            "end tag </patern> does not match any open element",
        ));
        let text = format_diagnostics(source, "test.stencil", &diagnostics);
        assert!(text.contains("does not match any open element"));
    }
}
