use crate::parser::ParsedDocument;
use crate::span::Span;

/// Rebuilds the source text from the spans recorded in a parsed document:
/// start tags, text, comments, end tags and skipped ranges.
///
/// Clones made after parsing are ignored, so the result only depends on what
/// the tokenizer saw. For well-formed input the result equals `source`.
pub fn reassemble(source: &str, doc: &ParsedDocument) -> String {
    let mut spans: Vec<Span> = doc
        .arena
        .iter()
        .filter(|(_, node)| node.origin.is_none())
        .map(|(_, node)| node.span)
        .chain(doc.skipped.iter().copied())
        .collect();
    spans.sort_by_key(|span| span.offset);

    let mut output = String::with_capacity(source.len());
    let mut last_end = 0;
    for span in spans {
        // Overlaps only happen around recovered input; keep the first copy.
        let start = span.offset.max(last_end);
        let end = span.end().min(source.len());
        if start >= end {
            continue;
        }
        if let Some(text) = source.get(start..end) {
            output.push_str(text);
            last_end = end;
        }
    }
    output
}

/// Byte ranges of `source` no recorded span covers.
pub fn uncovered(source: &str, doc: &ParsedDocument) -> Vec<std::ops::Range<usize>> {
    let mut spans: Vec<Span> = doc
        .arena
        .iter()
        .filter(|(_, node)| node.origin.is_none())
        .map(|(_, node)| node.span)
        .chain(doc.skipped.iter().copied())
        .collect();
    spans.sort_by_key(|span| span.offset);

    let mut gaps = Vec::new();
    let mut cursor = 0;
    for span in spans {
        if span.offset > cursor {
            gaps.push(cursor..span.offset);
        }
        cursor = cursor.max(span.end());
    }
    if cursor < source.len() {
        gaps.push(cursor..source.len());
    }
    gaps
}
