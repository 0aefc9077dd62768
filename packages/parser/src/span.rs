use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Source location attached to every token, node and diagnostic.
///
/// `line` and `column` are 1-based; `column` counts characters, not bytes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(offset: usize, line: usize, column: usize, length: usize) -> Self {
        Self {
            offset,
            line,
            column,
            length,
        }
    }

    /// Zero-length span at the start of a document.
    pub fn origin() -> Self {
        Self::new(0, 1, 1, 0)
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Zero-length span right after this one (same line assumed).
    pub fn at_end(&self) -> Span {
        Span::new(self.end(), self.line, self.column + self.length, 0)
    }

    /// Narrows the span to `range`, given as byte offsets into `text`, the
    /// source text this span covers. Line and column are recomputed.
    pub fn narrow(&self, text: &str, range: Range<usize>) -> Span {
        let start = range.start.min(text.len());
        let end = range.end.clamp(start, text.len());
        let Some(prefix) = text.get(..start) else {
            return *self;
        };
        let mut line = self.line;
        let mut column = self.column;
        for ch in prefix.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Span::new(self.offset + start, line, column, end - start)
    }

    /// Smallest span covering both (line/column of the earlier one).
    pub fn join(&self, other: &Span) -> Span {
        let (first, _) = if self.offset <= other.offset {
            (self, other)
        } else {
            (other, self)
        };
        let end = self.end().max(other.end());
        Span::new(first.offset, first.line, first.column, end - first.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_tracks_lines() {
        let text = "ab\ncd";
        let span = Span::new(10, 3, 5, text.len());
        let inner = span.narrow(text, 4..5);
        assert_eq!(inner, Span::new(14, 4, 2, 1));
    }

    #[test]
    fn join_orders_spans() {
        let a = Span::new(5, 1, 6, 2);
        let b = Span::new(1, 1, 2, 1);
        assert_eq!(a.join(&b), Span::new(1, 1, 2, 6));
    }
}
