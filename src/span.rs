//! Source position and span tracking.
//!
//! Every token produced by the reader carries a [`SourcePosition`]; every
//! [`crate::sexp::SExp`] inherits the span of its first token where feasible.

use serde::{Deserialize, Serialize};

/// A single point in source text: 1-based line/column, 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SourcePosition {
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::start()
    }
}

/// A half-open range `[start, end)` in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl Span {
    pub fn new(start: SourcePosition, end: SourcePosition) -> Self {
        Self { start, end }
    }

    /// A zero-width span at the start of the document, used for synthetic
    /// nodes that have no corresponding source text (e.g. macro-generated
    /// forms before hygiene renaming assigns them a home span).
    pub fn synthetic() -> Self {
        Self::default()
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }

    pub fn to_range(self) -> std::ops::Range<usize> {
        self.start.offset..self.end.offset
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        let len = span.end.offset.saturating_sub(span.start.offset);
        miette::SourceSpan::from((span.start.offset, len))
    }
}
