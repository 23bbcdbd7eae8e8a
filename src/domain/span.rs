//! Source locations carried by every tree node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `file:line:column` range in the original translation unit.
///
/// Lines and columns are 1-based. A span whose end is not known has its end
/// equal to its start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub end_column: u32,
}

impl SourceSpan {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    pub fn with_end(mut self, end_line: u32, end_column: u32) -> Self {
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }

    /// Span from the start of `self` to the end of `last`.
    pub fn through(&self, last: &SourceSpan) -> SourceSpan {
        let (end_line, end_column) = last.end();
        SourceSpan {
            file: self.file.clone(),
            line: self.line,
            column: self.column,
            end_line,
            end_column,
        }
    }

    pub fn start(&self) -> (u32, u32) {
        (self.line, self.column)
    }

    /// End position, falling back to the start for spans deserialized
    /// without one.
    pub fn end(&self) -> (u32, u32) {
        if (self.end_line, self.end_column) < self.start() {
            self.start()
        } else {
            (self.end_line, self.end_column)
        }
    }

    /// True if `other` lies entirely within `self`.
    pub fn contains(&self, other: &SourceSpan) -> bool {
        self.file == other.file && self.start() <= other.start() && other.end() <= self.end()
    }

    pub fn is_disjoint(&self, other: &SourceSpan) -> bool {
        self.file != other.file || self.end() < other.start() || other.end() < self.start()
    }
}

/// Renders the structured location record the way the IR text form prints
/// it: `loc("file.c":12:5)`.
impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loc(\"{}\":{}:{})", self.file, self.line, self.column)
    }
}
