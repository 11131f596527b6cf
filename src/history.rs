//! Code line ledger
//!
//! A session processes numbered source fragments ([`CodeLine`]). Both the
//! compile backend and the evaluation backend keep an ordered, append-only
//! record of the lines they have processed ([`LineHistory`]), truncated on
//! reset. Both ledgers use the same type so removed suffixes can be compared
//! element-by-element when the session re-synchronizes them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One submitted, sequence-numbered source fragment.
///
/// Immutable once created. Two lines are "the same line" only if both the
/// number and the source text match; the reset protocol relies on this when
/// cross-checking removed suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLine {
    /// Sequence number, assigned by the session counter (first line is 1)
    pub number: u64,
    /// Source text
    pub code: String,
}

impl CodeLine {
    /// Create a new code line
    pub fn new(
        number: u64,
        code: impl Into<String>,
    ) -> Self {
        Self {
            number,
            code: code.into(),
        }
    }
}

impl fmt::Display for CodeLine {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}: {}", self.number, self.code)
    }
}

/// Position inside a source fragment, carried by compile errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line within the fragment (0 = unknown)
    pub line: u32,
    /// 1-based column (0 = unknown)
    pub column: u32,
}

impl SourceLocation {
    /// Unknown location
    pub const NONE: SourceLocation = SourceLocation { line: 0, column: 0 };

    /// Create a location
    pub fn new(
        line: u32,
        column: u32,
    ) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if *self == Self::NONE {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Ordered, append-only record of processed lines.
///
/// Backend implementations own one of these each; the session never mutates a
/// history directly, it only asks a backend to truncate via its reset
/// operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineHistory {
    lines: Vec<CodeLine>,
}

impl LineHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processed line
    pub fn append(
        &mut self,
        line: CodeLine,
    ) {
        self.lines.push(line);
    }

    /// Most recently processed line
    pub fn last(&self) -> Option<&CodeLine> {
        self.lines.last()
    }

    /// Number of recorded lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if no line has been recorded
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True if a line with the same number and source text is recorded
    pub fn contains(
        &self,
        line: &CodeLine,
    ) -> bool {
        self.lines.iter().any(|l| l == line)
    }

    /// Sequence number a strictly-ordered backend expects next
    pub fn expected_next(&self) -> u64 {
        self.last().map(|l| l.number + 1).unwrap_or(1)
    }

    /// Copy of the recorded lines, oldest first
    pub fn snapshot(&self) -> Vec<CodeLine> {
        self.lines.clone()
    }

    /// Drop every line with a number greater than `line_number` and return
    /// the removed suffix, oldest first.
    pub fn reset_to_line(
        &mut self,
        line_number: u64,
    ) -> Vec<CodeLine> {
        let keep = self
            .lines
            .iter()
            .position(|l| l.number > line_number)
            .unwrap_or(self.lines.len());
        self.lines.split_off(keep)
    }
}
