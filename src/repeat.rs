//! Repeat-execution policy
//!
//! Governs whether the evaluation backend may execute a line that is already
//! present in its history. The policy type lives in the core so every backend
//! applies identical rules, but enforcement happens inside the backend's
//! `eval`; the session only surfaces the resulting history mismatch as a
//! typed error.

use crate::history::{CodeLine, LineHistory};

/// Rule set for re-evaluating already-evaluated lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatingMode {
    /// Every line evaluates exactly once, in increasing order.
    #[default]
    Never,
    /// Only the single most-recently-evaluated line may run again.
    MostRecentOnly,
    /// Any line still present in the history may run again, in any order.
    /// Re-running an older line does not re-run lines that depended on it.
    AnyPrevious,
}

/// Outcome of checking a line against the evaluation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDecision {
    /// A new line, beyond the current history tip; record it on success.
    Advance,
    /// An admissible re-run of a recorded line; do not record it again.
    Replay,
    /// The policy rejects this line.
    Mismatch,
}

impl RepeatingMode {
    /// Decide whether `line` may be evaluated given the lines already in
    /// `history`.
    pub fn admits(
        &self,
        history: &LineHistory,
        line: &CodeLine,
    ) -> ReplayDecision {
        let tip = history.last().map(|l| l.number).unwrap_or(0);
        if line.number > tip {
            return ReplayDecision::Advance;
        }
        match self {
            RepeatingMode::Never => ReplayDecision::Mismatch,
            RepeatingMode::MostRecentOnly => {
                if history.last() == Some(line) {
                    ReplayDecision::Replay
                } else {
                    ReplayDecision::Mismatch
                }
            }
            RepeatingMode::AnyPrevious => {
                if history.contains(line) {
                    ReplayDecision::Replay
                } else {
                    ReplayDecision::Mismatch
                }
            }
        }
    }
}
