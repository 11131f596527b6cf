//! Session error taxonomy and backend response translation
//!
//! Every backend response variant is translated at the session boundary into
//! exactly one member of [`ReplError`]; none are swallowed. Only
//! [`ReplError::Runtime`] triggers a corrective action (compile-history
//! rollback, performed by the session); all other errors leave the session
//! state untouched and resumable, except [`ReplError::HistoryDesync`] which
//! marks the session as no longer trustworthy.

use thiserror::Error;

use crate::history::{CodeLine, SourceLocation};
use crate::stage::{CheckResponse, CompileResponse, CompiledUnit, EvalResponse};

/// Session result
pub type ReplResult<T> = Result<T, ReplError>;

/// Session errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplError {
    /// Syntax or semantic error, from the compile stage or detected at
    /// link/load time by the evaluation stage
    #[error("compile error at {location}: {message}")]
    Compile {
        message: String,
        location: SourceLocation,
    },

    /// The fragment is not self-contained; recoverable by appending more text
    #[error("incomplete input")]
    IncompleteInput,

    /// Ordering or repeat-policy violation; a caller error, never retried
    /// automatically
    #[error("history mismatch at line {line_number}")]
    HistoryMismatch { line_number: u64 },

    /// The compile and evaluation histories diverged on reset; the session
    /// must be discarded
    #[error("history desync at line {line_number}: compile and evaluation histories diverged, session is no longer usable")]
    HistoryDesync { line_number: u64 },

    /// The executed code itself failed. The session re-aligns the compile
    /// history with `completed_history` before propagating this.
    #[error("runtime error: {message}")]
    Runtime {
        message: String,
        /// Evaluation history at the time of the failure
        completed_history: Vec<CodeLine>,
    },

    /// The session was closed
    #[error("session is closed")]
    SessionClosed,
}

impl CheckResponse {
    /// Translate into `Ok(is_complete)` or a [`ReplError::Compile`].
    pub fn into_result(self) -> ReplResult<bool> {
        match self {
            CheckResponse::Ok => Ok(true),
            CheckResponse::Incomplete => Ok(false),
            CheckResponse::Error { message, location } => {
                Err(ReplError::Compile { message, location })
            }
        }
    }
}

impl<A> CompileResponse<A> {
    /// Translate into a compiled unit or the matching [`ReplError`].
    pub fn into_result(self) -> ReplResult<CompiledUnit<A>> {
        match self {
            CompileResponse::Compiled(unit) => Ok(unit),
            CompileResponse::Incomplete => Err(ReplError::IncompleteInput),
            CompileResponse::Error {
                message, location, ..
            } => Err(ReplError::Compile { message, location }),
            CompileResponse::HistoryMismatch { line_number, .. } => {
                Err(ReplError::HistoryMismatch { line_number })
            }
        }
    }
}

impl<V> EvalResponse<V> {
    /// Translate into `Ok(Some(value))`, `Ok(None)` for a unit result, or
    /// the matching [`ReplError`].
    pub fn into_result(self) -> ReplResult<Option<V>> {
        match self {
            EvalResponse::UnitValue { .. } => Ok(None),
            EvalResponse::Value { value, .. } => Ok(Some(value)),
            EvalResponse::CompileTimeError {
                message, location, ..
            } => Err(ReplError::Compile { message, location }),
            EvalResponse::RuntimeError {
                message,
                completed_history,
            } => Err(ReplError::Runtime {
                message,
                completed_history,
            }),
            EvalResponse::Incomplete { .. } => Err(ReplError::IncompleteInput),
            EvalResponse::HistoryMismatch { line_number, .. } => {
                Err(ReplError::HistoryMismatch { line_number })
            }
        }
    }
}
