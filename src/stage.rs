//! Compile and evaluation stage contracts
//!
//! The session delegates actual compilation and execution to two backends: a
//! compile stage (language front-end) and an evaluation stage (execution
//! engine with isolated loading). Each call returns a tagged response; the
//! session matches every variant exhaustively, so adding a variant here
//! forces every consumer to handle it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::history::{CodeLine, SourceLocation};

/// Output of compiling one line, consumed by the evaluation stage.
///
/// Owned by the caller once produced. `artifact` is the backend-specific
/// compiled form; `classpath_addendum` lists resource locators the compiler
/// discovered while processing the line (e.g. embedded dependency
/// directives), appended to the session classpath after a successful
/// evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit<A> {
    /// The line this unit was compiled from
    pub code_line: CodeLine,
    /// Backend-specific compiled artifact
    pub artifact: A,
    /// Resource locators discovered during this compilation
    pub classpath_addendum: Vec<PathBuf>,
}

/// Response of the compile stage's completeness check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResponse {
    /// The fragment is syntactically complete
    Ok,
    /// More input is needed
    Incomplete,
    /// Hard front-end error, not mere incompleteness
    Error {
        message: String,
        location: SourceLocation,
    },
}

/// Response of the compile stage's `compile`.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileResponse<A> {
    /// The line was committed to the compile history
    Compiled(CompiledUnit<A>),
    /// The fragment is not self-contained
    Incomplete,
    /// Syntax or semantic error
    Error {
        message: String,
        location: SourceLocation,
        /// Compile history at the time of the error
        compiled_history: Vec<CodeLine>,
    },
    /// The line's number does not match the position the history expects next
    HistoryMismatch {
        line_number: u64,
        compiled_history: Vec<CodeLine>,
    },
}

/// Response of the evaluation stage's `eval`.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResponse<V> {
    /// Executed, no meaningful return value
    UnitValue { completed_history: Vec<CodeLine> },
    /// Executed, produced a value
    Value {
        value: V,
        completed_history: Vec<CodeLine>,
    },
    /// Error detected at link/load time, past the compile stage
    CompileTimeError {
        message: String,
        location: SourceLocation,
        completed_history: Vec<CodeLine>,
    },
    /// The executed code itself failed
    RuntimeError {
        message: String,
        completed_history: Vec<CodeLine>,
    },
    /// The unit is not self-contained
    Incomplete { completed_history: Vec<CodeLine> },
    /// The repeat-execution policy or ordering rejected the line
    HistoryMismatch {
        line_number: u64,
        completed_history: Vec<CodeLine>,
    },
}

/// Compile stage backend: translates lines to executable form and keeps the
/// compile history ledger.
pub trait ReplCompiler {
    /// Backend-specific compiled artifact type
    type Artifact;

    /// Report whether `line` is a syntactically complete fragment, without
    /// committing it to the history.
    fn check(
        &mut self,
        line: &CodeLine,
    ) -> CheckResponse;

    /// Compile `line` against all previously compiled lines, committing it
    /// to the history on success.
    fn compile(
        &mut self,
        line: &CodeLine,
    ) -> CompileResponse<Self::Artifact>;

    /// Drop every history entry with a number greater than `line_number` and
    /// return the removed suffix, oldest first.
    fn reset_to_line(
        &mut self,
        line_number: u64,
    ) -> Vec<CodeLine>;

    /// Read-only snapshot of the compile history
    fn compilation_history(&self) -> Vec<CodeLine>;

    /// Release compiler resources. Called once when the session closes.
    fn close(&mut self) {}
}

/// Evaluation stage backend: executes compiled units and keeps the
/// evaluation history ledger, enforcing the repeat-execution policy.
pub trait ReplEvaluator {
    /// Artifact type accepted from the compile stage
    type Artifact;
    /// Result value type produced by executed code
    type Value;
    /// Execution argument vector type
    type Args: Clone;

    /// Execute `unit`, recording its line in the evaluation history when the
    /// policy decides this is a first run.
    fn eval(
        &mut self,
        unit: &CompiledUnit<Self::Artifact>,
        args: Option<&Self::Args>,
    ) -> EvalResponse<Self::Value>;

    /// Drop every history entry with a number greater than `line_number` and
    /// return the removed suffix, oldest first.
    fn reset_to_line(
        &mut self,
        line_number: u64,
    ) -> Vec<CodeLine>;

    /// Read-only snapshot of the evaluation history
    fn evaluation_history(&self) -> Vec<CodeLine>;
}
