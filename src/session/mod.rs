//! Session orchestrator
//!
//! [`ReplSession`] owns the line counter, the session classpath ledger and
//! the two stage backends, and keeps the backends' history ledgers aligned.
//! All state lives behind a single `parking_lot::RwLock`, write-acquired for
//! the full duration of every mutating call; concurrent callers serialize,
//! they do not interleave. The backends are not safe under concurrent
//! mutation, and partial interleaving between the compile and evaluation
//! ledgers is exactly the desync the reset protocol treats as fatal.
//!
//! [`ReplSession::compile_and_eval`] is the only entry point that is atomic
//! end-to-end; the individually exposed `compile` and `eval` are retained
//! for compile-now/evaluate-later flows and are unsafe under concurrent
//! multi-step use.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{ReplError, ReplResult};
use crate::history::CodeLine;
use crate::stage::{CompiledUnit, ReplCompiler, ReplEvaluator};

pub mod delayed;

pub use delayed::DelayedEvaluation;

#[cfg(test)]
mod tests;

/// Session construction parameters.
///
/// `initial_classpath` is the resource locator set supplied by the
/// dependency-discovery collaborator; the session only appends to it
/// afterwards. `default_args` is the execution argument vector used when a
/// call supplies no override.
#[derive(Debug, Clone)]
pub struct SessionConfig<Args> {
    /// Initial classpath ledger contents
    pub initial_classpath: Vec<PathBuf>,
    /// Default execution arguments
    pub default_args: Option<Args>,
}

impl<Args> Default for SessionConfig<Args> {
    fn default() -> Self {
        Self {
            initial_classpath: Vec::new(),
            default_args: None,
        }
    }
}

/// Result of a completeness check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    /// The checked line
    pub code_line: CodeLine,
    /// True if the fragment is self-contained
    pub is_complete: bool,
}

/// Result of a successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome<V> {
    /// The evaluated line
    pub code_line: CodeLine,
    /// Produced value, `None` for a unit result
    pub value: Option<V>,
}

/// Everything guarded by the session lock.
struct SessionState<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    line_number: u64,
    compiler: C,
    evaluator: E,
    classpath: Vec<PathBuf>,
    default_args: Option<E::Args>,
    closed: bool,
}

impl<C, E> SessionState<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    fn ensure_open(&self) -> ReplResult<()> {
        if self.closed {
            Err(ReplError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn next_code_line(
        &mut self,
        code: String,
    ) -> CodeLine {
        self.line_number += 1;
        CodeLine::new(self.line_number, code)
    }

    fn compile(
        &mut self,
        code_line: &CodeLine,
    ) -> ReplResult<CompiledUnit<C::Artifact>> {
        self.ensure_open()?;
        debug!(line = code_line.number, "compiling line");
        self.compiler.compile(code_line).into_result()
    }

    /// Evaluate `unit` with fully resolved `args`. When `realign` is set, a
    /// runtime failure rolls the compile history back to the last completed
    /// evaluation line before the error propagates; the detached path skips
    /// this because it never touches the compile ledger.
    fn eval(
        &mut self,
        unit: &CompiledUnit<C::Artifact>,
        args: Option<E::Args>,
        realign: bool,
    ) -> ReplResult<EvalOutcome<E::Value>> {
        debug!(line = unit.code_line.number, "evaluating line");
        match self.evaluator.eval(unit, args.as_ref()).into_result() {
            Ok(value) => {
                self.classpath
                    .extend(unit.classpath_addendum.iter().cloned());
                Ok(EvalOutcome {
                    code_line: unit.code_line.clone(),
                    value,
                })
            }
            Err(ReplError::Runtime {
                message,
                completed_history,
            }) => {
                if realign {
                    let tip = completed_history.last().map(|l| l.number).unwrap_or(0);
                    debug!(
                        line = unit.code_line.number,
                        tip, "runtime failure, rolling compile history back"
                    );
                    self.compiler.reset_to_line(tip);
                }
                Err(ReplError::Runtime {
                    message,
                    completed_history,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn compile_and_eval(
        &mut self,
        code_line: CodeLine,
        args: Option<E::Args>,
    ) -> ReplResult<EvalOutcome<E::Value>> {
        let unit = self.compile(&code_line)?;
        let args = args.or_else(|| self.default_args.clone());
        self.eval(&unit, args, true)
    }

    fn reset_to_line(
        &mut self,
        line_number: u64,
    ) -> ReplResult<Vec<CodeLine>> {
        self.ensure_open()?;
        debug!(line_number, "resetting session");
        self.line_number = line_number;
        let removed_compile = self.compiler.reset_to_line(line_number);
        let removed_eval = self.evaluator.reset_to_line(line_number);

        for (compiled, evaluated) in removed_compile.iter().zip(removed_eval.iter()) {
            if compiled != evaluated {
                warn!(
                    line = compiled.number,
                    "compile and evaluation histories diverged on reset"
                );
                return Err(ReplError::HistoryDesync {
                    line_number: compiled.number,
                });
            }
        }

        // Both suffixes are proven equal over their overlap; report the
        // compile side, which covers lines compiled but never evaluated.
        Ok(removed_compile)
    }
}

/// Interactive, incremental evaluation session.
///
/// Generic over a compile stage `C` and an evaluation stage `E` that accepts
/// `C`'s artifacts. Cloning shares the underlying session; clones serialize
/// through the same lock.
pub struct ReplSession<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    state: Arc<RwLock<SessionState<C, E>>>,
}

impl<C, E> Clone for ReplSession<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C, E> ReplSession<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    /// Open a session over the given backends.
    pub fn new(
        compiler: C,
        evaluator: E,
        config: SessionConfig<E::Args>,
    ) -> Self {
        debug!(
            classpath_entries = config.initial_classpath.len(),
            "opening session"
        );
        Self {
            state: Arc::new(RwLock::new(SessionState {
                line_number: 0,
                compiler,
                evaluator,
                classpath: config.initial_classpath,
                default_args: config.default_args,
                closed: false,
            })),
        }
    }

    /// Reserve the next sequence number and wrap `code` in a [`CodeLine`].
    ///
    /// The counter advances even if the returned line is never compiled.
    pub fn next_code_line(
        &self,
        code: impl Into<String>,
    ) -> CodeLine {
        self.state.write().next_code_line(code.into())
    }

    /// Ask the compile stage whether `code_line` is a complete fragment,
    /// without committing it to any history.
    pub fn check(
        &self,
        code_line: &CodeLine,
    ) -> ReplResult<CheckResult> {
        let mut state = self.state.write();
        state.ensure_open()?;
        let is_complete = state.compiler.check(code_line).into_result()?;
        Ok(CheckResult {
            code_line: code_line.clone(),
            is_complete,
        })
    }

    /// Compile `code_line`, committing it to the compile history.
    ///
    /// Unsafe under concurrent multi-step use: another caller may compile or
    /// reset between this call and a later [`eval`](Self::eval). Prefer
    /// [`compile_and_eval`](Self::compile_and_eval) unless the unit is
    /// evaluated later (see [`delayed_evaluation`](Self::delayed_evaluation)).
    pub fn compile(
        &self,
        code_line: CodeLine,
    ) -> ReplResult<CompiledUnit<C::Artifact>> {
        self.state.write().compile(&code_line)
    }

    /// Execute a compiled unit.
    ///
    /// On a runtime failure the compile history is rolled back to the last
    /// completed evaluation line before the error propagates, so the two
    /// ledgers stay aligned. Subject to the same concurrency caveat as
    /// [`compile`](Self::compile).
    pub fn eval(
        &self,
        unit: &CompiledUnit<C::Artifact>,
        args_override: Option<E::Args>,
    ) -> ReplResult<EvalOutcome<E::Value>> {
        let mut state = self.state.write();
        let args = args_override.or_else(|| state.default_args.clone());
        state.eval(unit, args, true)
    }

    /// Number, compile and evaluate `code` under one lock acquisition.
    ///
    /// This is the only entry point guaranteed atomic end-to-end.
    pub fn compile_and_eval(
        &self,
        code: impl Into<String>,
        args_override: Option<E::Args>,
    ) -> ReplResult<EvalOutcome<E::Value>> {
        let mut state = self.state.write();
        let code_line = state.next_code_line(code.into());
        state.compile_and_eval(code_line, args_override)
    }

    /// Compile and evaluate an already numbered line under one lock
    /// acquisition.
    pub fn compile_and_eval_line(
        &self,
        code_line: CodeLine,
        args_override: Option<E::Args>,
    ) -> ReplResult<EvalOutcome<E::Value>> {
        self.state.write().compile_and_eval(code_line, args_override)
    }

    /// Reset the session to `line_number`, dropping every later line from
    /// both histories.
    ///
    /// Returns the removed lines. The suffixes removed by the two backends
    /// are cross-checked positionally; any divergence yields
    /// [`ReplError::HistoryDesync`] and the session should be discarded.
    pub fn reset_to_line(
        &self,
        line_number: u64,
    ) -> ReplResult<Vec<CodeLine>> {
        self.state.write().reset_to_line(line_number)
    }

    /// Reset the session back to the given line (see
    /// [`reset_to_line`](Self::reset_to_line)).
    pub fn reset_to(
        &self,
        code_line: &CodeLine,
    ) -> ReplResult<Vec<CodeLine>> {
        self.reset_to_line(code_line.number)
    }

    /// Snapshot of the compile history
    pub fn compilation_history(&self) -> Vec<CodeLine> {
        self.state.read().compiler.compilation_history()
    }

    /// Snapshot of the evaluation history
    pub fn evaluation_history(&self) -> Vec<CodeLine> {
        self.state.read().evaluator.evaluation_history()
    }

    /// Snapshot of the classpath ledger as grown by evaluations
    pub fn current_classpath(&self) -> Vec<PathBuf> {
        self.state.read().classpath.clone()
    }

    /// Current default execution arguments
    pub fn default_args(&self) -> Option<E::Args> {
        self.state.read().default_args.clone()
    }

    /// Replace the default execution arguments
    pub fn set_default_args(
        &self,
        args: Option<E::Args>,
    ) {
        self.state.write().default_args = args;
    }

    /// Detach `unit` for later evaluation.
    ///
    /// The handle shares the session lock and classpath ledger and snapshots
    /// the current default arguments; it stays usable after
    /// [`close`](Self::close) since it never needs the compile stage.
    pub fn delayed_evaluation(
        &self,
        unit: CompiledUnit<C::Artifact>,
    ) -> DelayedEvaluation<C, E> {
        let default_args = self.state.read().default_args.clone();
        DelayedEvaluation::new(Arc::clone(&self.state), unit, default_args)
    }

    /// Release compile stage resources. Idempotent.
    ///
    /// Later `check`/`compile`/`reset_to_line` calls fail with
    /// [`ReplError::SessionClosed`]; evaluation of already compiled units
    /// keeps working as long as the evaluation backend remains valid.
    pub fn close(&self) {
        let mut state = self.state.write();
        if !state.closed {
            debug!("closing session");
            state.compiler.close();
            state.closed = true;
        }
    }
}
