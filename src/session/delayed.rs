//! Detached evaluation handles
//!
//! A [`DelayedEvaluation`] carries a compiled unit out of the live session:
//! compile once, persist or cache the unit, evaluate many times later,
//! possibly after the originating session closed. It retains the shared
//! session lock and classpath ledger plus a snapshot of the default
//! arguments, but never touches the compile history; repeat-policy
//! enforcement is whatever the evaluation backend decides against its own
//! ledger.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{EvalOutcome, SessionState};
use crate::error::ReplResult;
use crate::history::CodeLine;
use crate::stage::{CompiledUnit, ReplCompiler, ReplEvaluator};

/// A compiled unit detached from the live session, evaluable on demand.
pub struct DelayedEvaluation<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    state: Arc<RwLock<SessionState<C, E>>>,
    unit: CompiledUnit<C::Artifact>,
    default_args: Option<E::Args>,
}

impl<C, E> DelayedEvaluation<C, E>
where
    C: ReplCompiler,
    E: ReplEvaluator<Artifact = C::Artifact>,
{
    pub(super) fn new(
        state: Arc<RwLock<SessionState<C, E>>>,
        unit: CompiledUnit<C::Artifact>,
        default_args: Option<E::Args>,
    ) -> Self {
        Self {
            state,
            unit,
            default_args,
        }
    }

    /// The line this handle evaluates
    pub fn code_line(&self) -> &CodeLine {
        &self.unit.code_line
    }

    /// The detached compiled unit
    pub fn unit(&self) -> &CompiledUnit<C::Artifact> {
        &self.unit
    }

    /// Execute the detached unit under the shared session lock.
    ///
    /// Appends the unit's classpath addendum to the shared ledger on
    /// success, exactly like the attached path. Does not consult or roll
    /// back the compile history.
    pub fn eval(
        &self,
        args_override: Option<E::Args>,
    ) -> ReplResult<EvalOutcome<E::Value>> {
        let args = args_override.or_else(|| self.default_args.clone());
        self.state.write().eval(&self.unit, args, false)
    }
}
