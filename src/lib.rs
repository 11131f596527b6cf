//! Resettable REPL session core
//!
//! An incremental evaluation session for a compiled language: each submitted
//! fragment ("line") is compiled against all prior state, then optionally
//! executed, with the ability to roll the session back to an earlier line and
//! drop everything after it. Compilation and execution are delegated to
//! pluggable backends; this crate keeps the two backend history ledgers
//! consistent under resets, repeated execution and concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use resettable_repl::{ReplSession, SessionConfig};
//!
//! let repl = ReplSession::new(compiler, evaluator, SessionConfig::default());
//! let outcome = repl.compile_and_eval("val x = 1", None)?;
//! ```

#![warn(rust_2018_idioms)]

pub mod error;
pub mod history;
pub mod repeat;
pub mod session;
pub mod stage;
pub mod util;

// Re-exports
pub use error::{ReplError, ReplResult};
pub use history::{CodeLine, LineHistory, SourceLocation};
pub use repeat::{RepeatingMode, ReplayDecision};
pub use session::{CheckResult, DelayedEvaluation, EvalOutcome, ReplSession, SessionConfig};
pub use stage::{
    CheckResponse, CompileResponse, CompiledUnit, EvalResponse, ReplCompiler, ReplEvaluator,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
