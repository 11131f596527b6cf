//! Session orchestrator tests
//!
//! Backed by the tiny script language in [`support`], which plays the role
//! of the real language front-end and execution engine.

mod support;
