#![forbid(unsafe_code)]
//! sluice-exec: a deterministic, single-threaded interpreter for sluice
//! graphs.
//!
//! It exists to check the optimizer, not to be fast: every node is evaluated
//! once, fully in memory, in dependency order. Sources are bound by uri to
//! in-memory record vectors and sinks are collected into the run output.

pub mod runtime;

pub use runtime::{Bindings, Engine, ExecError, RunOutput};
