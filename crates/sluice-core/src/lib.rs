#![forbid(unsafe_code)]
//! sluice-core: the graph model shared by the rewrite engine, the optimizer
//! and the reference interpreter.
//!
//! Contents:
//! - strongly-typed node ids and an append-only arena `Graph`
//! - the closed node taxonomy (`Load`, `Return`, `Op`, `ParallelDo`,
//!   `GroupByKey`, `Combine`, `Flatten`, `Materialize`)
//! - dynamically-typed element values plus type-erased functions
//! - structural fingerprints, explain rendering and optimizer config
//!
//! No I/O and no runtime in here. Sources and sinks are opaque handles.

pub mod config;
pub mod error;
pub mod explain;
pub mod func;
pub mod graph;
pub mod handle;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::OptimizerConfig;
pub use error::{Error, Result};
pub use graph::{ConsumerIndex, Graph, Node, NodeKind};
pub use id::NodeId;
