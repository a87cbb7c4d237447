#![forbid(unsafe_code)]
//! sluice-optimizer: rewrites a pipeline graph into an equivalent,
//! execution-friendly form before it is handed to a distributed runtime.
//!
//! Design:
//! - Rules (`rules`) are partial node-to-node rewrites built on
//!   `sluice-rewrite` strategies; nothing here walks the graph by hand.
//! - The driver (`driver`) runs one fixed pipeline of rule stages over the
//!   graph reachable from the caller's outputs and returns the new outputs.
//! - `measure` holds the decreasing measures that bound every repeated stage;
//!   `verify` checks the structural guarantees of an optimized graph.
//! - `dsl` builds graphs from YAML pipelines using a named function registry.
//!
//! No cost model: every rule fires wherever its pattern matches.

pub mod driver;
pub mod dsl;
pub mod measure;
pub mod registry;
pub mod report;
pub mod rules;
pub mod verify;

pub use driver::{duplicate, optimize, Optimizer, Stage};
pub use dsl::yaml::{parse_yaml_pipeline, ParsedPipeline, PipelineConfig};
pub use registry::FunctionRegistry;
pub use report::{OptimizeReport, RunId, StageRecord};
