//! Convenient re-exports for downstream crates.

pub use crate::config::OptimizerConfig;
pub use crate::error::{Error, Result};
pub use crate::explain::explain;
pub use crate::func::{CombineFn, DoFn, OpFn};
pub use crate::graph::{ConsumerIndex, Graph, Node, NodeKind};
pub use crate::handle::{SinkHandle, SourceHandle};
pub use crate::hash::{fingerprint, Hash256};
pub use crate::id::NodeId;
pub use crate::types::{ElemType, Value};
