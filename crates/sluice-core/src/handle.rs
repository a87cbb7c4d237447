//! Opaque source/sink handles referenced by `Load` and `Materialize` nodes.
//!
//! The optimizer never opens or closes anything; it only carries these around
//! and includes them in fingerprints. Execution layers interpret the uri.

use serde::{Deserialize, Serialize};

use crate::types::ElemType;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceHandle {
    /// e.g. `mem://clicks` or `file:///data/clicks-*.jsonl`
    pub uri: String,
    /// Type of every record the source yields.
    pub elem: ElemType,
}

impl SourceHandle {
    pub fn new(uri: impl Into<String>, elem: ElemType) -> Self {
        Self {
            uri: uri.into(),
            elem,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SinkHandle {
    pub uri: String,
    pub format: String,
}

impl SinkHandle {
    pub fn new(uri: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            format: format.into(),
        }
    }
}
