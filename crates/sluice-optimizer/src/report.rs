//! Optimization report for audit and tooling.
//!
//! The driver fills one in per run: what went in, what came out, and what
//! each stage of the pipeline did on the way.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sluice_core::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,

    /// Whether any output root changed during this stage.
    pub changed: bool,

    /// Successful rule applications, by rule name.
    pub matches: BTreeMap<String, usize>,

    /// Changing passes of repeated strategies, by strategy name.
    pub passes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub id: RunId,

    /// Engine version string for provenance.
    pub engine_version: String,

    /// Structural fingerprint of the graph reachable from the input outputs.
    pub input_fingerprint: Hash256,

    /// Same, for the optimized outputs. Filled in by `finish`.
    pub output_fingerprint: Option<Hash256>,

    pub input_nodes: usize,
    pub output_nodes: usize,

    pub stages: Vec<StageRecord>,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl OptimizeReport {
    pub fn new(input_fingerprint: Hash256, input_nodes: usize) -> Self {
        let started_ms = now_ms();
        Self {
            id: RunId(Uuid::new_v4()),
            engine_version: sluice_core::VERSION.to_string(),
            input_fingerprint,
            output_fingerprint: None,
            input_nodes,
            output_nodes: input_nodes,
            stages: Vec::new(),
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, output_fingerprint: Hash256, output_nodes: usize) -> Self {
        self.output_fingerprint = Some(output_fingerprint);
        self.output_nodes = output_nodes;
        self.finished_ms = now_ms();
        self
    }

    /// Total rule applications over all stages.
    pub fn total_matches(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|s| s.matches.values())
            .sum()
    }

    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
