//! Rewrite context: the working graph, the config, and per-rule statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sluice_core::config::OptimizerConfig;
use sluice_core::graph::Graph;
use sluice_core::id::NodeId;

use crate::strategy::Strategy;

/// Counters collected while strategies run. BTreeMaps keep report output stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteStats {
    /// Successful rule applications, by rule name.
    pub matches: BTreeMap<String, usize>,
    /// Changing passes performed by `repeat`, by strategy name.
    pub passes: BTreeMap<String, usize>,
}

impl RewriteStats {
    pub fn matches_of(&self, rule: &str) -> usize {
        self.matches.get(rule).copied().unwrap_or(0)
    }

    pub fn total_matches(&self) -> usize {
        self.matches.values().sum()
    }
}

/// Exclusive handle on the graph for the duration of a rewrite.
pub struct Rewriter<'g> {
    graph: &'g mut Graph,
    config: OptimizerConfig,
    stats: RewriteStats,
}

impl<'g> Rewriter<'g> {
    pub fn new(graph: &'g mut Graph, config: OptimizerConfig) -> Self {
        Self {
            graph,
            config,
            stats: RewriteStats::default(),
        }
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        self.graph
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }

    /// Hand back the counters collected so far and start from zero.
    pub fn take_stats(&mut self) -> RewriteStats {
        std::mem::take(&mut self.stats)
    }

    pub(crate) fn record_match(&mut self, rule: &str) {
        *self.stats.matches.entry(rule.to_string()).or_default() += 1;
    }

    pub(crate) fn record_passes(&mut self, strategy: &str, passes: usize) {
        *self.stats.passes.entry(strategy.to_string()).or_default() += passes;
    }
}

/// Apply `strategy` to a list of roots and return the rewritten roots, same
/// length and order. A root the strategy fails on comes back unchanged.
pub fn rewrite<S: Strategy + ?Sized>(
    strategy: &S,
    cx: &mut Rewriter<'_>,
    roots: &[NodeId],
) -> Vec<NodeId> {
    let out = strategy.apply_all(cx, roots);
    debug_assert_eq!(out.len(), roots.len());
    out
}
