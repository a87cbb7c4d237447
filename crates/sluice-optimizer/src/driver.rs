//! The fixed optimization pipeline.
//!
//! Stages run in this order, each wrapped in `attempt` so a stage that
//! matches nothing is a no-op:
//!
//! 1. `par_do_fuse` (first pass)
//! 2. `flatten_split`
//! 3. `flatten_sink`
//! 4. `flatten_fuse`
//! 5. `combine_to_par_do`, then flatten re-normalisation of what it produced
//! 6. `par_do_fuse` (second pass)
//! 7. `group_by_key_split`
//! 8. `combine_split`
//! 9. `par_do_fuse_barrier`

use std::collections::HashSet;
use std::sync::Arc;

use sluice_core::config::OptimizerConfig;
use sluice_core::error::Result;
use sluice_core::graph::Graph;
use sluice_core::hash::fingerprint;
use sluice_core::id::NodeId;
use sluice_rewrite::{
    attempt, everywhere, everywhere_shared, repeat_with_measure, rewrite, seq, top_down_once,
    BoxStrategy, RewriteStats, Rewriter,
};

use crate::measure::{flatten_occurrences, flatten_sink_measure, par_do_occurrences};
use crate::report::{OptimizeReport, StageRecord};
use crate::rules::{
    combine_split, combine_to_par_do, flatten_fuse, flatten_sink, flatten_split,
    group_by_key_split, par_do_fuse, par_do_fuse_barrier, OutputSet,
};
use crate::verify;

/// One named step of the pipeline.
pub struct Stage {
    pub name: &'static str,
    pub strategy: BoxStrategy,
}

impl Stage {
    fn new(name: &'static str, strategy: BoxStrategy) -> Self {
        Self { name, strategy }
    }
}

fn fuse_pass(outputs: &OutputSet) -> BoxStrategy {
    Box::new(attempt(repeat_with_measure(
        top_down_once(par_do_fuse(outputs.clone())),
        par_do_occurrences,
    )))
}

fn sink_pass() -> BoxStrategy {
    Box::new(repeat_with_measure(
        top_down_once(flatten_sink()),
        flatten_sink_measure,
    ))
}

fn fuse_flatten_pass() -> BoxStrategy {
    Box::new(repeat_with_measure(
        top_down_once(flatten_fuse()),
        flatten_occurrences,
    ))
}

/// The nine stages for one call, bound to that call's output origins.
pub fn stages(outputs: &OutputSet) -> Vec<Stage> {
    vec![
        Stage::new("par_do_fuse_1", fuse_pass(outputs)),
        Stage::new("flatten_split", Box::new(attempt(everywhere(flatten_split())))),
        Stage::new("flatten_sink", Box::new(attempt(sink_pass()))),
        Stage::new("flatten_fuse", Box::new(attempt(fuse_flatten_pass()))),
        // A lowered Combine can leave a ParallelDo over a Flatten or a
        // Flatten under a Flatten; both shapes are normalised again here.
        Stage::new(
            "combine_to_par_do",
            Box::new(attempt(seq(
                everywhere(combine_to_par_do()),
                seq(sink_pass(), fuse_flatten_pass()),
            ))),
        ),
        Stage::new("par_do_fuse_2", fuse_pass(outputs)),
        Stage::new(
            "group_by_key_split",
            Box::new(attempt(everywhere(group_by_key_split()))),
        ),
        Stage::new("combine_split", Box::new(attempt(everywhere(combine_split())))),
        Stage::new(
            "par_do_fuse_barrier",
            Box::new(attempt(everywhere_shared(par_do_fuse_barrier(outputs.clone())))),
        ),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Rewrite the graph reachable from `outputs` and return the new outputs,
    /// same length and order. The caller's old ids stay valid but describe the
    /// unoptimized graph.
    pub fn optimize(&self, graph: &mut Graph, outputs: &[NodeId]) -> Vec<NodeId> {
        self.run(graph, outputs, |_| {})
    }

    /// `optimize`, also returning a report with fingerprints and per-stage
    /// rule statistics.
    pub fn optimize_with_report(
        &self,
        graph: &mut Graph,
        outputs: &[NodeId],
    ) -> Result<(Vec<NodeId>, OptimizeReport)> {
        let mut report = OptimizeReport::new(
            fingerprint(graph, outputs)?,
            graph.reachable(outputs).len(),
        );
        let roots = self.run(graph, outputs, |record| report.stages.push(record));
        let report = report.finish(fingerprint(graph, &roots)?, graph.reachable(&roots).len());
        Ok((roots, report))
    }

    fn run(
        &self,
        graph: &mut Graph,
        outputs: &[NodeId],
        mut on_stage: impl FnMut(StageRecord),
    ) -> Vec<NodeId> {
        let origins: OutputSet = Arc::new(
            outputs
                .iter()
                .map(|&o| graph.origin(o))
                .collect::<HashSet<_>>(),
        );
        let mut cx = Rewriter::new(graph, self.config.clone());
        let mut roots = outputs.to_vec();

        for stage in stages(&origins) {
            let next = rewrite(&stage.strategy, &mut cx, &roots);
            let RewriteStats { matches, passes } = cx.take_stats();
            let changed = next != roots;
            tracing::debug!(
                stage = stage.name,
                changed,
                matches = matches.values().sum::<usize>(),
                "optimizer stage done"
            );
            on_stage(StageRecord {
                name: stage.name.to_string(),
                changed,
                matches,
                passes,
            });
            roots = next;
        }

        if self.config.verify_result {
            if let Err(e) = verify::check_all(cx.graph(), &roots) {
                panic!("optimized graph violates its guarantees: {e}");
            }
        }
        roots
    }
}

/// `Optimizer::default().optimize(graph, outputs)`.
pub fn optimize(graph: &mut Graph, outputs: &[NodeId]) -> Vec<NodeId> {
    Optimizer::default().optimize(graph, outputs)
}

/// Deep copy of the subgraph reachable from `node`, sharing nothing with it.
pub fn duplicate(graph: &mut Graph, node: NodeId) -> NodeId {
    graph.duplicate(node)
}
