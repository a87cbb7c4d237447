//! The `Strategy` trait plus the rule and success/failure combinators.

use sluice_core::graph::Graph;
use sluice_core::id::NodeId;

use crate::rewriter::Rewriter;

/// Decreasing measure attached to a repeated strategy: evaluated over the
/// current roots, it must drop on every changing pass.
pub type Measure = fn(&Graph, &[NodeId]) -> usize;

/// A function from a node to either "no match" (`None`) or a replacement.
pub trait Strategy {
    /// Stable name used in stats, logs and panics.
    fn name(&self) -> &str;

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId>;

    /// Apply to every root. The default treats each root on its own and keeps
    /// a root the strategy fails on; traversals override this so memoised
    /// state spans all roots of one pass.
    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        roots
            .iter()
            .map(|&r| self.apply(cx, r).unwrap_or(r))
            .collect()
    }
}

pub type BoxStrategy = Box<dyn Strategy>;

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        (**self).apply(cx, id)
    }
    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        (**self).apply_all(cx, roots)
    }
}

impl<S: Strategy + ?Sized> Strategy for &S {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        (**self).apply(cx, id)
    }
    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        (**self).apply_all(cx, roots)
    }
}

// -------------------------------------------------------------------------
// rule
// -------------------------------------------------------------------------

/// A partial transformation. The closure inspects the node at `id` and, on a
/// match, allocates the replacement and returns its id. It must not allocate
/// anything when it does not match.
pub struct Rule<F> {
    name: String,
    f: F,
}

pub fn rule<F>(name: impl Into<String>, f: F) -> Rule<F>
where
    F: Fn(&mut Graph, NodeId) -> Option<NodeId>,
{
    Rule {
        name: name.into(),
        f,
    }
}

impl<F> Strategy for Rule<F>
where
    F: Fn(&mut Graph, NodeId) -> Option<NodeId>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        let out = (self.f)(cx.graph_mut(), id)?;
        cx.record_match(&self.name);
        tracing::trace!(rule = %self.name, from = id.get(), to = out.get(), "rule matched");
        Some(out)
    }
}

// -------------------------------------------------------------------------
// seq / attempt
// -------------------------------------------------------------------------

pub struct Seq<A, B> {
    name: String,
    first: A,
    second: B,
}

/// `first`, then `second` on its result. Fails if either fails.
pub fn seq<A: Strategy, B: Strategy>(first: A, second: B) -> Seq<A, B> {
    Seq {
        name: format!("{};{}", first.name(), second.name()),
        first,
        second,
    }
}

impl<A: Strategy, B: Strategy> Strategy for Seq<A, B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        let mid = self.first.apply(cx, id)?;
        self.second.apply(cx, mid)
    }

    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        let mid = self.first.apply_all(cx, roots);
        self.second.apply_all(cx, &mid)
    }
}

pub struct Attempt<S> {
    inner: S,
}

/// Never fails: the rewrite if `inner` matched, otherwise the node unchanged.
pub fn attempt<S: Strategy>(inner: S) -> Attempt<S> {
    Attempt { inner }
}

impl<S: Strategy> Strategy for Attempt<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        Some(self.inner.apply(cx, id).unwrap_or(id))
    }

    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        self.inner.apply_all(cx, roots)
    }
}

// -------------------------------------------------------------------------
// repeat
// -------------------------------------------------------------------------

pub struct Repeat<S> {
    name: String,
    inner: S,
    measure: Option<Measure>,
}

/// Apply `inner` until it fails or stops changing anything. Always succeeds.
///
/// Needing more than `OptimizerConfig::max_fixpoint_passes` changing passes
/// panics: a rule that never settles is a bug, not an input problem.
pub fn repeat<S: Strategy>(inner: S) -> Repeat<S> {
    Repeat {
        name: format!("repeat({})", inner.name()),
        inner,
        measure: None,
    }
}

/// `repeat` with a measure that must strictly decrease on every changing
/// pass. Checked when `OptimizerConfig::verify_measures` is set.
pub fn repeat_with_measure<S: Strategy>(inner: S, measure: Measure) -> Repeat<S> {
    Repeat {
        measure: Some(measure),
        ..repeat(inner)
    }
}

impl<S: Strategy> Repeat<S> {
    fn run(&self, cx: &mut Rewriter<'_>, roots: Vec<NodeId>) -> Vec<NodeId> {
        let max = cx.config().max_fixpoint_passes;
        let measure = self.measure.filter(|_| cx.config().verify_measures);
        let mut last = measure.map(|m| m(cx.graph(), &roots));
        let mut cur = roots;
        let mut passes = 0usize;

        loop {
            let next = self.inner.apply_all(cx, &cur);
            if next == cur {
                break;
            }
            passes += 1;
            assert!(
                passes <= max,
                "`{}` did not reach a fixpoint within {max} passes",
                self.name
            );
            if let (Some(m), Some(prev)) = (measure, last) {
                let now = m(cx.graph(), &next);
                assert!(
                    now < prev,
                    "measure of `{}` did not decrease on pass {passes}: {prev} -> {now}",
                    self.name
                );
                last = Some(now);
            }
            cur = next;
        }

        tracing::trace!(strategy = %self.name, passes, "fixpoint reached");
        cx.record_passes(&self.name, passes);
        cur
    }
}

impl<S: Strategy> Strategy for Repeat<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        self.run(cx, vec![id]).first().copied()
    }

    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        self.run(cx, roots.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::config::OptimizerConfig;
    use sluice_core::func::DoFn;
    use sluice_core::graph::{Node, NodeKind};
    use sluice_core::types::{ElemType, Value};

    fn step(name: &str) -> DoFn {
        DoFn::map(name, ElemType::Int64, ElemType::Int64, |v| v.clone())
    }

    /// Rewrites a ParallelDo into its input (drops one stage).
    fn drop_par_do() -> impl Strategy {
        rule("drop", |g: &mut Graph, id| match g.node(id) {
            Node::ParallelDo { input, .. } => Some(*input),
            _ => None,
        })
    }

    fn never() -> impl Strategy {
        rule("never", |_: &mut Graph, _| None)
    }

    fn chain(g: &mut Graph, n: usize) -> NodeId {
        let mut cur = g.load("mem://a", ElemType::Int64);
        for i in 0..n {
            cur = g.parallel_do(cur, step(&format!("s{i}"))).unwrap();
        }
        cur
    }

    #[test]
    fn test_rule_records_matches() {
        let mut g = Graph::new();
        let top = chain(&mut g, 1);
        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = drop_par_do().apply(&mut cx, top).unwrap();
        assert_eq!(cx.graph().kind(out), NodeKind::Load);
        assert_eq!(cx.stats().matches_of("drop"), 1);
        assert!(never().apply(&mut cx, top).is_none());
    }

    #[test]
    fn test_seq_fails_if_either_fails() {
        let mut g = Graph::new();
        let top = chain(&mut g, 2);
        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());

        let both = seq(drop_par_do(), drop_par_do());
        let out = both.apply(&mut cx, top).unwrap();
        assert_eq!(cx.graph().kind(out), NodeKind::Load);

        assert!(seq(drop_par_do(), never()).apply(&mut cx, top).is_none());
        assert!(seq(never(), drop_par_do()).apply(&mut cx, top).is_none());
    }

    #[test]
    fn test_attempt_returns_original_on_no_match() {
        let mut g = Graph::new();
        let top = chain(&mut g, 1);
        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        assert_eq!(attempt(never()).apply(&mut cx, top), Some(top));
    }

    #[test]
    fn test_repeat_runs_to_fixpoint() {
        let mut g = Graph::new();
        let top = chain(&mut g, 5);
        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = repeat(drop_par_do()).apply(&mut cx, top).unwrap();
        assert_eq!(cx.graph().kind(out), NodeKind::Load);
        assert_eq!(cx.stats().passes.get("repeat(drop)"), Some(&5));
    }

    #[test]
    fn test_repeat_stops_when_nothing_changes() {
        let mut g = Graph::new();
        let top = chain(&mut g, 1);
        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        // attempt(never) always "succeeds" with the same node
        assert_eq!(repeat(attempt(never())).apply(&mut cx, top), Some(top));
    }

    #[test]
    #[should_panic(expected = "did not reach a fixpoint")]
    fn test_repeat_panics_past_pass_bound() {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let grow = rule("grow", |g: &mut Graph, id| {
            let identity = DoFn::map("id", ElemType::Int64, ElemType::Int64, |v: &Value| v.clone());
            g.parallel_do(id, identity).ok()
        });
        let cfg = OptimizerConfig {
            max_fixpoint_passes: 8,
            ..OptimizerConfig::default()
        };
        let mut cx = Rewriter::new(&mut g, cfg);
        repeat(grow).apply(&mut cx, a);
    }

    #[test]
    #[should_panic(expected = "did not decrease")]
    fn test_repeat_checks_measure() {
        let mut g = Graph::new();
        let top = chain(&mut g, 3);
        let cfg = OptimizerConfig {
            verify_measures: true,
            ..OptimizerConfig::default()
        };
        let mut cx = Rewriter::new(&mut g, cfg);
        fn constant(_: &Graph, _: &[NodeId]) -> usize {
            7
        }
        repeat_with_measure(drop_par_do(), constant).apply(&mut cx, top);
    }
}
