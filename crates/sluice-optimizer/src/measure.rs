//! Decreasing measures for the repeated stages.
//!
//! All counts are over path occurrences (a node reachable along two paths
//! counts twice), computed by one memoised pass over the DAG. Occurrence
//! counts match how the traversals rewrite, so each changing pass of the
//! corresponding rule lowers its measure by at least one.

use std::collections::HashMap;

use sluice_core::graph::{Graph, NodeKind};
use sluice_core::id::NodeId;

fn occurrences(graph: &Graph, roots: &[NodeId], kind: NodeKind) -> usize {
    fn go(graph: &Graph, id: NodeId, kind: NodeKind, memo: &mut HashMap<NodeId, usize>) -> usize {
        if let Some(&n) = memo.get(&id) {
            return n;
        }
        let own = usize::from(graph.kind(id) == kind);
        let n = graph
            .children(id)
            .iter()
            .fold(own, |acc, &c| acc.saturating_add(go(graph, c, kind, memo)));
        memo.insert(id, n);
        n
    }
    let mut memo = HashMap::new();
    roots
        .iter()
        .fold(0usize, |acc, &r| acc.saturating_add(go(graph, r, kind, &mut memo)))
}

/// `parDoFuse`: ParallelDo occurrences. A fusion replaces two with one.
pub fn par_do_occurrences(graph: &Graph, roots: &[NodeId]) -> usize {
    occurrences(graph, roots, NodeKind::ParallelDo)
}

/// `flattenFuse`: Flatten occurrences. Each inlined Flatten disappears.
pub fn flatten_occurrences(graph: &Graph, roots: &[NodeId]) -> usize {
    occurrences(graph, roots, NodeKind::Flatten)
}

/// `flattenSink`: sum over ParallelDo occurrences of the Flatten occurrences
/// beneath each one. Sinking a ParallelDo through a Flatten moves that
/// Flatten above it, so the sinking node's term drops by one and no other
/// term grows.
pub fn flatten_sink_measure(graph: &Graph, roots: &[NodeId]) -> usize {
    // (flattens in subtree, measure of subtree)
    fn go(graph: &Graph, id: NodeId, memo: &mut HashMap<NodeId, (usize, usize)>) -> (usize, usize) {
        if let Some(&n) = memo.get(&id) {
            return n;
        }
        let mut flattens = usize::from(graph.kind(id) == NodeKind::Flatten);
        let mut below = 0usize;
        let mut measure = 0usize;
        for &c in graph.children(id) {
            let (f, m) = go(graph, c, memo);
            below = below.saturating_add(f);
            measure = measure.saturating_add(m);
        }
        flattens = flattens.saturating_add(below);
        if graph.kind(id) == NodeKind::ParallelDo {
            measure = measure.saturating_add(below);
        }
        memo.insert(id, (flattens, measure));
        (flattens, measure)
    }
    let mut memo = HashMap::new();
    roots
        .iter()
        .fold(0usize, |acc, &r| acc.saturating_add(go(graph, r, &mut memo).1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::func::DoFn;
    use sluice_core::types::ElemType;

    fn ident() -> DoFn {
        DoFn::map("id", ElemType::Int64, ElemType::Int64, |v| v.clone())
    }

    #[test]
    fn test_shared_nodes_count_per_occurrence() {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let p = g.parallel_do(a, ident()).unwrap();
        let f = g.flatten(vec![p, p]).unwrap();
        assert_eq!(par_do_occurrences(&g, &[f]), 2);
        assert_eq!(flatten_occurrences(&g, &[f]), 1);
        assert_eq!(par_do_occurrences(&g, &[f, p]), 3);
    }

    #[test]
    fn test_sink_measure_counts_flattens_below_par_dos() {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let b = g.load("mem://b", ElemType::Int64);
        let inner = g.flatten(vec![a, b]).unwrap();
        let outer = g.flatten(vec![inner, a]).unwrap();
        let p = g.parallel_do(outer, ident()).unwrap();
        let q = g.parallel_do(p, ident()).unwrap();
        // p sees 2 flattens, q sees the same 2
        assert_eq!(flatten_sink_measure(&g, &[q]), 4);
        assert_eq!(flatten_sink_measure(&g, &[a]), 0);
    }
}
