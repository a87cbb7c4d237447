//! Human-readable rendering of a graph, for `explain` output and debugging.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::graph::Graph;
use crate::id::NodeId;

/// Indented tree of everything reachable from `roots`.
///
/// A node already printed is shown again as `^#n` instead of being expanded,
/// so shared subgraphs stay visible as shared.
pub fn explain(graph: &Graph, roots: &[NodeId]) -> String {
    let mut out = String::new();
    let mut printed = HashSet::new();
    for (i, &r) in roots.iter().enumerate() {
        let _ = writeln!(out, "output {i}:");
        render(graph, r, 1, &mut printed, &mut out);
    }
    out
}

fn render(graph: &Graph, id: NodeId, depth: usize, printed: &mut HashSet<NodeId>, out: &mut String) {
    let indent = "  ".repeat(depth);
    if !printed.insert(id) {
        let _ = writeln!(out, "{indent}^#{}", id.get());
        return;
    }
    let _ = writeln!(
        out,
        "{indent}#{} {} : {}",
        id.get(),
        graph.node(id).label(),
        graph.elem_type(id)
    );
    for &c in graph.children(id) {
        render(graph, c, depth + 1, printed, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElemType;

    #[test]
    fn test_shared_node_printed_once() {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let f = g.flatten(vec![a, a]).unwrap();
        let text = explain(&g, &[f]);
        assert_eq!(text.matches("Load[mem://a]").count(), 1);
        assert!(text.contains("^#0"));
        assert!(text.starts_with("output 0:"));
    }
}
