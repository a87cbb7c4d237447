//! Structural checks on an optimized graph.
//!
//! `check_*` return `Error::Invariant` naming the first offending node;
//! `assert_*` panic instead and are meant for tests and debug builds. All of
//! them only look at the graph reachable from the given roots.

use sluice_core::error::{Error, Result};
use sluice_core::graph::{Graph, Node, NodeKind};
use sluice_core::id::NodeId;

/// No Flatten, GroupByKey or Combine has more than one consumer edge
/// (appearances in `roots` count as consumers).
pub fn check_no_shared_kinds(graph: &Graph, roots: &[NodeId]) -> Result<()> {
    let index = graph.consumers(roots);
    for id in graph.reachable(roots) {
        let kind = graph.kind(id);
        if kind.is_exclusive() && index.is_shared(id) {
            return Err(Error::Invariant(format!(
                "{kind} {id} has {} consumers",
                index.count(id)
            )));
        }
    }
    Ok(())
}

/// No Flatten reads directly from another Flatten.
pub fn check_flatten_normal_form(graph: &Graph, roots: &[NodeId]) -> Result<()> {
    for id in graph.reachable(roots) {
        if let Node::Flatten { inputs } = graph.node(id) {
            if let Some(nested) = inputs.iter().find(|&&i| graph.kind(i) == NodeKind::Flatten) {
                return Err(Error::Invariant(format!(
                    "Flatten {id} has Flatten {nested} as an input"
                )));
            }
        }
    }
    Ok(())
}

/// Every Combine reads directly from a GroupByKey.
pub fn check_combine_placement(graph: &Graph, roots: &[NodeId]) -> Result<()> {
    for id in graph.reachable(roots) {
        if let Node::Combine { input, .. } = graph.node(id) {
            let kind = graph.kind(*input);
            if kind != NodeKind::GroupByKey {
                return Err(Error::Invariant(format!(
                    "Combine {id} reads from {kind} {input}, not a GroupByKey"
                )));
            }
        }
    }
    Ok(())
}

/// Every ParallelDo-to-ParallelDo edge has a fuse barrier on the inner node.
pub fn check_no_unbarred_par_do_chain(graph: &Graph, roots: &[NodeId]) -> Result<()> {
    for id in graph.reachable(roots) {
        if let Node::ParallelDo { input, .. } = graph.node(id) {
            if graph.node(*input).fuse_barrier() == Some(false) {
                return Err(Error::Invariant(format!(
                    "ParallelDo {id} reads from unbarred ParallelDo {input}"
                )));
            }
        }
    }
    Ok(())
}

/// Every root that is a ParallelDo has its fuse barrier set.
pub fn check_outputs_barriered(graph: &Graph, roots: &[NodeId]) -> Result<()> {
    for (i, &r) in roots.iter().enumerate() {
        if graph.node(r).fuse_barrier() == Some(false) {
            return Err(Error::Invariant(format!(
                "output {i} (ParallelDo {r}) has no fuse barrier"
            )));
        }
    }
    Ok(())
}

/// All post-conditions of `optimize`, first failure wins.
pub fn check_all(graph: &Graph, roots: &[NodeId]) -> Result<()> {
    check_no_shared_kinds(graph, roots)?;
    check_flatten_normal_form(graph, roots)?;
    check_combine_placement(graph, roots)?;
    check_no_unbarred_par_do_chain(graph, roots)?;
    check_outputs_barriered(graph, roots)?;
    Ok(())
}

pub fn assert_no_shared_kinds(graph: &Graph, roots: &[NodeId]) {
    if let Err(e) = check_no_shared_kinds(graph, roots) {
        panic!("{e}");
    }
}

pub fn assert_flatten_normal_form(graph: &Graph, roots: &[NodeId]) {
    if let Err(e) = check_flatten_normal_form(graph, roots) {
        panic!("{e}");
    }
}

pub fn assert_combine_placement(graph: &Graph, roots: &[NodeId]) {
    if let Err(e) = check_combine_placement(graph, roots) {
        panic!("{e}");
    }
}

pub fn assert_no_unbarred_par_do_chain(graph: &Graph, roots: &[NodeId]) {
    if let Err(e) = check_no_unbarred_par_do_chain(graph, roots) {
        panic!("{e}");
    }
}

pub fn assert_outputs_barriered(graph: &Graph, roots: &[NodeId]) {
    if let Err(e) = check_outputs_barriered(graph, roots) {
        panic!("{e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::func::{CombineFn, DoFn};
    use sluice_core::types::{ElemType, Value};

    fn kv() -> ElemType {
        ElemType::pair(ElemType::Utf8, ElemType::Int64)
    }

    fn ident() -> DoFn {
        DoFn::map("id", kv(), kv(), |v| v.clone())
    }

    #[test]
    fn test_shared_group_by_key_is_reported() {
        let mut g = Graph::new();
        let a = g.load("mem://a", kv());
        let gbk = g.group_by_key(a).unwrap();
        let err = check_no_shared_kinds(&g, &[gbk, gbk]).unwrap_err();
        assert!(err.to_string().contains("GroupByKey"));
        assert!(check_no_shared_kinds(&g, &[gbk]).is_ok());
    }

    #[test]
    fn test_nested_flatten_is_reported() {
        let mut g = Graph::new();
        let a = g.load("mem://a", kv());
        let inner = g.flatten(vec![a]).unwrap();
        let outer = g.flatten(vec![inner, a]).unwrap();
        assert!(check_flatten_normal_form(&g, &[outer]).is_err());
        assert!(check_flatten_normal_form(&g, &[inner]).is_ok());
    }

    #[test]
    fn test_misplaced_combine_is_reported() {
        let mut g = Graph::new();
        let grouped = ElemType::pair(ElemType::Utf8, ElemType::list(ElemType::Int64));
        let a = g.load("mem://a", grouped);
        let sum = CombineFn::new("sum", ElemType::Int64, |x: &Value, _: &Value| x.clone());
        let c = g.combine(a, sum).unwrap();
        assert!(check_combine_placement(&g, &[c]).is_err());
    }

    #[test]
    fn test_par_do_chain_needs_inner_barrier() {
        let mut g = Graph::new();
        let a = g.load("mem://a", kv());
        let p = g.parallel_do(a, ident()).unwrap();
        let q = g.parallel_do(p, ident()).unwrap();
        assert!(check_no_unbarred_par_do_chain(&g, &[q]).is_err());

        let pb = g.parallel_do_with_barrier(a, ident(), true).unwrap();
        let qb = g.parallel_do_with_barrier(pb, ident(), true).unwrap();
        assert!(check_no_unbarred_par_do_chain(&g, &[qb]).is_ok());
        assert!(check_all(&g, &[qb]).is_ok());
    }

    #[test]
    #[should_panic(expected = "no fuse barrier")]
    fn test_assert_outputs_barriered_panics() {
        let mut g = Graph::new();
        let a = g.load("mem://a", kv());
        let p = g.parallel_do(a, ident()).unwrap();
        assert_outputs_barriered(&g, &[p]);
    }
}
