//! Combine rules: lowering misplaced combines and splitting shared ones.

use sluice_core::graph::{Graph, Node};
use sluice_core::id::NodeId;
use sluice_core::types::ElemType;
use sluice_rewrite::{rule, Strategy};

/// A Combine whose input is not a GroupByKey becomes a ParallelDo running the
/// same per-key reduction element-wise. Combines directly over a GroupByKey
/// are left alone; partial aggregation is only valid there.
///
/// If the input is a Flatten the new ParallelDo is pushed through it in the
/// same step, since the Flatten-sinking stage has already run by now.
pub fn combine_to_par_do() -> impl Strategy {
    rule("combine_to_par_do", |g: &mut Graph, id| {
        let Node::Combine { input, f } = g.node(id) else {
            return None;
        };
        let (input, f) = (*input, f.clone());
        let key = g
            .elem_type(input)
            .pair_parts()
            .map(|(k, _)| k)
            .unwrap_or(ElemType::Any);
        let dofn = f.to_do_fn(key);

        match g.node(input) {
            Node::GroupByKey { .. } => None,
            Node::Flatten { inputs } => {
                let inputs = inputs.clone();
                let branches: Vec<NodeId> = inputs
                    .into_iter()
                    .map(|i| {
                        g.derive(
                            Node::ParallelDo {
                                input: i,
                                dofn: dofn.clone(),
                                fuse_barrier: false,
                            },
                            id,
                        )
                    })
                    .collect();
                Some(g.derive(Node::Flatten { inputs: branches }, id))
            }
            _ => Some(g.derive(
                Node::ParallelDo {
                    input,
                    dofn,
                    fuse_barrier: false,
                },
                id,
            )),
        }
    })
}

/// Any Combine becomes a fresh copy; under `everywhere` that gives every
/// consumer of a shared Combine its own instance.
pub fn combine_split() -> impl Strategy {
    rule("combine_split", |g: &mut Graph, id| {
        if !matches!(g.node(id), Node::Combine { .. }) {
            return None;
        }
        Some(g.copy(id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::config::OptimizerConfig;
    use sluice_core::func::{CombineFn, DoFn};
    use sluice_core::graph::NodeKind;
    use sluice_core::types::Value;
    use sluice_rewrite::{everywhere, Rewriter};

    fn sum() -> CombineFn {
        CombineFn::new("sum", ElemType::Int64, |a, b| {
            Value::I64(a.as_i64().unwrap_or_default() + b.as_i64().unwrap_or_default())
        })
    }

    fn grouped() -> ElemType {
        ElemType::pair(ElemType::Utf8, ElemType::list(ElemType::Int64))
    }

    fn pass_through() -> DoFn {
        DoFn::map("g", grouped(), grouped(), |v| v.clone())
    }

    #[test]
    fn test_combine_over_par_do_becomes_par_do() {
        let mut g = Graph::new();
        let src = g.load("mem://grouped", grouped());
        let p = g.parallel_do(src, pass_through()).unwrap();
        let c = g.combine(p, sum()).unwrap();

        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = everywhere(combine_to_par_do()).apply(&mut cx, c).unwrap();
        let g = cx.graph();
        match g.node(out) {
            Node::ParallelDo {
                input,
                dofn,
                fuse_barrier,
            } => {
                assert_eq!(*input, p);
                assert!(!fuse_barrier);
                let rec = Value::pair(
                    Value::str("k"),
                    Value::List(vec![Value::I64(1), Value::I64(2)]),
                );
                assert_eq!(
                    dofn.apply(&rec),
                    vec![Value::pair(Value::str("k"), Value::I64(3))]
                );
            }
            other => panic!("expected ParallelDo, got {other:?}"),
        }
        assert_eq!(g.elem_type(out), &ElemType::pair(ElemType::Utf8, ElemType::Int64));
    }

    #[test]
    fn test_combine_over_group_by_key_is_kept() {
        let mut g = Graph::new();
        let kv = g.load("mem://kv", ElemType::pair(ElemType::Utf8, ElemType::Int64));
        let gbk = g.group_by_key(kv).unwrap();
        let c = g.combine(gbk, sum()).unwrap();
        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        assert_eq!(everywhere(combine_to_par_do()).apply(&mut cx, c), Some(c));
        assert_eq!(cx.stats().matches_of("combine_to_par_do"), 0);
    }

    #[test]
    fn test_combine_over_flatten_lands_in_branches() {
        let mut g = Graph::new();
        let a = g.load("mem://a", grouped());
        let b = g.load("mem://b", grouped());
        let f = g.flatten(vec![a, b]).unwrap();
        let c = g.combine(f, sum()).unwrap();

        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = combine_to_par_do().apply(&mut cx, c).unwrap();
        let g = cx.graph();
        assert_eq!(g.kind(out), NodeKind::Flatten);
        assert!(g
            .children(out)
            .iter()
            .all(|&p| g.kind(p) == NodeKind::ParallelDo && g.origin(p) == c));
    }

    #[test]
    fn test_combine_split_copies_each_consumer() {
        let mut g = Graph::new();
        let kv = g.load("mem://kv", ElemType::pair(ElemType::Utf8, ElemType::Int64));
        let gbk = g.group_by_key(kv).unwrap();
        let c = g.combine(gbk, sum()).unwrap();
        let top = g.flatten(vec![c, c]).unwrap();

        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = everywhere(combine_split()).apply(&mut cx, top).unwrap();
        let kids = cx.graph().children(out).to_vec();
        assert_ne!(kids[0], kids[1]);
        assert!(!kids.contains(&c));
        assert_eq!(cx.graph().origin(kids[0]), c);
    }
}
