//! Flatten rules: sharing split, sinking ParallelDo through a union, and
//! associativity normalisation.

use sluice_core::graph::{Graph, Node};
use sluice_core::id::NodeId;
use sluice_rewrite::{rule, Strategy};

/// Any Flatten becomes a fresh copy of itself.
///
/// Under `everywhere` every occurrence of a shared Flatten is visited on its
/// own path, so each consumer ends up holding a distinct copy and later
/// rewrites of one copy cannot leak into another consumer.
pub fn flatten_split() -> impl Strategy {
    rule("flatten_split", |g: &mut Graph, id| {
        if !matches!(g.node(id), Node::Flatten { .. }) {
            return None;
        }
        Some(g.copy(id))
    })
}

/// `ParallelDo(Flatten(i1..iN), f)` becomes `Flatten(ParallelDo(i1, f), .., ParallelDo(iN, f))`.
///
/// Each branch keeps the same function, barrier flag and origin, so it can
/// later fuse with its own upstream producer but is still recognised as an
/// output when the sunk node was one.
pub fn flatten_sink() -> impl Strategy {
    rule("flatten_sink", |g: &mut Graph, id| {
        let Node::ParallelDo {
            input,
            dofn,
            fuse_barrier,
        } = g.node(id)
        else {
            return None;
        };
        let Node::Flatten { inputs } = g.node(*input) else {
            return None;
        };
        let (inputs, dofn, fuse_barrier) = (inputs.clone(), dofn.clone(), *fuse_barrier);

        let branches: Vec<NodeId> = inputs
            .into_iter()
            .map(|i| {
                g.derive(
                    Node::ParallelDo {
                        input: i,
                        dofn: dofn.clone(),
                        fuse_barrier,
                    },
                    id,
                )
            })
            .collect();
        Some(g.derive(Node::Flatten { inputs: branches }, id))
    })
}

/// A Flatten with Flatten inputs has each of those replaced in place by its
/// own inputs. Other inputs keep their relative order. One level per match;
/// `repeat` collapses arbitrary nesting.
pub fn flatten_fuse() -> impl Strategy {
    rule("flatten_fuse", |g: &mut Graph, id| {
        let Node::Flatten { inputs } = g.node(id) else {
            return None;
        };
        if !inputs.iter().any(|&i| matches!(g.node(i), Node::Flatten { .. })) {
            return None;
        }
        let mut flat = Vec::with_capacity(inputs.len());
        for &i in inputs {
            match g.node(i) {
                Node::Flatten { inputs: nested } => flat.extend_from_slice(nested),
                _ => flat.push(i),
            }
        }
        Some(g.derive(Node::Flatten { inputs: flat }, id))
    })
}
