//! ParallelDo fusion and output barriers.

use sluice_core::graph::{Graph, Node};
use sluice_rewrite::{rule, Strategy};

use super::OutputSet;

/// `ParallelDo(ParallelDo(x, g), f)` becomes `ParallelDo(x, g >> f)` when the
/// inner node has no fuse barrier.
///
/// The inner node is also left alone when it is one of `outputs`: an output
/// must stay observable even before the barrier stage marks it. The fused
/// node keeps the outer node's barrier flag and identity.
pub fn par_do_fuse(outputs: OutputSet) -> impl Strategy {
    rule("par_do_fuse", move |g: &mut Graph, id| {
        let Node::ParallelDo {
            input: inner,
            dofn: outer_fn,
            fuse_barrier,
        } = g.node(id)
        else {
            return None;
        };
        let (inner, fuse_barrier) = (*inner, *fuse_barrier);
        let Node::ParallelDo {
            input,
            dofn: inner_fn,
            fuse_barrier: false,
        } = g.node(inner)
        else {
            return None;
        };
        if outputs.contains(&g.origin(inner)) {
            return None;
        }

        let dofn = match inner_fn.then(outer_fn) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(outer = id.get(), inner = inner.get(), error = %e, "fusion refused");
                return None;
            }
        };
        let input = *input;
        Some(g.derive(
            Node::ParallelDo {
                input,
                dofn,
                fuse_barrier,
            },
            id,
        ))
    })
}

/// Sets the fuse barrier on every ParallelDo that is one of `outputs`.
pub fn par_do_fuse_barrier(outputs: OutputSet) -> impl Strategy {
    rule("par_do_fuse_barrier", move |g: &mut Graph, id| {
        let Node::ParallelDo {
            input,
            dofn,
            fuse_barrier: false,
        } = g.node(id)
        else {
            return None;
        };
        if !outputs.contains(&g.origin(id)) {
            return None;
        }
        let node = Node::ParallelDo {
            input: *input,
            dofn: dofn.clone(),
            fuse_barrier: true,
        };
        Some(g.derive(node, id))
    })
}
