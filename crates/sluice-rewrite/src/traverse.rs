//! Whole-graph traversals: bottom-up `everywhere` and top-down `top_down_once`.
//!
//! Traversals walk consumer edges, not arena slots. A node of an exclusive
//! kind (`NodeKind::is_exclusive`) reached over two edges is visited once per
//! edge, so when a strategy hands back a fresh copy at every visit each
//! consumer ends up with its own instance, and exclusive nodes below a copied
//! one are copied along with it. Every other node is rewritten once and its
//! result is shared by all its consumers, so a split never unfolds the
//! shareable ancestors above it.

use std::collections::HashMap;

use sluice_core::id::NodeId;

use crate::rewriter::Rewriter;
use crate::strategy::Strategy;

/// How `everywhere` treats a node reachable along more than one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// Visit exclusive nodes once per consumer edge and everything else once.
    PerOccurrence,
    /// Visit each node once and hand the same result to all its consumers.
    PerNode,
}

pub struct Everywhere<S> {
    name: String,
    inner: S,
    sharing: Sharing,
}

/// Bottom-up over the whole graph: children are rewritten and their parent
/// rebuilt before `attempt(inner)` runs on the parent. Never fails.
pub fn everywhere<S: Strategy>(inner: S) -> Everywhere<S> {
    Everywhere {
        name: format!("everywhere({})", inner.name()),
        inner,
        sharing: Sharing::PerOccurrence,
    }
}

/// `everywhere` visiting each node exactly once.
pub fn everywhere_shared<S: Strategy>(inner: S) -> Everywhere<S> {
    Everywhere {
        name: format!("everywhere_shared({})", inner.name()),
        inner,
        sharing: Sharing::PerNode,
    }
}

impl<S: Strategy> Everywhere<S> {
    fn visit(&self, cx: &mut Rewriter<'_>, id: NodeId, memo: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&done) = memo.get(&id) {
            return done;
        }

        let children = cx.graph().children(id).to_vec();
        let rewritten: Vec<NodeId> = children
            .iter()
            .map(|&c| self.visit(cx, c, memo))
            .collect();
        let rebuilt = cx.graph_mut().rebuild(id, &rewritten);
        let out = self.inner.apply(cx, rebuilt).unwrap_or(rebuilt);

        let shareable = match self.sharing {
            Sharing::PerNode => true,
            Sharing::PerOccurrence => {
                out == id || (out == rebuilt && !cx.graph().kind(id).is_exclusive())
            }
        };
        if shareable {
            memo.insert(id, out);
        }
        out
    }
}

impl<S: Strategy> Strategy for Everywhere<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        let mut memo = HashMap::new();
        Some(self.visit(cx, id, &mut memo))
    }

    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        let mut memo = HashMap::new();
        roots
            .iter()
            .map(|&r| self.visit(cx, r, &mut memo))
            .collect()
    }
}

pub struct TopDownOnce<S> {
    name: String,
    inner: S,
}

/// Top-down: where `inner` matches, take the rewrite and do not descend into
/// that occurrence; elsewhere descend into the children. Matches are taken
/// per consumer edge. Fails when nothing matched anywhere below the node.
pub fn top_down_once<S: Strategy>(inner: S) -> TopDownOnce<S> {
    TopDownOnce {
        name: format!("top_down_once({})", inner.name()),
        inner,
    }
}

impl<S: Strategy> TopDownOnce<S> {
    fn visit(&self, cx: &mut Rewriter<'_>, id: NodeId, memo: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&done) = memo.get(&id) {
            return done;
        }
        if let Some(out) = self.inner.apply(cx, id) {
            if out != id {
                return out;
            }
        }

        let children = cx.graph().children(id).to_vec();
        let rewritten: Vec<NodeId> = children
            .iter()
            .map(|&c| self.visit(cx, c, memo))
            .collect();
        let rebuilt = cx.graph_mut().rebuild(id, &rewritten);
        if rebuilt == id || !cx.graph().kind(id).is_exclusive() {
            memo.insert(id, rebuilt);
        }
        rebuilt
    }
}

impl<S: Strategy> Strategy for TopDownOnce<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, cx: &mut Rewriter<'_>, id: NodeId) -> Option<NodeId> {
        let mut memo = HashMap::new();
        let out = self.visit(cx, id, &mut memo);
        (out != id).then_some(out)
    }

    fn apply_all(&self, cx: &mut Rewriter<'_>, roots: &[NodeId]) -> Vec<NodeId> {
        let mut memo = HashMap::new();
        roots
            .iter()
            .map(|&r| self.visit(cx, r, &mut memo))
            .collect()
    }
}
