//! The computation graph: a closed node taxonomy stored in an append-only arena.
//!
//! Edges are `NodeId`s, so a node may feed several consumers. Rewrites never
//! mutate a slot: they allocate new slots (copy, rebuild, or a derived node) and
//! the caller moves on to the new roots. Old slots simply become unreachable.
//!
//! Every slot records an *origin*: the node it was copied or rebuilt from
//! (transitively), or itself for nodes added by pipeline-building code. Two
//! slots with the same origin play the same role in the pipeline.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::func::{CombineFn, DoFn, OpFn};
use crate::handle::{SinkHandle, SourceHandle};
use crate::id::NodeId;
use crate::types::{ElemType, Value};

/// Variant tag of a `Node`, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Load,
    Return,
    Op,
    ParallelDo,
    GroupByKey,
    Combine,
    Flatten,
    Materialize,
}

impl NodeKind {
    /// Kinds that every optimized graph gives exactly one consumer each.
    /// Nodes of other kinds may stay shared.
    pub fn is_exclusive(self) -> bool {
        matches!(self, NodeKind::Flatten | NodeKind::GroupByKey | NodeKind::Combine)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    /// Source placeholder; no pipeline children.
    Load { source: SourceHandle },
    /// Lifts a constant into the graph as a single record.
    Return { value: Value, elem: ElemType },
    /// Binary combinator of two nodes.
    Op { inputs: [NodeId; 2], f: OpFn },
    ParallelDo {
        input: NodeId,
        dofn: DoFn,
        fuse_barrier: bool,
    },
    GroupByKey { input: NodeId },
    Combine { input: NodeId, f: CombineFn },
    Flatten { inputs: Vec<NodeId> },
    Materialize { input: NodeId, sink: SinkHandle },
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Load { .. } => NodeKind::Load,
            Node::Return { .. } => NodeKind::Return,
            Node::Op { .. } => NodeKind::Op,
            Node::ParallelDo { .. } => NodeKind::ParallelDo,
            Node::GroupByKey { .. } => NodeKind::GroupByKey,
            Node::Combine { .. } => NodeKind::Combine,
            Node::Flatten { .. } => NodeKind::Flatten,
            Node::Materialize { .. } => NodeKind::Materialize,
        }
    }

    /// Ordered child edges.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Load { .. } | Node::Return { .. } => &[],
            Node::Op { inputs, .. } => inputs.as_slice(),
            Node::ParallelDo { input, .. }
            | Node::GroupByKey { input }
            | Node::Combine { input, .. }
            | Node::Materialize { input, .. } => std::slice::from_ref(input),
            Node::Flatten { inputs } => inputs.as_slice(),
        }
    }

    /// Same variant and payload, new children.
    ///
    /// Panics when `children` does not have the arity of this variant; that is
    /// a bug in the calling rewrite, not a condition to recover from.
    pub fn with_children(&self, children: &[NodeId]) -> Node {
        let arity = self.children().len();
        match self {
            Node::Flatten { .. } => assert!(
                !children.is_empty(),
                "Flatten rebuilt with no inputs"
            ),
            _ => assert_eq!(
                children.len(),
                arity,
                "{} rebuilt with {} children, expected {}",
                self.kind(),
                children.len(),
                arity
            ),
        }

        let mut node = self.clone();
        match &mut node {
            Node::Load { .. } | Node::Return { .. } => {}
            Node::Op { inputs, .. } => {
                inputs.copy_from_slice(children);
            }
            Node::ParallelDo { input, .. }
            | Node::GroupByKey { input }
            | Node::Combine { input, .. }
            | Node::Materialize { input, .. } => *input = children[0],
            Node::Flatten { inputs } => *inputs = children.to_vec(),
        }
        node
    }

    /// `Some(flag)` for `ParallelDo`, `None` for every other variant.
    pub fn fuse_barrier(&self) -> Option<bool> {
        match self {
            Node::ParallelDo { fuse_barrier, .. } => Some(*fuse_barrier),
            _ => None,
        }
    }

    /// Short label used by explain output and fingerprints.
    pub fn label(&self) -> String {
        match self {
            Node::Load { source } => format!("Load[{}]", source.uri),
            Node::Return { value, .. } => format!("Return[{value}]"),
            Node::Op { f, .. } => format!("Op[{}]", f.name()),
            Node::ParallelDo {
                dofn, fuse_barrier, ..
            } => {
                if *fuse_barrier {
                    format!("ParallelDo[{}] barrier", dofn.name())
                } else {
                    format!("ParallelDo[{}]", dofn.name())
                }
            }
            Node::GroupByKey { .. } => "GroupByKey".to_string(),
            Node::Combine { f, .. } => format!("Combine[{}]", f.name()),
            Node::Flatten { inputs } => format!("Flatten/{}", inputs.len()),
            Node::Materialize { sink, .. } => format!("Materialize[{}]", sink.uri),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    elem: ElemType,
    origin: NodeId,
}

/// Append-only arena of nodes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    slots: Vec<Slot>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.slots.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).map(|s| &s.node)
    }

    /// Panics on an id from another graph; ids are only minted by this arena.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.slot(id).node
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Element type of the records `id` produces.
    pub fn elem_type(&self, id: NodeId) -> &ElemType {
        &self.slot(id).elem
    }

    pub fn origin(&self, id: NodeId) -> NodeId {
        self.slot(id).origin
    }

    fn slot(&self, id: NodeId) -> &Slot {
        match self.slots.get(id.index()) {
            Some(slot) => slot,
            None => panic!("{id} is not a node of this graph ({} slots)", self.slots.len()),
        }
    }

    // ---------------------------------------------------------------------
    // Builders (validated; used by pipeline-building code)
    // ---------------------------------------------------------------------

    pub fn load(&mut self, uri: impl Into<String>, elem: ElemType) -> NodeId {
        self.push(
            Node::Load {
                source: SourceHandle::new(uri, elem.clone()),
            },
            elem,
            None,
        )
    }

    pub fn ret(&mut self, value: Value, elem: ElemType) -> Result<NodeId> {
        self.add(Node::Return { value, elem })
    }

    pub fn op(&mut self, left: NodeId, right: NodeId, f: OpFn) -> Result<NodeId> {
        self.add(Node::Op {
            inputs: [left, right],
            f,
        })
    }

    pub fn parallel_do(&mut self, input: NodeId, dofn: DoFn) -> Result<NodeId> {
        self.parallel_do_with_barrier(input, dofn, false)
    }

    pub fn parallel_do_with_barrier(
        &mut self,
        input: NodeId,
        dofn: DoFn,
        fuse_barrier: bool,
    ) -> Result<NodeId> {
        self.add(Node::ParallelDo {
            input,
            dofn,
            fuse_barrier,
        })
    }

    pub fn group_by_key(&mut self, input: NodeId) -> Result<NodeId> {
        self.add(Node::GroupByKey { input })
    }

    pub fn combine(&mut self, input: NodeId, f: CombineFn) -> Result<NodeId> {
        self.add(Node::Combine { input, f })
    }

    pub fn flatten(&mut self, inputs: Vec<NodeId>) -> Result<NodeId> {
        self.add(Node::Flatten { inputs })
    }

    pub fn materialize(&mut self, input: NodeId, sink: SinkHandle) -> Result<NodeId> {
        self.add(Node::Materialize { input, sink })
    }

    /// Validate children and element types, then allocate.
    pub fn add(&mut self, node: Node) -> Result<NodeId> {
        for &c in node.children() {
            if !self.contains(c) {
                return Err(Error::Graph(format!(
                    "{} references unknown input {c}",
                    node.kind()
                )));
            }
        }
        let elem = self.infer_type(&node)?;
        Ok(self.push(node, elem, None))
    }

    // ---------------------------------------------------------------------
    // Rewrite support (allocates, never mutates)
    // ---------------------------------------------------------------------

    /// Allocate a node produced by a rewrite, standing in for `origin`'s role.
    ///
    /// Panics if the node is ill-typed: rewrites must preserve typing.
    pub fn derive(&mut self, node: Node, origin: NodeId) -> NodeId {
        let origin = self.origin(origin);
        let elem = match self.infer_type(&node) {
            Ok(t) => t,
            Err(e) => panic!("rewrite produced an ill-typed {}: {e}", node.kind()),
        };
        self.push(node, elem, Some(origin))
    }

    /// Fresh instance of `id`: same payload, same children, same origin.
    pub fn copy(&mut self, id: NodeId) -> NodeId {
        let slot = self.slot(id).clone();
        self.push(slot.node, slot.elem, Some(slot.origin))
    }

    /// `id` with new children. Returns `id` itself when nothing differs.
    pub fn rebuild(&mut self, id: NodeId, children: &[NodeId]) -> NodeId {
        if self.children(id) == children {
            return id;
        }
        let node = self.node(id).with_children(children);
        self.derive(node, id)
    }

    fn push(&mut self, node: Node, elem: ElemType, origin: Option<NodeId>) -> NodeId {
        let id = NodeId::new(self.slots.len() as u64);
        self.slots.push(Slot {
            node,
            elem,
            origin: origin.unwrap_or(id),
        });
        id
    }

    fn infer_type(&self, node: &Node) -> Result<ElemType> {
        match node {
            Node::Load { source } => Ok(source.elem.clone()),
            Node::Return { value, elem } => {
                if !value.elem_type().is_compatible(elem) {
                    return Err(Error::type_mismatch("Return", elem, &value.elem_type()));
                }
                Ok(elem.clone())
            }
            Node::Op { f, .. } => Ok(f.output().clone()),
            Node::ParallelDo { input, dofn, .. } => {
                let found = self.elem_type(*input);
                if !found.is_compatible(dofn.input()) {
                    return Err(Error::type_mismatch(
                        format!("ParallelDo[{}]", dofn.name()),
                        dofn.input(),
                        found,
                    ));
                }
                Ok(dofn.output().clone())
            }
            Node::GroupByKey { input } => {
                let found = self.elem_type(*input);
                let (k, v) = found.pair_parts().ok_or_else(|| {
                    Error::type_mismatch(
                        "GroupByKey",
                        &ElemType::pair(ElemType::Any, ElemType::Any),
                        found,
                    )
                })?;
                Ok(ElemType::pair(k, ElemType::list(v)))
            }
            Node::Combine { input, f } => {
                let found = self.elem_type(*input);
                let expected = ElemType::pair(ElemType::Any, ElemType::list(f.value_type().clone()));
                if !found.is_compatible(&expected) {
                    return Err(Error::type_mismatch(
                        format!("Combine[{}]", f.name()),
                        &expected,
                        found,
                    ));
                }
                let (k, _) = found.pair_parts().unwrap_or((ElemType::Any, ElemType::Any));
                Ok(ElemType::pair(k, f.value_type().clone()))
            }
            Node::Flatten { inputs } => {
                let Some((first, rest)) = inputs.split_first() else {
                    return Err(Error::Graph("Flatten requires at least one input".into()));
                };
                // The union's type refines every input, so anything typed
                // against it also type-checks against each branch.
                let mut elem = self.elem_type(*first).clone();
                for &i in rest {
                    let t = self.elem_type(i);
                    elem = elem
                        .meet(t)
                        .ok_or_else(|| Error::type_mismatch("Flatten input", &elem, t))?;
                }
                Ok(elem)
            }
            Node::Materialize { input, .. } => Ok(self.elem_type(*input).clone()),
        }
    }

    // ---------------------------------------------------------------------
    // Whole-graph queries
    // ---------------------------------------------------------------------

    /// Every node reachable from `roots`, each once, children before parents.
    pub fn reachable(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        // (node, children pushed?)
        let mut stack: Vec<(NodeId, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.push((id, true));
            for &c in self.children(id).iter().rev() {
                if !seen.contains(&c) {
                    stack.push((c, false));
                }
            }
        }
        order
    }

    /// Reverse-edge index over the subgraph reachable from `roots`.
    /// Built fresh on every call; nothing caches it across rewrites.
    pub fn consumers(&self, roots: &[NodeId]) -> ConsumerIndex {
        let mut index = ConsumerIndex::default();
        for id in self.reachable(roots) {
            for &c in self.children(id) {
                index.edges.entry(c).or_default().push(id);
            }
        }
        for &r in roots {
            *index.root_refs.entry(r).or_default() += 1;
        }
        index
    }

    /// Deep copy of everything reachable from `id`: fresh slots with fresh
    /// origins, same shape (internal sharing included), nothing shared with
    /// the original.
    pub fn duplicate(&mut self, id: NodeId) -> NodeId {
        self.duplicate_all(&[id])[0]
    }

    /// `duplicate` over several roots with one copy map, so subgraphs shared
    /// between the roots stay shared between the copies.
    pub fn duplicate_all(&mut self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut map: HashMap<NodeId, NodeId> = HashMap::new();
        for id in self.reachable(roots) {
            let children: Vec<NodeId> = self.children(id).iter().map(|c| map[c]).collect();
            let slot = self.slot(id);
            let node = slot.node.with_children(&children);
            let elem = slot.elem.clone();
            let new_id = self.push(node, elem, None);
            map.insert(id, new_id);
        }
        roots.iter().map(|r| map[r]).collect()
    }
}

/// Consumer edges per node, counted over a reachable subgraph.
#[derive(Debug, Clone, Default)]
pub struct ConsumerIndex {
    edges: HashMap<NodeId, Vec<NodeId>>,
    root_refs: HashMap<NodeId, usize>,
}

impl ConsumerIndex {
    /// Nodes with an edge into `id`, one entry per edge.
    pub fn consumers_of(&self, id: NodeId) -> &[NodeId] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Consumer edges into `id`, counting each appearance in the root list.
    pub fn count(&self, id: NodeId) -> usize {
        self.consumers_of(id).len() + self.root_refs.get(&id).copied().unwrap_or(0)
    }

    pub fn is_shared(&self, id: NodeId) -> bool {
        self.count(id) > 1
    }
}
