//! Runtime: evaluate the graph reachable from a set of roots.
//!
//! - `Load` yields the records bound to its uri (missing binding is an error)
//! - `ParallelDo` flat-maps, `Flatten` concatenates in input order
//! - `GroupByKey` groups `Pair(k, v)` records by key, in key order, keeping
//!   values in arrival order
//! - `Combine` reduces each group's list; empty groups produce nothing
//! - `Materialize` passes records through and records them under its sink uri

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use thiserror::Error;

use sluice_core::graph::{Graph, Node};
use sluice_core::id::NodeId;
use sluice_core::types::Value;

/// Source uri → records.
pub type Bindings = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no records bound for source '{0}'")]
    MissingSource(String),
    #[error("invalid record at {node}: {reason}")]
    Record { node: NodeId, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// Records per root, same order as the roots passed to `run`.
    pub outputs: Vec<Vec<Value>>,
    /// Records written per sink uri.
    pub sinks: BTreeMap<String, Vec<Value>>,
    /// Distinct nodes evaluated.
    pub evaluated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    bindings: Bindings,
}

impl Engine {
    pub fn new(bindings: Bindings) -> Self {
        Self { bindings }
    }

    pub fn bind(&mut self, uri: impl Into<String>, records: Vec<Value>) {
        self.bindings.insert(uri.into(), records);
    }

    /// Evaluate every node reachable from `roots` once.
    ///
    /// Copies of one `Materialize` (same origin) write to their sink once, so
    /// a graph and its optimized form report the same sink contents.
    pub fn run(&self, graph: &Graph, roots: &[NodeId]) -> Result<RunOutput, ExecError> {
        let mut results: HashMap<NodeId, Rc<Vec<Value>>> = HashMap::new();
        let mut sinks: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut written: HashSet<NodeId> = HashSet::new();

        let order = graph.reachable(roots);
        for &id in &order {
            let input = |i: &NodeId| Rc::clone(&results[i]);
            let records = match graph.node(id) {
                Node::Load { source } => self
                    .bindings
                    .get(&source.uri)
                    .cloned()
                    .ok_or_else(|| ExecError::MissingSource(source.uri.clone()))?,
                Node::Return { value, .. } => vec![value.clone()],
                Node::Op { inputs, f } => f.apply(&input(&inputs[0]), &input(&inputs[1])),
                Node::ParallelDo { input: i, dofn, .. } => {
                    input(i).iter().flat_map(|v| dofn.apply(v)).collect()
                }
                Node::GroupByKey { input: i } => group_by_key(id, &input(i))?,
                Node::Combine { input: i, f } => {
                    let mut out = Vec::new();
                    for rec in input(i).iter() {
                        let (k, vs) = rec
                            .as_pair()
                            .and_then(|(k, vs)| Some((k, vs.as_list()?)))
                            .ok_or_else(|| ExecError::Record {
                                node: id,
                                reason: format!("expected Pair(key, List), got {rec}"),
                            })?;
                        if let Some(r) = f.reduce(vs) {
                            out.push(Value::pair(k.clone(), r));
                        }
                    }
                    out
                }
                Node::Flatten { inputs } => inputs
                    .iter()
                    .flat_map(|i| input(i).iter().cloned().collect::<Vec<_>>())
                    .collect(),
                Node::Materialize { input: i, sink } => {
                    let records = input(i).to_vec();
                    if written.insert(graph.origin(id)) {
                        sinks
                            .entry(sink.uri.clone())
                            .or_default()
                            .extend(records.iter().cloned());
                    }
                    records
                }
            };
            tracing::trace!(node = id.get(), records = records.len(), "evaluated");
            results.insert(id, Rc::new(records));
        }

        let outputs = roots.iter().map(|r| results[r].to_vec()).collect();
        tracing::debug!(nodes = order.len(), roots = roots.len(), "run complete");
        Ok(RunOutput {
            outputs,
            sinks,
            evaluated: order.len(),
        })
    }
}

fn group_by_key(id: NodeId, records: &[Value]) -> Result<Vec<Value>, ExecError> {
    let mut pairs = records
        .iter()
        .map(|rec| {
            rec.as_pair().ok_or_else(|| ExecError::Record {
                node: id,
                reason: format!("expected Pair(key, value), got {rec}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    // stable: values keep arrival order within a key
    pairs.sort_by(|a, b| a.0.total_cmp(b.0));

    let mut out: Vec<Value> = Vec::new();
    let mut cur: Option<(&Value, Vec<Value>)> = None;
    for (k, v) in pairs {
        if let Some((ck, vs)) = cur.as_mut() {
            if ck.total_cmp(k).is_eq() {
                vs.push(v.clone());
                continue;
            }
        }
        if let Some((ck, vs)) = cur.replace((k, vec![v.clone()])) {
            out.push(Value::pair(ck.clone(), Value::List(vs)));
        }
    }
    if let Some((ck, vs)) = cur {
        out.push(Value::pair(ck.clone(), Value::List(vs)));
    }
    Ok(out)
}
