//! YAML → `Graph` parser for branching pipelines.
//!
//! Example:
//! ```yaml
//! nodes:
//!   - { id: lines, load: { source: "mem://lines", type: Utf8 } }
//!   - { id: words, parallel_do: { input: lines, fn: split_words } }
//!   - { id: ones,  parallel_do: { input: words, fn: to_pair } }
//!   - { id: grp,   group_by_key: { input: ones } }
//!   - { id: cnt,   combine: { input: grp, fn: sum } }
//! outputs: [cnt]
//! data:
//!   "mem://lines": ["a b", "b c"]
//! ```
//!
//! Nodes may only refer to nodes declared above them, so every parsed
//! pipeline is acyclic. Functions are looked up by name in a
//! `FunctionRegistry`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sluice_core::config::OptimizerConfig;
use sluice_core::error::{Error, Result};
use sluice_core::graph::Graph;
use sluice_core::handle::SinkHandle;
use sluice_core::id::NodeId;
use sluice_core::types::{ElemType, Value};

use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    pub nodes: Vec<NodeDef>,
    pub outputs: Vec<String>,
    /// Records for `Load` sources, keyed by source uri. Only used when the
    /// pipeline is run.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<serde_yaml::Value>>,
}

/// Optimizer settings a pipeline file may pin. Unset fields leave the
/// environment/default value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_fixpoint_passes: Option<usize>,
    pub verify_measures: Option<bool>,
    pub verify_result: Option<bool>,
}

impl PipelineConfig {
    pub fn apply(&self, cfg: &mut OptimizerConfig) {
        if let Some(n) = self.max_fixpoint_passes {
            cfg.max_fixpoint_passes = n;
        }
        if let Some(v) = self.verify_measures {
            cfg.verify_measures = v;
        }
        if let Some(v) = self.verify_result {
            cfg.verify_result = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    #[serde(flatten)]
    pub spec: NodeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSpec {
    Load {
        source: String,
        #[serde(rename = "type")]
        elem: String,
    },
    Return {
        value: serde_yaml::Value,
        #[serde(rename = "type")]
        elem: String,
    },
    Op {
        left: String,
        right: String,
        #[serde(rename = "fn")]
        func: String,
    },
    ParallelDo {
        input: String,
        #[serde(rename = "fn")]
        func: String,
        #[serde(default)]
        barrier: bool,
    },
    GroupByKey {
        input: String,
    },
    Combine {
        input: String,
        #[serde(rename = "fn")]
        func: String,
    },
    Flatten {
        inputs: Vec<String>,
    },
    Materialize {
        input: String,
        sink: String,
        #[serde(default = "default_format")]
        format: String,
    },
}

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone)]
pub struct ParsedPipeline {
    pub graph: Graph,
    /// Output nodes in declaration order.
    pub outputs: Vec<NodeId>,
    /// Declared node names.
    pub names: BTreeMap<String, NodeId>,
    /// Source records, converted to each source's declared element type.
    pub data: BTreeMap<String, Vec<Value>>,
    pub config: PipelineConfig,
}

impl ParsedPipeline {
    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }
}

struct Builder<'r> {
    registry: &'r FunctionRegistry,
    graph: Graph,
    names: BTreeMap<String, NodeId>,
    sources: BTreeMap<String, ElemType>,
}

impl Builder<'_> {
    fn lookup(&self, name: &str) -> Result<NodeId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::Parse(format!("unknown node '{name}'")))
    }

    fn add(&mut self, def: NodeDef) -> Result<()> {
        if self.names.contains_key(&def.id) {
            return Err(Error::Parse(format!("duplicate node id '{}'", def.id)));
        }
        let id = match def.spec {
            NodeSpec::Load { source, elem } => {
                let elem = parse_type(&elem)?;
                if let Some(prev) = self.sources.get(&source) {
                    if prev != &elem {
                        return Err(Error::Parse(format!(
                            "source '{source}' declared as both {prev} and {elem}"
                        )));
                    }
                }
                self.sources.insert(source.clone(), elem.clone());
                self.graph.load(source, elem)
            }
            NodeSpec::Return { value, elem } => {
                let elem = parse_type(&elem)?;
                let value = to_value(&value, &elem)?;
                self.graph.ret(value, elem)?
            }
            NodeSpec::Op { left, right, func } => {
                let (l, r) = (self.lookup(&left)?, self.lookup(&right)?);
                let f = self.registry.op_fn(&func)?;
                self.graph.op(l, r, f)?
            }
            NodeSpec::ParallelDo {
                input,
                func,
                barrier,
            } => {
                let input = self.lookup(&input)?;
                let f = self.registry.do_fn(&func)?;
                self.graph.parallel_do_with_barrier(input, f, barrier)?
            }
            NodeSpec::GroupByKey { input } => {
                let input = self.lookup(&input)?;
                self.graph.group_by_key(input)?
            }
            NodeSpec::Combine { input, func } => {
                let input = self.lookup(&input)?;
                let f = self.registry.combine_fn(&func)?;
                self.graph.combine(input, f)?
            }
            NodeSpec::Flatten { inputs } => {
                let inputs = inputs
                    .iter()
                    .map(|i| self.lookup(i))
                    .collect::<Result<Vec<_>>>()?;
                self.graph.flatten(inputs)?
            }
            NodeSpec::Materialize {
                input,
                sink,
                format,
            } => {
                let input = self.lookup(&input)?;
                self.graph.materialize(input, SinkHandle::new(sink, format))?
            }
        };
        self.names.insert(def.id, id);
        Ok(())
    }
}

fn parse_type(s: &str) -> Result<ElemType> {
    ElemType::parse(s).ok_or_else(|| Error::Parse(format!("unknown element type '{s}'")))
}

/// Convert a YAML scalar or sequence into a `Value` of the given type.
/// Under `Pair` a two-element sequence is a pair; otherwise sequences are lists.
pub fn to_value(y: &serde_yaml::Value, elem: &ElemType) -> Result<Value> {
    use serde_yaml::Value as Y;
    let v = match (y, elem) {
        (Y::Null, _) => Value::Null,
        (Y::Bool(b), _) => Value::Bool(*b),
        (Y::Number(n), ElemType::Float64) => Value::F64(n.as_f64().unwrap_or_default()),
        (Y::Number(n), _) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => Value::F64(n.as_f64().unwrap_or_default()),
        },
        (Y::String(s), _) => Value::Str(s.clone()),
        (Y::Sequence(items), ElemType::Pair(k, v)) => match items.as_slice() {
            [a, b] => Value::pair(to_value(a, k)?, to_value(b, v)?),
            _ => {
                return Err(Error::Parse(format!(
                    "a {elem} record needs exactly two items, got {}",
                    items.len()
                )))
            }
        },
        (Y::Sequence(items), _) => {
            let inner = elem.list_elem().unwrap_or(ElemType::Any);
            Value::List(
                items
                    .iter()
                    .map(|i| to_value(i, &inner))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        (other, _) => {
            return Err(Error::Parse(format!(
                "cannot use {other:?} as a {elem} record"
            )))
        }
    };
    if !v.elem_type().is_compatible(elem) {
        return Err(Error::type_mismatch("record", elem, &v.elem_type()));
    }
    Ok(v)
}

/// Parse a YAML pipeline into a graph plus its ordered outputs.
pub fn parse_yaml_pipeline(yaml_src: &str, registry: &FunctionRegistry) -> Result<ParsedPipeline> {
    let doc: Pipeline =
        serde_yaml::from_str(yaml_src).map_err(|e| Error::Parse(e.to_string()))?;
    if doc.outputs.is_empty() {
        return Err(Error::Parse("pipeline declares no outputs".into()));
    }

    let mut b = Builder {
        registry,
        graph: Graph::new(),
        names: BTreeMap::new(),
        sources: BTreeMap::new(),
    };
    for def in doc.nodes {
        b.add(def)?;
    }
    let outputs = doc
        .outputs
        .iter()
        .map(|o| b.lookup(o))
        .collect::<Result<Vec<_>>>()?;

    let mut data = BTreeMap::new();
    for (uri, records) in &doc.data {
        let elem = b.sources.get(uri).ok_or_else(|| {
            Error::Parse(format!("data given for '{uri}', which no load reads"))
        })?;
        let values = records
            .iter()
            .map(|r| to_value(r, elem))
            .collect::<Result<Vec<_>>>()?;
        data.insert(uri.clone(), values);
    }

    Ok(ParsedPipeline {
        graph: b.graph,
        outputs,
        names: b.names,
        data,
        config: doc.config.unwrap_or_default(),
    })
}
