//! Stable hashing helpers: content hashes and structural graph fingerprints.

use std::collections::HashMap;

use blake3::Hasher;
use serde::Serialize;

use crate::graph::Graph;
use crate::id::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

pub fn hash_str(s: &str) -> Hash256 {
    hash_bytes(s.as_bytes())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, crate::error::Error> {
    let bytes = serde_json::to_vec(v).map_err(|e| crate::error::Error::Hash(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

#[derive(Serialize)]
struct CanonicalNode {
    label: String,
    elem: String,
    children: Vec<usize>,
}

#[derive(Serialize)]
struct CanonicalGraph {
    nodes: Vec<CanonicalNode>,
    roots: Vec<usize>,
}

/// Structural fingerprint of the graph reachable from `roots`.
///
/// Nodes are numbered in traversal order, so arena ids never leak into the
/// hash, but the sharing pattern does: two consumers of one node encode the
/// same child index, two consumers of equal copies encode different ones.
pub fn fingerprint(graph: &Graph, roots: &[NodeId]) -> Result<Hash256, crate::error::Error> {
    let order = graph.reachable(roots);
    let index: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let nodes = order
        .iter()
        .map(|&id| CanonicalNode {
            label: graph.node(id).label(),
            elem: graph.elem_type(id).to_string(),
            children: graph.children(id).iter().map(|c| index[c]).collect(),
        })
        .collect();
    let canonical = CanonicalGraph {
        nodes,
        roots: roots.iter().map(|r| index[r]).collect(),
    };
    hash_serde(&canonical)
}
