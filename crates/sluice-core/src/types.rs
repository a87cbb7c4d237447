//! Dynamically-typed element values and their type descriptors.
//!
//! Records flowing through a pipeline are `Value`s. Every node declares the
//! `ElemType` of the records it produces so the graph builder and the fusion
//! rule can check function composition before anything runs.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Pair(Box<Value>, Box<Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn pair(k: Value, v: Value) -> Self {
        Value::Pair(Box::new(k), Box::new(v))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_pair(&self) -> Option<(&Value, &Value)> {
        match self {
            Value::Pair(k, v) => Some((k, v)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(vs) => Some(vs),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Best-effort type of a single value. Empty lists and nulls report `Any`.
    pub fn elem_type(&self) -> ElemType {
        match self {
            Value::Null => ElemType::Any,
            Value::Bool(_) => ElemType::Bool,
            Value::I64(_) => ElemType::Int64,
            Value::F64(_) => ElemType::Float64,
            Value::Str(_) => ElemType::Utf8,
            Value::Bin(_) => ElemType::Binary,
            Value::Pair(k, v) => ElemType::pair(k.elem_type(), v.elem_type()),
            Value::List(vs) => ElemType::list(vs.first().map(Value::elem_type).unwrap_or(ElemType::Any)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::I64(_) => 2,
            Value::F64(_) => 3,
            Value::Str(_) => 4,
            Value::Bin(_) => 5,
            Value::Pair(..) => 6,
            Value::List(_) => 7,
        }
    }

    /// Total order over values: variant rank first, then contents.
    /// Floats use IEEE total ordering so grouping and multiset comparison
    /// never see an incomparable pair.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bin(a), Value::Bin(b)) => a.cmp(b),
            (Value::Pair(ak, av), Value::Pair(bk, bv)) => {
                ak.total_cmp(bk).then_with(|| av.total_cmp(bv))
            }
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bin(b) => write!(f, "<{} bytes>", b.len()),
            Value::Pair(k, v) => write!(f, "({k}, {v})"),
            Value::List(vs) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Sort a record sequence into canonical multiset order.
pub fn sorted(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Element type descriptor. `Any` is compatible with every other type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElemType {
    Any,
    Bool,
    Int64,
    Float64,
    Utf8,
    Binary,
    Pair(Box<ElemType>, Box<ElemType>),
    List(Box<ElemType>),
}

impl ElemType {
    pub fn pair(k: ElemType, v: ElemType) -> Self {
        ElemType::Pair(Box::new(k), Box::new(v))
    }

    pub fn list(t: ElemType) -> Self {
        ElemType::List(Box::new(t))
    }

    /// Structural compatibility, treating `Any` as a wildcard on either side.
    pub fn is_compatible(&self, other: &ElemType) -> bool {
        match (self, other) {
            (ElemType::Any, _) | (_, ElemType::Any) => true,
            (ElemType::Pair(ak, av), ElemType::Pair(bk, bv)) => {
                ak.is_compatible(bk) && av.is_compatible(bv)
            }
            (ElemType::List(a), ElemType::List(b)) => a.is_compatible(b),
            (a, b) => a == b,
        }
    }

    /// Most specific type both sides accept, or `None` when they conflict.
    ///
    /// Unlike `is_compatible` this is transitive when folded: the meet of a
    /// set of types exists only if one type refines all of them.
    pub fn meet(&self, other: &ElemType) -> Option<ElemType> {
        match (self, other) {
            (ElemType::Any, t) | (t, ElemType::Any) => Some(t.clone()),
            (ElemType::Pair(ak, av), ElemType::Pair(bk, bv)) => {
                Some(ElemType::pair(ak.meet(bk)?, av.meet(bv)?))
            }
            (ElemType::List(a), ElemType::List(b)) => Some(ElemType::list(a.meet(b)?)),
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    /// Key and value types of a pair type; `Any` splits into two `Any`s.
    pub fn pair_parts(&self) -> Option<(ElemType, ElemType)> {
        match self {
            ElemType::Pair(k, v) => Some(((**k).clone(), (**v).clone())),
            ElemType::Any => Some((ElemType::Any, ElemType::Any)),
            _ => None,
        }
    }

    pub fn list_elem(&self) -> Option<ElemType> {
        match self {
            ElemType::List(t) => Some((**t).clone()),
            ElemType::Any => Some(ElemType::Any),
            _ => None,
        }
    }

    /// Parse the textual names used by the YAML pipeline format:
    /// `Int64`, `Utf8`, `Pair<Utf8,Int64>`, `List<Int64>`, ...
    pub fn parse(s: &str) -> Option<ElemType> {
        let s = s.trim();
        if let Some(inner) = strip_generic(s, "Pair") {
            let (k, v) = split_top_level(inner)?;
            return Some(ElemType::pair(ElemType::parse(k)?, ElemType::parse(v)?));
        }
        if let Some(inner) = strip_generic(s, "List") {
            return Some(ElemType::list(ElemType::parse(inner)?));
        }
        match s {
            "Any" | "any" => Some(ElemType::Any),
            "Bool" | "Boolean" | "bool" => Some(ElemType::Bool),
            "Int64" | "i64" => Some(ElemType::Int64),
            "Float64" | "f64" => Some(ElemType::Float64),
            "Utf8" | "String" | "str" => Some(ElemType::Utf8),
            "Binary" | "bytes" => Some(ElemType::Binary),
            _ => None,
        }
    }
}

fn strip_generic<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?.strip_prefix('<')?.strip_suffix('>')
}

fn split_top_level(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    None
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElemType::Any => write!(f, "Any"),
            ElemType::Bool => write!(f, "Bool"),
            ElemType::Int64 => write!(f, "Int64"),
            ElemType::Float64 => write!(f, "Float64"),
            ElemType::Utf8 => write!(f, "Utf8"),
            ElemType::Binary => write!(f, "Binary"),
            ElemType::Pair(k, v) => write!(f, "Pair<{k},{v}>"),
            ElemType::List(t) => write!(f, "List<{t}>"),
        }
    }
}
