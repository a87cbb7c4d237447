//! Named functions that YAML pipelines can refer to.
//!
//! Three namespaces (element-wise `DoFn`s, `CombineFn`s and `OpFn`s) so a
//! name like `sum` can be a reduction without clashing with anything else.

use std::collections::BTreeMap;

use sluice_core::error::{Error, Result};
use sluice_core::func::{CombineFn, DoFn, OpFn};
use sluice_core::types::{ElemType, Value};

#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    do_fns: BTreeMap<String, DoFn>,
    combine_fns: BTreeMap<String, CombineFn>,
    op_fns: BTreeMap<String, OpFn>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            do_fns: BTreeMap::new(),
            combine_fns: BTreeMap::new(),
            op_fns: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        for f in builtin_do_fns() {
            r.register_do(f);
        }
        for f in builtin_combine_fns() {
            r.register_combine(f);
        }
        for f in builtin_op_fns() {
            r.register_op(f);
        }
        r
    }

    /// Registers under the function's own name, replacing any previous entry.
    pub fn register_do(&mut self, f: DoFn) {
        self.do_fns.insert(f.name().to_string(), f);
    }

    pub fn register_combine(&mut self, f: CombineFn) {
        self.combine_fns.insert(f.name().to_string(), f);
    }

    pub fn register_op(&mut self, f: OpFn) {
        self.op_fns.insert(f.name().to_string(), f);
    }

    pub fn do_fn(&self, name: &str) -> Result<DoFn> {
        self.do_fns
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Parse(format!("unknown parallel_do function '{name}'")))
    }

    pub fn combine_fn(&self, name: &str) -> Result<CombineFn> {
        self.combine_fns
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Parse(format!("unknown combine function '{name}'")))
    }

    pub fn op_fn(&self, name: &str) -> Result<OpFn> {
        self.op_fns
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Parse(format!("unknown op function '{name}'")))
    }

    /// Sorted names per namespace: (do, combine, op).
    pub fn names(&self) -> (Vec<&str>, Vec<&str>, Vec<&str>) {
        (
            self.do_fns.keys().map(String::as_str).collect(),
            self.combine_fns.keys().map(String::as_str).collect(),
            self.op_fns.keys().map(String::as_str).collect(),
        )
    }
}

fn int(v: &Value) -> i64 {
    v.as_i64().unwrap_or_default()
}

fn builtin_do_fns() -> Vec<DoFn> {
    use ElemType::{Any, Int64, Utf8};
    vec![
        DoFn::map("identity", Any, Any, Value::clone),
        DoFn::map("to_pair", Any, ElemType::pair(Any, Int64), |v| {
            Value::pair(v.clone(), Value::I64(1))
        }),
        DoFn::map(
            "swap",
            ElemType::pair(Any, Any),
            ElemType::pair(Any, Any),
            |v| match v.as_pair() {
                Some((k, x)) => Value::pair(x.clone(), k.clone()),
                None => v.clone(),
            },
        ),
        DoFn::map("double", Int64, Int64, |v| Value::I64(int(v).saturating_mul(2))),
        DoFn::map("increment", Int64, Int64, |v| Value::I64(int(v).saturating_add(1))),
        DoFn::new("split_words", Utf8, Utf8, |v| {
            v.as_str()
                .map(|s| s.split_whitespace().map(Value::str).collect())
                .unwrap_or_default()
        }),
        DoFn::new("keep_even", Int64, Int64, |v| {
            if int(v) % 2 == 0 {
                vec![v.clone()]
            } else {
                Vec::new()
            }
        }),
        DoFn::map("len", Utf8, Int64, |v| {
            Value::I64(v.as_str().map_or(0, |s| s.chars().count() as i64))
        }),
    ]
}

fn builtin_combine_fns() -> Vec<CombineFn> {
    vec![
        CombineFn::new("sum", ElemType::Int64, |a, b| {
            Value::I64(int(a).saturating_add(int(b)))
        }),
        CombineFn::new("max", ElemType::Int64, |a, b| Value::I64(int(a).max(int(b)))),
        CombineFn::new("min", ElemType::Int64, |a, b| Value::I64(int(a).min(int(b)))),
        CombineFn::new("concat", ElemType::Utf8, |a, b| {
            Value::str(format!(
                "{}{}",
                a.as_str().unwrap_or_default(),
                b.as_str().unwrap_or_default()
            ))
        }),
    ]
}

fn builtin_op_fns() -> Vec<OpFn> {
    vec![
        OpFn::new("append", ElemType::Any, |left, right| {
            left.iter().chain(right).cloned().collect()
        }),
        OpFn::new(
            "zip",
            ElemType::pair(ElemType::Any, ElemType::Any),
            |left, right| {
                left.iter()
                    .zip(right)
                    .map(|(l, r)| Value::pair(l.clone(), r.clone()))
                    .collect()
            },
        ),
    ]
}
