//! Type-erased functions carried by `ParallelDo`, `Combine` and `Op` nodes.
//!
//! Each function is a boxed closure over `Value`s plus the `ElemType`s it
//! consumes and produces. Composition checks those types once, when the
//! composed function is built, so a fused `ParallelDo` never defers a type
//! error to execution time.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{ElemType, Value};

type ElemFn = dyn Fn(&Value) -> Vec<Value> + Send + Sync;
type ReduceFn = dyn Fn(&Value, &Value) -> Value + Send + Sync;
type PairFn = dyn Fn(&[Value], &[Value]) -> Vec<Value> + Send + Sync;

/// Element-wise transform: one input record to zero or more output records.
#[derive(Clone)]
pub struct DoFn {
    name: String,
    input: ElemType,
    output: ElemType,
    f: Arc<ElemFn>,
}

impl DoFn {
    pub fn new<F>(name: impl Into<String>, input: ElemType, output: ElemType, f: F) -> Self
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input,
            output,
            f: Arc::new(f),
        }
    }

    /// One-to-one transform.
    pub fn map<F>(name: impl Into<String>, input: ElemType, output: ElemType, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::new(name, input, output, move |v| vec![f(v)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &ElemType {
        &self.input
    }

    pub fn output(&self) -> &ElemType {
        &self.output
    }

    pub fn apply(&self, v: &Value) -> Vec<Value> {
        (self.f)(v)
    }

    /// Compose "apply `self`, then apply `next` to each element it produces".
    pub fn then(&self, next: &DoFn) -> Result<DoFn> {
        if !self.output.is_compatible(&next.input) {
            return Err(Error::type_mismatch(
                format!("fusing `{}` into `{}`", self.name, next.name),
                &next.input,
                &self.output,
            ));
        }
        let first = Arc::clone(&self.f);
        let second = Arc::clone(&next.f);
        Ok(DoFn {
            name: format!("{}>>{}", self.name, next.name),
            input: self.input.clone(),
            output: next.output.clone(),
            f: Arc::new(move |v| first(v).iter().flat_map(|x| second(x)).collect()),
        })
    }
}

impl fmt::Debug for DoFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DoFn({}: {} -> {})", self.name, self.input, self.output)
    }
}

/// Associative per-key reduction over values of one type.
#[derive(Clone)]
pub struct CombineFn {
    name: String,
    value: ElemType,
    f: Arc<ReduceFn>,
}

impl CombineFn {
    pub fn new<F>(name: impl Into<String>, value: ElemType, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            value,
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ElemType {
        &self.value
    }

    /// Left fold of the values. `None` for an empty group.
    pub fn reduce(&self, values: &[Value]) -> Option<Value> {
        let (first, rest) = values.split_first()?;
        Some(rest.iter().fold(first.clone(), |acc, v| (self.f)(&acc, v)))
    }

    /// The same reduction expressed element-wise over already-grouped records:
    /// `Pair(k, List(vs))` becomes `Pair(k, reduce(vs))`, empty groups vanish.
    pub fn to_do_fn(&self, key: ElemType) -> DoFn {
        let reducer = self.clone();
        DoFn::new(
            format!("combine[{}]", self.name),
            ElemType::pair(key.clone(), ElemType::list(self.value.clone())),
            ElemType::pair(key, self.value.clone()),
            move |rec| {
                let Some((k, vs)) = rec.as_pair() else {
                    return Vec::new();
                };
                let Some(vs) = vs.as_list() else {
                    return Vec::new();
                };
                reducer
                    .reduce(vs)
                    .map(|r| vec![Value::pair(k.clone(), r)])
                    .unwrap_or_default()
            },
        )
    }
}

impl fmt::Debug for CombineFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombineFn({}: {})", self.name, self.value)
    }
}

/// Binary combinator over the full record sequences of two inputs.
#[derive(Clone)]
pub struct OpFn {
    name: String,
    output: ElemType,
    f: Arc<PairFn>,
}

impl OpFn {
    pub fn new<F>(name: impl Into<String>, output: ElemType, f: F) -> Self
    where
        F: Fn(&[Value], &[Value]) -> Vec<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            output,
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &ElemType {
        &self.output
    }

    pub fn apply(&self, left: &[Value], right: &[Value]) -> Vec<Value> {
        (self.f)(left, right)
    }
}

impl fmt::Debug for OpFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpFn({}: {})", self.name, self.output)
    }
}
