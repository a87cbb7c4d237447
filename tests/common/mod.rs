//! Shared pipeline fixtures for the integration tests.
#![allow(dead_code)]

use sluice_core::func::{CombineFn, DoFn, OpFn};
use sluice_core::graph::Graph;
use sluice_core::handle::SinkHandle;
use sluice_core::id::NodeId;
use sluice_core::types::{ElemType, Value};
use sluice_exec::Bindings;

pub struct Fixture {
    pub name: String,
    pub graph: Graph,
    pub outputs: Vec<NodeId>,
    pub data: Bindings,
}

pub fn kv() -> ElemType {
    ElemType::pair(ElemType::Utf8, ElemType::Int64)
}

pub fn grouped() -> ElemType {
    ElemType::pair(ElemType::Utf8, ElemType::list(ElemType::Int64))
}

pub fn rec(k: &str, v: i64) -> Value {
    Value::pair(Value::str(k), Value::I64(v))
}

pub fn add(n: i64) -> DoFn {
    DoFn::map(format!("add{n}"), ElemType::Int64, ElemType::Int64, move |v| {
        Value::I64(v.as_i64().unwrap_or_default() + n)
    })
}

pub fn keep_even() -> DoFn {
    DoFn::new("keep_even", ElemType::Int64, ElemType::Int64, |v| {
        if v.as_i64().unwrap_or_default() % 2 == 0 {
            vec![v.clone()]
        } else {
            Vec::new()
        }
    })
}

pub fn key_by_parity() -> DoFn {
    DoFn::map("key_by_parity", ElemType::Int64, kv(), |v| {
        let n = v.as_i64().unwrap_or_default();
        let key = if n % 2 == 0 { "even" } else { "odd" };
        Value::pair(Value::str(key), Value::I64(n))
    })
}

pub fn scale_values() -> DoFn {
    DoFn::map("scale_values", kv(), kv(), |v| match v.as_pair() {
        Some((k, x)) => Value::pair(k.clone(), Value::I64(x.as_i64().unwrap_or_default() * 10)),
        None => v.clone(),
    })
}

pub fn same_groups() -> DoFn {
    DoFn::map("same_groups", grouped(), grouped(), |v| v.clone())
}

pub fn sum() -> CombineFn {
    CombineFn::new("sum", ElemType::Int64, |a, b| {
        Value::I64(a.as_i64().unwrap_or_default() + b.as_i64().unwrap_or_default())
    })
}

pub fn total() -> DoFn {
    DoFn::map("total", ElemType::list(ElemType::Int64), ElemType::Int64, |v| {
        Value::I64(v.as_list().unwrap_or_default().iter().filter_map(Value::as_i64).sum())
    })
}

pub fn append_kv() -> OpFn {
    OpFn::new("append_kv", kv(), |l, r| l.iter().chain(r).cloned().collect())
}

pub fn append() -> OpFn {
    OpFn::new("append", ElemType::Int64, |l, r| l.iter().chain(r).cloned().collect())
}

fn ints(xs: &[i64]) -> Vec<Value> {
    xs.iter().map(|&x| Value::I64(x)).collect()
}

fn fixture(name: &str, graph: Graph, outputs: Vec<NodeId>, data: Bindings) -> Fixture {
    Fixture {
        name: name.to_string(),
        graph,
        outputs,
        data,
    }
}

/// Hand-written pipelines, each aimed at one or two rules.
pub fn fixtures() -> Vec<Fixture> {
    let mut all = Vec::new();

    // Flatten feeding a ParallelDo, consumed twice.
    {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let b = g.load("mem://b", ElemType::Int64);
        let f = g.flatten(vec![a, b]).unwrap();
        let p = g.parallel_do(f, add(1)).unwrap();
        let q = g.parallel_do(f, add(2)).unwrap();
        let data = Bindings::from([
            ("mem://a".to_string(), ints(&[1, 2, 3])),
            ("mem://b".to_string(), ints(&[10, 20])),
        ]);
        all.push(fixture("shared_flatten", g, vec![p, q], data));
    }

    // Nested flattens with ParallelDo chains on top.
    {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let b = g.load("mem://b", ElemType::Int64);
        let pa = g.parallel_do(a, add(1)).unwrap();
        let inner = g.flatten(vec![pa, b]).unwrap();
        let outer = g.flatten(vec![inner, a, inner]).unwrap();
        let p1 = g.parallel_do(outer, add(2)).unwrap();
        let p2 = g.parallel_do(p1, keep_even()).unwrap();
        let data = Bindings::from([
            ("mem://a".to_string(), ints(&[1, 2, 3, 4])),
            ("mem://b".to_string(), ints(&[5, 6])),
        ]);
        all.push(fixture("nested_flatten_chain", g, vec![p2], data));
    }

    // Word-count shape: one GroupByKey consumed by two Combines.
    {
        let mut g = Graph::new();
        let src = g.load("mem://kv", kv());
        let gbk = g.group_by_key(src).unwrap();
        let c1 = g.combine(gbk, sum()).unwrap();
        let c2 = g.combine(gbk, sum()).unwrap();
        let scaled = g.parallel_do(c2, scale_values()).unwrap();
        let data = Bindings::from([(
            "mem://kv".to_string(),
            vec![rec("a", 1), rec("b", 2), rec("a", 3)],
        )]);
        all.push(fixture("shared_group_by_key", g, vec![c1, scaled], data));
    }

    // Combine that is not directly over a GroupByKey, then a union.
    {
        let mut g = Graph::new();
        let src = g.load("mem://kv", kv());
        let gbk = g.group_by_key(src).unwrap();
        let same = g.parallel_do(gbk, same_groups()).unwrap();
        let other = g.load("mem://groups", grouped());
        let union = g.flatten(vec![same, other]).unwrap();
        let c = g.combine(union, sum()).unwrap();
        let p = g.parallel_do(c, scale_values()).unwrap();
        let data = Bindings::from([
            ("mem://kv".to_string(), vec![rec("x", 1), rec("x", 2), rec("y", 4)]),
            (
                "mem://groups".to_string(),
                vec![Value::pair(Value::str("z"), Value::List(ints(&[7, 8])))],
            ),
        ]);
        all.push(fixture("combine_over_union", g, vec![p, c], data));
    }

    // Output ParallelDo that also feeds another ParallelDo, plus a sink.
    {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let x = g.parallel_do(a, add(1)).unwrap();
        let y = g.parallel_do(x, add(2)).unwrap();
        let z = g.parallel_do(y, add(3)).unwrap();
        let m = g.materialize(z, SinkHandle::new("mem://out", "json")).unwrap();
        let data = Bindings::from([("mem://a".to_string(), ints(&[0, 5]))]);
        all.push(fixture("output_feeds_chain", g, vec![x, m], data));
    }

    // Op and Return leaves mixed into a union.
    {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let one = g.ret(Value::I64(1), ElemType::Int64).unwrap();
        let op = g.op(a, one, append()).unwrap();
        let f = g.flatten(vec![op, a]).unwrap();
        let p = g.parallel_do(f, add(100)).unwrap();
        let data = Bindings::from([("mem://a".to_string(), ints(&[2, 3]))]);
        all.push(fixture("op_and_return", g, vec![p], data));
    }

    // Union of an untyped list source and an Int64 list source.
    {
        let mut g = Graph::new();
        let anys = g.load("mem://anys", ElemType::list(ElemType::Any));
        let lists = g.load("mem://lists", ElemType::list(ElemType::Int64));
        let f = g.flatten(vec![anys, lists]).unwrap();
        let p = g.parallel_do(f, total()).unwrap();
        let data = Bindings::from([
            ("mem://anys".to_string(), vec![Value::List(ints(&[1, 2])), Value::List(Vec::new())]),
            ("mem://lists".to_string(), vec![Value::List(ints(&[3, 4, 5]))]),
        ]);
        all.push(fixture("any_typed_union", g, vec![p], data));
    }

    // Output ParallelDo over a union, with a second output stacked on it.
    {
        let mut g = Graph::new();
        let a = g.load("mem://a", ElemType::Int64);
        let b = g.load("mem://b", ElemType::Int64);
        let f = g.flatten(vec![a, b]).unwrap();
        let p = g.parallel_do(f, add(1)).unwrap();
        let q = g.parallel_do(p, add(2)).unwrap();
        let data = Bindings::from([
            ("mem://a".to_string(), ints(&[1, 2])),
            ("mem://b".to_string(), ints(&[30])),
        ]);
        all.push(fixture("output_over_flatten", g, vec![f, p, q], data));
    }

    // Keyed aggregation below a ladder of self-joining Ops.
    {
        let mut g = Graph::new();
        let src = g.load("mem://kv", kv());
        let gbk = g.group_by_key(src).unwrap();
        let mut top = g.combine(gbk, sum()).unwrap();
        for _ in 0..4 {
            top = g.op(top, top, append_kv()).unwrap();
        }
        let data = Bindings::from([("mem://kv".to_string(), vec![rec("a", 1), rec("a", 2)])]);
        all.push(fixture("combine_under_diamonds", g, vec![top], data));
    }

    all
}

/// xorshift64*; deterministic across platforms.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    pub fn pick(&mut self, pool: &[NodeId]) -> NodeId {
        pool[self.below(pool.len())]
    }
}

/// A small random DAG mixing every node kind, with plenty of sharing.
pub fn random_pipeline(seed: u64) -> Fixture {
    let mut rng = Rng::new(seed);
    let mut g = Graph::new();
    let mut nums = vec![
        g.load("mem://n0", ElemType::Int64),
        g.load("mem://n1", ElemType::Int64),
    ];
    let mut kvs = vec![g.load("mem://kv", kv())];
    let mut groups: Vec<NodeId> = Vec::new();

    let steps = 6 + rng.below(5);
    for _ in 0..steps {
        match rng.below(10) {
            0 => {
                let n = rng.pick(&nums);
                nums.push(g.parallel_do(n, add(1)).unwrap());
            }
            1 => {
                let n = rng.pick(&nums);
                nums.push(g.parallel_do(n, keep_even()).unwrap());
            }
            2 => {
                let k = 2 + rng.below(2);
                let inputs: Vec<NodeId> = (0..k).map(|_| rng.pick(&nums)).collect();
                nums.push(g.flatten(inputs).unwrap());
            }
            3 => {
                let n = rng.pick(&nums);
                kvs.push(g.parallel_do(n, key_by_parity()).unwrap());
            }
            4 => {
                let inputs = vec![rng.pick(&kvs), rng.pick(&kvs)];
                kvs.push(g.flatten(inputs).unwrap());
            }
            5 => {
                let k = rng.pick(&kvs);
                groups.push(g.group_by_key(k).unwrap());
            }
            6 if !groups.is_empty() => {
                let gr = rng.pick(&groups);
                kvs.push(g.combine(gr, sum()).unwrap());
            }
            7 if !groups.is_empty() => {
                let gr = rng.pick(&groups);
                groups.push(g.parallel_do(gr, same_groups()).unwrap());
            }
            8 => {
                let n = rng.pick(&nums);
                let sink = SinkHandle::new(format!("mem://sink{}", g.len()), "json");
                nums.push(g.materialize(n, sink).unwrap());
            }
            _ => {
                let (l, r) = (rng.pick(&nums), rng.pick(&nums));
                nums.push(g.op(l, r, append()).unwrap());
            }
        }
    }

    let mut pool: Vec<NodeId> = nums.iter().chain(&kvs).chain(&groups).copied().collect();
    pool.sort();
    let count = 1 + rng.below(3);
    let outputs: Vec<NodeId> = (0..count).map(|_| rng.pick(&pool[pool.len() / 2..])).collect();

    let data = Bindings::from([
        ("mem://n0".to_string(), ints(&[1, 2, 3])),
        ("mem://n1".to_string(), ints(&[4, 7])),
        ("mem://kv".to_string(), vec![rec("even", 2), rec("odd", 1), rec("z", 9)]),
    ]);
    fixture(&format!("random_{seed}"), g, outputs, data)
}
