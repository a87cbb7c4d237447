//! GroupByKey sharing split.

use sluice_core::graph::{Graph, Node};
use sluice_rewrite::{rule, Strategy};

/// Any GroupByKey becomes a fresh copy. When it sits directly on a Flatten,
/// that Flatten is copied as well so the grouped union cannot be rewritten
/// through another consumer.
pub fn group_by_key_split() -> impl Strategy {
    rule("group_by_key_split", |g: &mut Graph, id| {
        let Node::GroupByKey { input } = g.node(id) else {
            return None;
        };
        let input = *input;
        if matches!(g.node(input), Node::Flatten { .. }) {
            let union = g.copy(input);
            return Some(g.derive(Node::GroupByKey { input: union }, id));
        }
        Some(g.copy(id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::config::OptimizerConfig;
    use sluice_core::func::CombineFn;
    use sluice_core::types::{ElemType, Value};
    use sluice_rewrite::{everywhere, Rewriter};

    fn kv() -> ElemType {
        ElemType::pair(ElemType::Utf8, ElemType::Int64)
    }

    fn first() -> CombineFn {
        CombineFn::new("first", ElemType::Int64, |a: &Value, _: &Value| a.clone())
    }

    #[test]
    fn test_two_combines_get_distinct_group_by_keys() {
        let mut g = Graph::new();
        let src = g.load("mem://kv", kv());
        let gbk = g.group_by_key(src).unwrap();
        let c1 = g.combine(gbk, first()).unwrap();
        let c2 = g.combine(gbk, first()).unwrap();

        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = everywhere(group_by_key_split()).apply_all(&mut cx, &[c1, c2]);
        let g = cx.graph();
        let g1 = g.children(out[0])[0];
        let g2 = g.children(out[1])[0];
        assert_ne!(g1, g2);
        assert_ne!(g1, gbk);
        assert_eq!(g.origin(g1), gbk);
        assert_eq!(g.origin(g2), gbk);
    }

    #[test]
    fn test_flatten_under_group_by_key_is_copied() {
        let mut g = Graph::new();
        let a = g.load("mem://a", kv());
        let b = g.load("mem://b", kv());
        let union = g.flatten(vec![a, b]).unwrap();
        let gbk = g.group_by_key(union).unwrap();

        let mut cx = Rewriter::new(&mut g, OptimizerConfig::default());
        let out = group_by_key_split().apply(&mut cx, gbk).unwrap();
        let g = cx.graph();
        let new_union = g.children(out)[0];
        assert_ne!(new_union, union);
        assert_eq!(g.children(new_union), &[a, b]);
    }
}
