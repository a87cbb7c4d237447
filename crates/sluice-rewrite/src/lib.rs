#![forbid(unsafe_code)]
//! sluice-rewrite: a small strategy-combinator toolkit over `sluice_core::Graph`.
//!
//! A *strategy* tries to rewrite one node and either fails (no match) or
//! returns the id of a replacement node. Strategies compose:
//!
//! - `rule(name, f)`: a single partial node-to-node transformation
//! - `seq(a, b)`, `attempt(s)`, `repeat(s)`: success/failure combinators
//! - `everywhere(s)`, `everywhere_shared(s)`, `top_down_once(s)`: traversals
//!
//! The engine knows nothing about node kinds beyond `children`, `rebuild` and
//! `NodeKind::is_exclusive`, so every traversal is written once and reused by
//! all rules.

pub mod rewriter;
pub mod strategy;
pub mod traverse;

pub use rewriter::{rewrite, RewriteStats, Rewriter};
pub use strategy::{
    attempt, repeat, repeat_with_measure, rule, seq, Attempt, BoxStrategy, Measure, Repeat, Rule,
    Seq, Strategy,
};
pub use traverse::{everywhere, everywhere_shared, top_down_once, Everywhere, Sharing, TopDownOnce};
