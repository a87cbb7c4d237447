//! Pipeline front-ends that build a `Graph` for the optimizer.

pub mod yaml;
