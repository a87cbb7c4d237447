//! Optimizer configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Upper bound on passes of any `repeat`-driven rewrite. Hitting it means a
    /// rule does not terminate, which is a bug in the rule, so it panics.
    pub max_fixpoint_passes: usize,

    /// Assert that each repeated pass strictly decreases the rule's measure.
    pub verify_measures: bool,

    /// Check the structural post-conditions on the optimized graph.
    pub verify_result: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_fixpoint_passes: 10_000,
            verify_measures: cfg!(debug_assertions),
            verify_result: cfg!(debug_assertions),
        }
    }
}

impl OptimizerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SLUICE_MAX_FIXPOINT_PASSES`: pass bound for repeated rewrites
    /// - `SLUICE_VERIFY_MEASURES`: `true`/`false`
    /// - `SLUICE_VERIFY_RESULT`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("SLUICE_MAX_FIXPOINT_PASSES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_fixpoint_passes = v;
            }
        }

        if let Ok(s) = std::env::var("SLUICE_VERIFY_MEASURES") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.verify_measures = v;
            }
        }

        if let Ok(s) = std::env::var("SLUICE_VERIFY_RESULT") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.verify_result = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_fixpoint_passes == 0 {
            return Err(Error::Config(
                "max_fixpoint_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
