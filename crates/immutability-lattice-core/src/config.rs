//! Solver configuration.
//!
//! # Example
//!
//! ```
//! use immutability_lattice_core::config::SolverConfig;
//! use immutability_lattice_core::variant::VariantId;
//!
//! let config = SolverConfig::default()
//!     .with_max_iterations(Some(500))
//!     .with_threads(Some(4))
//!     .with_variants(vec![VariantId::L3]);
//!
//! // Sequential, low bound: what unit tests use
//! let strict = SolverConfig::strict();
//! # let _ = (config, strict);
//! ```

use crate::variant::VariantId;
use immutability_lattice_types::env_utils::{env_bool_or, env_list, env_var};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Round bound used by [`SolverConfig::strict`].
const STRICT_MAX_ITERATIONS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Cap on worklist rounds (default: none).
    ///
    /// Every round evaluates the nodes whose dependencies changed in the
    /// previous round. Without a cap the solver derives one from the model:
    /// each round weakens at least one node, and each node can only be
    /// weakened a bounded number of times. Exceeding either bound is a fatal
    /// non-convergence error.
    pub max_iterations: Option<usize>,

    /// Evaluate rounds, variants and oracle checks in parallel (default: true).
    pub parallel: bool,

    /// Size of the worker pool; `None` uses rayon's global pool.
    pub threads: Option<usize>,

    /// Precision variants computed by a session (default: all four).
    pub variants: Vec<VariantId>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            parallel: true,
            threads: None,
            variants: VariantId::ALL.to_vec(),
        }
    }
}

impl SolverConfig {
    /// Sequential evaluation with a low round bound.
    pub fn strict() -> Self {
        Self {
            max_iterations: Some(STRICT_MAX_ITERATIONS),
            parallel: false,
            threads: None,
            variants: VariantId::ALL.to_vec(),
        }
    }

    /// Defaults overridden by `IMMUTABILITY_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `IMMUTABILITY_MAX_ITERATIONS` | `max_iterations` |
    /// | `IMMUTABILITY_PARALLEL` | `parallel` |
    /// | `IMMUTABILITY_THREADS` | `threads` |
    /// | `IMMUTABILITY_VARIANTS` | `variants` (comma-separated, e.g. `L1,L3`) |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut variants = Vec::new();
        for name in env_list("IMMUTABILITY_VARIANTS") {
            match name.parse::<VariantId>() {
                Ok(v) if !variants.contains(&v) => variants.push(v),
                Ok(_) => {}
                Err(e) => warn!("ignoring IMMUTABILITY_VARIANTS entry: {}", e),
            }
        }
        if variants.is_empty() {
            variants = defaults.variants;
        }

        Self {
            max_iterations: env_var::<usize>("IMMUTABILITY_MAX_ITERATIONS")
                .or(defaults.max_iterations),
            parallel: env_bool_or("IMMUTABILITY_PARALLEL", defaults.parallel),
            threads: env_var::<usize>("IMMUTABILITY_THREADS").filter(|n| *n > 0),
            variants,
        }
    }

    /// Builder method: cap the number of rounds; `None` derives the bound from the model.
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Builder method: enable or disable parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builder method: set the worker pool size.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Builder method: restrict the variants a session computes.
    pub fn with_variants(mut self, variants: Vec<VariantId>) -> Self {
        self.variants = variants;
        self
    }
}
