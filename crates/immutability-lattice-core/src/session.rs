//! Analysis session: one program model, memoized results per variant.
//!
//! The model is frozen when the session is created. Each variant is solved at
//! most once; converged results are shared as `Arc`s and never revised.
//!
//! # Example
//!
//! ```ignore
//! let session = AnalysisSession::new(model, SolverConfig::default());
//! let l3 = session.results(VariantId::L3)?;
//! let all = session.results_for_all()?; // parallel when configured
//! ```

use crate::config::SolverConfig;
use crate::results::ClassificationResults;
use crate::solver::FixpointSolver;
use crate::variant::{strategy_for, VariantId};
use immutability_lattice_types::{AnalysisResult, ProgramModel};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

pub struct AnalysisSession {
    run_id: Uuid,
    model: Arc<ProgramModel>,
    config: SolverConfig,
    /// Dedicated worker pool when `config.threads` is set
    pool: Option<rayon::ThreadPool>,
    cache: RwLock<HashMap<VariantId, Arc<ClassificationResults>>>,
}

impl AnalysisSession {
    pub fn new(model: impl Into<Arc<ProgramModel>>, config: SolverConfig) -> Self {
        let pool = config.threads.and_then(|threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| {
                    warn!(threads = threads, error = %e, "falling back to the global pool")
                })
                .ok()
        });
        let session = Self {
            run_id: Uuid::new_v4(),
            model: model.into(),
            config,
            pool,
            cache: RwLock::new(HashMap::new()),
        };
        debug!(
            run_id = %session.run_id,
            types = session.model.type_count(),
            fields = session.model.field_count(),
            "analysis session created"
        );
        session
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn model(&self) -> &ProgramModel {
        &self.model
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Converged results for `variant`, solving on first use.
    pub fn results(&self, variant: VariantId) -> AnalysisResult<Arc<ClassificationResults>> {
        if let Some(cached) = self.cache.read().get(&variant) {
            trace!(run_id = %self.run_id, variant = %variant, "results cache hit");
            return Ok(Arc::clone(cached));
        }

        let solved = Arc::new(self.install(|| {
            FixpointSolver::new(&self.model, strategy_for(variant), &self.config).solve()
        })?);

        // Another thread may have solved the same variant meanwhile; keep the first.
        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(variant).or_insert(solved)))
    }

    /// Results for every configured variant, in configuration order.
    pub fn results_for_all(&self) -> AnalysisResult<Vec<Arc<ClassificationResults>>> {
        self.results_for(&self.config.variants)
    }

    /// Results for `variants`, solved in parallel when the configuration allows.
    pub fn results_for(
        &self,
        variants: &[VariantId],
    ) -> AnalysisResult<Vec<Arc<ClassificationResults>>> {
        if self.config.parallel && variants.len() > 1 {
            self.install(|| variants.par_iter().map(|v| self.results(*v)).collect())
        } else {
            variants.iter().map(|v| self.results(*v)).collect()
        }
    }

    /// Re-run `variant` seeded with its cached results.
    ///
    /// Returns the fresh run; the cache keeps the original.
    pub fn resume(&self, variant: VariantId) -> AnalysisResult<ClassificationResults> {
        let prior = self.results(variant)?;
        self.install(|| {
            FixpointSolver::new(&self.model, strategy_for(variant), &self.config).resume(&prior)
        })
    }

    /// Variants whose results are already cached, sorted.
    pub fn cached_variants(&self) -> Vec<VariantId> {
        let mut variants: Vec<VariantId> = self.cache.read().keys().copied().collect();
        variants.sort();
        variants
    }

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}
