//! JSON fixture documents.
//!
//! A fixture is one program declaration plus the oracles it must satisfy:
//!
//! ```json
//! {
//!   "name": "EmptyClass",
//!   "types": [{ "name": "EmptyClass" }],
//!   "oracles": [{ "target": { "type": "EmptyClass" }, "expect": { "type": "mutable" } }]
//! }
//! ```
//!
//! Loading goes through `anyhow` so callers see which file and which stage
//! failed; the analysis itself reports typed `AnalysisError`s underneath.

use anyhow::{Context, Result};
use immutability_lattice_core::{
    AnalysisSession, ClassificationSummary, Oracle, SolverConfig, ValidationReport, Validator,
    VariantId,
};
use immutability_lattice_types::{ProgramDecl, ProgramModel};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub program: ProgramDecl,
    #[serde(default)]
    pub oracles: Vec<Oracle>,
}

impl FixtureDocument {
    /// Read a fixture from disk. An unnamed fixture takes its file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let mut doc =
            Self::from_json(&text).with_context(|| format!("in fixture {}", path.display()))?;
        if doc.name.is_empty() {
            doc.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        debug!(
            fixture = %doc.name,
            types = doc.program.types.len(),
            oracles = doc.oracles.len(),
            "fixture loaded"
        );
        Ok(doc)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("malformed fixture document")
    }

    /// Resolve the declaration into a checked program model.
    pub fn model(&self) -> Result<ProgramModel> {
        self.program
            .clone()
            .into_model()
            .with_context(|| format!("invalid program model in fixture '{}'", self.name))
    }

    pub fn session(&self, config: SolverConfig) -> Result<AnalysisSession> {
        Ok(AnalysisSession::new(self.model()?, config))
    }

    /// Classify every entity under one variant.
    pub fn classify(
        &self,
        config: SolverConfig,
        variant: VariantId,
    ) -> Result<ClassificationSummary> {
        let session = self.session(config)?;
        let results = session
            .results(variant)
            .with_context(|| {
                format!("classification of '{}' failed under {}", self.name, variant)
            })?;
        Ok(results.summary(session.model()))
    }

    /// Check the fixture's oracles. An empty `variants` means the configured ones.
    pub fn validate(
        &self,
        config: SolverConfig,
        variants: &[VariantId],
    ) -> Result<ValidationReport> {
        let config = if variants.is_empty() {
            config
        } else {
            config.with_variants(variants.to_vec())
        };
        let session = self.session(config)?;
        Validator::new(&session)
            .validate(&self.oracles)
            .with_context(|| format!("validation of '{}' failed", self.name))
    }
}

/// Read a JSON solver configuration; missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<SolverConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("malformed config {}", path.display()))
}

/// Plain-text table of one variant's classifications.
pub fn render_summary(summary: &ClassificationSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "variant {}", summary.variant);

    let _ = writeln!(out, "fields:");
    for field in &summary.fields {
        let _ = writeln!(
            out,
            "  {}.{:<24} {:<28} {}",
            field.owner, field.name, field.reference, field.immutability
        );
    }

    let _ = writeln!(out, "types:");
    for ty in &summary.types {
        let pinned = if ty.pinned { " (pinned)" } else { "" };
        let _ = writeln!(
            out,
            "  {:<26} class {:<32} type {}{}",
            ty.name, ty.class, ty.type_immutability, pinned
        );
    }

    if !summary.downgrades.is_empty() {
        let _ = writeln!(out, "downgrades:");
        for downgrade in &summary.downgrades {
            let _ = writeln!(out, "  {}: {}", downgrade.path, downgrade.reason);
        }
    }

    let stats = &summary.stats;
    let _ = writeln!(
        out,
        "converged after {} rounds ({} evaluations, {} changes)",
        stats.rounds, stats.evaluations, stats.changes
    );
    out
}
