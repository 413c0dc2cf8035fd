//! # Oracle Validator
//!
//! Checks converged classifications against oracles, one check per
//! (oracle, applicable variant) pair.
//!
//! ## Architecture
//!
//! ```text
//! AnalysisSession ──► Validator ──► ValidationReport
//!        │                │
//!        │                ├── validate()          every configured variant
//!        │                └── validate_variant()  one variant
//!        │
//!        └── Arc<ClassificationResults> per variant
//! ```
//!
//! ## Outcomes
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | actual == expected (or != when negated) | passed |
//! | a precondition does not hold in the same variant | skipped |
//! | a precondition has a missing target or the wrong kind | precondition mismatch, E301/E302 |
//! | target not in the model | mismatch, code E301 |
//! | field property on a type target, or the reverse | mismatch, code E302 |
//! | otherwise | mismatch |
//!
//! Mismatches never abort the run; every check is performed.

use crate::oracle::{Oracle, OracleTarget, PropertyExpectation, PropertyKind};
use crate::results::ClassificationResults;
use crate::session::AnalysisSession;
use crate::variant::VariantId;
use chrono::{DateTime, Utc};
use immutability_lattice_types::{AnalysisResult, ErrorCode, FieldId, ProgramModel, TypeId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::info;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub variant: VariantId,
    /// Oracle target as written (`Owner.field` or `Type`)
    pub entity: String,
    pub kind: PropertyKind,
    pub expected: String,
    /// `None` when the target could not be resolved
    pub actual: Option<String>,
    pub negated: bool,
    /// Set for structural failures (unknown target, kind mismatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Position of the oracle in its input list
    pub oracle_index: usize,
}

impl Mismatch {
    pub fn describe(&self) -> String {
        let expected = if self.negated {
            format!("anything but {}", self.expected)
        } else {
            self.expected.clone()
        };
        let mut line = format!(
            "[{}] {} ({}): expected {}",
            self.variant, self.entity, self.kind, expected
        );
        match (&self.actual, self.code) {
            (Some(actual), _) => {
                let _ = write!(line, ", found {}", actual);
            }
            (None, Some(code)) => {
                let _ = write!(line, ", {}", code);
            }
            (None, None) => {}
        }
        if !self.reason.is_empty() {
            let _ = write!(line, " -- {}", self.reason);
        }
        line
    }
}

/// Result of a single (oracle, variant) check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Skipped,
    Failed(Mismatch),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub variants: Vec<VariantId>,
    pub checked: usize,
    pub passed: usize,
    pub skipped: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    fn from_outcomes(variants: Vec<VariantId>, outcomes: Vec<CheckOutcome>) -> Self {
        let mut report = Self {
            generated_at: Utc::now(),
            variants,
            checked: outcomes.len(),
            passed: 0,
            skipped: 0,
            mismatches: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                CheckOutcome::Passed => report.passed += 1,
                CheckOutcome::Skipped => report.skipped += 1,
                CheckOutcome::Failed(m) => report.mismatches.push(m),
            }
        }
        report.mismatches.sort_by(|a, b| {
            (a.variant, &a.entity, a.kind, a.oracle_index).cmp(&(
                b.variant,
                &b.entity,
                b.kind,
                b.oracle_index,
            ))
        });
        report
    }

    pub fn is_success(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Fold another report in, e.g. from a second fixture.
    pub fn merge(&mut self, other: ValidationReport) {
        for v in other.variants {
            if !self.variants.contains(&v) {
                self.variants.push(v);
            }
        }
        self.variants.sort();
        self.checked += other.checked;
        self.passed += other.passed;
        self.skipped += other.skipped;
        self.mismatches.extend(other.mismatches);
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let variants: Vec<&str> = self.variants.iter().map(VariantId::as_str).collect();
        let _ = writeln!(
            out,
            "validation [{}]: {} checked, {} passed, {} skipped, {} mismatches",
            variants.join(", "),
            self.checked,
            self.passed,
            self.skipped,
            self.mismatches.len()
        );
        for mismatch in &self.mismatches {
            let _ = writeln!(out, "  {}", mismatch.describe());
        }
        out
    }
}

pub struct Validator<'a> {
    session: &'a AnalysisSession,
}

impl<'a> Validator<'a> {
    pub fn new(session: &'a AnalysisSession) -> Self {
        Self { session }
    }

    /// Check every oracle in every configured variant it applies to.
    pub fn validate(&self, oracles: &[Oracle]) -> AnalysisResult<ValidationReport> {
        self.validate_variants(&self.session.config().variants, oracles)
    }

    /// Check the oracles that apply to `variant` only.
    pub fn validate_variant(
        &self,
        variant: VariantId,
        oracles: &[Oracle],
    ) -> AnalysisResult<ValidationReport> {
        self.validate_variants(&[variant], oracles)
    }

    fn validate_variants(
        &self,
        variants: &[VariantId],
        oracles: &[Oracle],
    ) -> AnalysisResult<ValidationReport> {
        let results = self.session.results_for(variants)?;
        let model = self.session.model();

        let checks: Vec<(&ClassificationResults, usize, &Oracle)> = results
            .iter()
            .flat_map(|r| {
                oracles
                    .iter()
                    .enumerate()
                    .filter(move |(_, oracle)| oracle.applies_to(r.variant()))
                    .map(move |(index, oracle)| (&**r, index, oracle))
            })
            .collect();

        let check = |(results, index, oracle): &(&ClassificationResults, usize, &Oracle)| {
            check_oracle(model, results, *index, oracle)
        };
        let outcomes: Vec<CheckOutcome> = if self.session.config().parallel {
            checks.par_iter().map(check).collect()
        } else {
            checks.iter().map(check).collect()
        };

        let report = ValidationReport::from_outcomes(variants.to_vec(), outcomes);
        info!(
            run_id = %self.session.run_id(),
            checked = report.checked,
            passed = report.passed,
            skipped = report.skipped,
            mismatches = report.mismatches.len(),
            "validation finished"
        );
        Ok(report)
    }
}

/// Check one oracle against one variant's results.
pub fn check_oracle(
    model: &ProgramModel,
    results: &ClassificationResults,
    index: usize,
    oracle: &Oracle,
) -> CheckOutcome {
    let mut preconditions_hold = true;
    for pre in &oracle.preconditions {
        match actual_value(model, results, &pre.target, &pre.expect) {
            Ok(actual) => preconditions_hold &= actual == pre.expect,
            // A precondition that cannot be evaluated fails the oracle instead of hiding it.
            Err(code) => {
                return CheckOutcome::Failed(Mismatch {
                    variant: results.variant(),
                    entity: pre.target.to_string(),
                    kind: pre.expect.kind(),
                    expected: pre.expect.to_string(),
                    actual: None,
                    negated: false,
                    code: Some(code),
                    reason: format!("precondition of the oracle on {}", oracle.target),
                    oracle_index: index,
                })
            }
        }
    }
    if !preconditions_hold {
        return CheckOutcome::Skipped;
    }

    let mismatch = |actual: Option<String>, code: Option<ErrorCode>| Mismatch {
        variant: results.variant(),
        entity: oracle.target.to_string(),
        kind: oracle.expect.kind(),
        expected: oracle.expect.to_string(),
        actual,
        negated: oracle.negate,
        code,
        reason: oracle.reason.clone(),
        oracle_index: index,
    };

    match actual_value(model, results, &oracle.target, &oracle.expect) {
        Err(code) => CheckOutcome::Failed(mismatch(None, Some(code))),
        Ok(actual) if (actual == oracle.expect) != oracle.negate => CheckOutcome::Passed,
        Ok(actual) => CheckOutcome::Failed(mismatch(Some(actual.to_string()), None)),
    }
}

enum Entity {
    Field(FieldId),
    Type(TypeId),
}

fn resolve_target(model: &ProgramModel, target: &OracleTarget) -> Option<Entity> {
    match target {
        OracleTarget::Type(name) => model.type_by_name(name).map(Entity::Type),
        OracleTarget::Field { owner, name } => model
            .type_by_name(owner)
            .and_then(|owner| model.field_by_name(owner, name))
            .map(Entity::Field),
    }
}

/// Computed value of the property `expect` names, on `target`.
fn actual_value(
    model: &ProgramModel,
    results: &ClassificationResults,
    target: &OracleTarget,
    expect: &PropertyExpectation,
) -> Result<PropertyExpectation, ErrorCode> {
    let entity = resolve_target(model, target).ok_or(ErrorCode::UnknownOracleTarget)?;
    match (entity, expect.kind()) {
        (Entity::Field(id), PropertyKind::FieldReference) => {
            Ok(PropertyExpectation::FieldReference(results.reference(id)))
        }
        (Entity::Field(id), PropertyKind::Field) => {
            Ok(PropertyExpectation::Field(results.field(id).clone()))
        }
        (Entity::Type(id), PropertyKind::Class) => {
            Ok(PropertyExpectation::Class(results.class(id).clone()))
        }
        (Entity::Type(id), PropertyKind::Type) => {
            Ok(PropertyExpectation::Type(results.type_immutability(id).clone()))
        }
        _ => Err(ErrorCode::PropertyKindMismatch),
    }
}
