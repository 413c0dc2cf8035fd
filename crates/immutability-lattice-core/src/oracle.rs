//! Expected classifications.
//!
//! An oracle states the label one entity must carry, optionally only for some
//! precision variants, optionally negated, and optionally only when other
//! assumed facts hold in the same run.
//!
//! ```json
//! { "target": { "field": { "owner": "Generic", "name": "t" } },
//!   "expect": { "field": { "dependently_immutable": ["T"] } },
//!   "variants": ["L3"], "negate": false, "reason": "bound by T" }
//! ```

use crate::variant::VariantId;
use immutability_lattice_types::{
    ClassImmutability, FieldImmutability, FieldReferenceMutability, TypeImmutability,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which stage's output an oracle checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    FieldReference,
    Field,
    Class,
    Type,
}

impl PropertyKind {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyKind::FieldReference => "field reference",
            PropertyKind::Field => "field",
            PropertyKind::Class => "class",
            PropertyKind::Type => "type",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected label, tagged with its property kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyExpectation {
    FieldReference(FieldReferenceMutability),
    Field(FieldImmutability),
    Class(ClassImmutability),
    Type(TypeImmutability),
}

impl PropertyExpectation {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyExpectation::FieldReference(_) => PropertyKind::FieldReference,
            PropertyExpectation::Field(_) => PropertyKind::Field,
            PropertyExpectation::Class(_) => PropertyKind::Class,
            PropertyExpectation::Type(_) => PropertyKind::Type,
        }
    }
}

impl fmt::Display for PropertyExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyExpectation::FieldReference(v) => write!(f, "{}", v),
            PropertyExpectation::Field(v) => write!(f, "{}", v),
            PropertyExpectation::Class(v) => write!(f, "{}", v),
            PropertyExpectation::Type(v) => write!(f, "{}", v),
        }
    }
}

/// Entity an oracle talks about, by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleTarget {
    Type(String),
    Field { owner: String, name: String },
}

impl OracleTarget {
    pub fn field(owner: impl Into<String>, name: impl Into<String>) -> Self {
        OracleTarget::Field {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn type_named(name: impl Into<String>) -> Self {
        OracleTarget::Type(name.into())
    }
}

impl fmt::Display for OracleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleTarget::Type(name) => f.write_str(name),
            OracleTarget::Field { owner, name } => write!(f, "{}.{}", owner, name),
        }
    }
}

/// A fact that must hold for an oracle to be checked at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub target: OracleTarget,
    pub expect: PropertyExpectation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub target: OracleTarget,
    pub expect: PropertyExpectation,
    /// Variants the expectation applies to; empty means every variant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantId>,
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preconditions: Vec<Precondition>,
}

impl Oracle {
    pub fn new(target: OracleTarget, expect: PropertyExpectation) -> Self {
        Self {
            target,
            expect,
            variants: Vec::new(),
            negate: false,
            reason: String::new(),
            preconditions: Vec::new(),
        }
    }

    pub fn for_variants(mut self, variants: impl IntoIterator<Item = VariantId>) -> Self {
        self.variants = variants.into_iter().collect();
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn requires(mut self, target: OracleTarget, expect: PropertyExpectation) -> Self {
        self.preconditions.push(Precondition { target, expect });
        self
    }

    pub fn applies_to(&self, variant: VariantId) -> bool {
        self.variants.is_empty() || self.variants.contains(&variant)
    }
}
