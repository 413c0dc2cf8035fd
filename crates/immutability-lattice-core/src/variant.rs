//! Precision variants.
//!
//! The same program can be classified with analyses of different strength.
//! Each variant is a [`PrecisionStrategy`] sharing the model and lattice types;
//! the fixpoint solver is parameterized by one strategy per run.
//!
//! | Variant | effective finality | lazy init | transitive referents | dependent generics |
//! |---------|--------------------|-----------|----------------------|--------------------|
//! | `L0`    | no (`final` only)  | no        | no                   | no                 |
//! | `L1`    | yes                | no        | no                   | no                 |
//! | `L2`    | yes                | yes       | no                   | no                 |
//! | `L3`    | yes                | yes       | yes                  | yes                |

use crate::reference::{classify_reference, ReferenceOutcome};
use immutability_lattice_types::{FieldDecl, FieldImmutability};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariantId {
    L0,
    L1,
    L2,
    L3,
}

impl VariantId {
    pub const ALL: [VariantId; 4] = [VariantId::L0, VariantId::L1, VariantId::L2, VariantId::L3];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantId::L0 => "L0",
            VariantId::L1 => "L1",
            VariantId::L2 => "L2",
            VariantId::L3 => "L3",
        }
    }

    pub fn strategy(self) -> &'static dyn PrecisionStrategy {
        strategy_for(self)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L0" => Ok(VariantId::L0),
            "L1" => Ok(VariantId::L1),
            "L2" => Ok(VariantId::L2),
            "L3" => Ok(VariantId::L3),
            other => Err(format!("unknown variant '{}' (expected L0, L1, L2 or L3)", other)),
        }
    }
}

/// What a variant is able to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Non-final fields written only during initialization count as non-assignable
    pub effective_finality: bool,
    /// Guarded, null-checked single writes are recognised as lazy initialization
    pub lazy_initialization: bool,
    /// Immutability of the referenced object graph is taken into account
    pub transitive_referents: bool,
    /// Generic parameters yield dependent immutability
    pub dependent_generics: bool,
}

/// One precision level of the classifier.
///
/// Class and type stages are shared by all variants; a strategy only shapes
/// the field reference and field stages.
pub trait PrecisionStrategy: Send + Sync {
    fn id(&self) -> VariantId;

    fn capabilities(&self) -> Capabilities;

    fn classify_reference(&self, field: &FieldDecl) -> ReferenceOutcome {
        classify_reference(field, &self.capabilities())
    }

    /// Adjust a field value computed with full transitive knowledge.
    ///
    /// Without transitive capability every non-mutable field is
    /// `NonTransitivelyImmutable`; without dependent generics a dependent
    /// value collapses to the same level.
    fn refine_field(&self, value: FieldImmutability) -> FieldImmutability {
        let caps = self.capabilities();
        match value {
            FieldImmutability::Mutable => FieldImmutability::Mutable,
            _ if !caps.transitive_referents => FieldImmutability::NonTransitivelyImmutable,
            FieldImmutability::DependentlyImmutable(_) if !caps.dependent_generics => {
                FieldImmutability::NonTransitivelyImmutable
            }
            other => other,
        }
    }
}

/// `L0`: only declared `final` fields are non-assignable.
#[derive(Debug, Default)]
pub struct FinalOnly;

/// `L1`: effectively final fields are recognised.
#[derive(Debug, Default)]
pub struct EffectivelyFinal;

/// `L2`: adds thread-safe lazy initialization.
#[derive(Debug, Default)]
pub struct LazyInitialization;

/// `L3`: adds transitive and dependent immutability.
#[derive(Debug, Default)]
pub struct TransitiveReferents;

impl PrecisionStrategy for FinalOnly {
    fn id(&self) -> VariantId {
        VariantId::L0
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            effective_finality: false,
            lazy_initialization: false,
            transitive_referents: false,
            dependent_generics: false,
        }
    }
}

impl PrecisionStrategy for EffectivelyFinal {
    fn id(&self) -> VariantId {
        VariantId::L1
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            effective_finality: true,
            ..FinalOnly.capabilities()
        }
    }
}

impl PrecisionStrategy for LazyInitialization {
    fn id(&self) -> VariantId {
        VariantId::L2
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            lazy_initialization: true,
            ..EffectivelyFinal.capabilities()
        }
    }
}

impl PrecisionStrategy for TransitiveReferents {
    fn id(&self) -> VariantId {
        VariantId::L3
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            effective_finality: true,
            lazy_initialization: true,
            transitive_referents: true,
            dependent_generics: true,
        }
    }
}

static L0: FinalOnly = FinalOnly;
static L1: EffectivelyFinal = EffectivelyFinal;
static L2: LazyInitialization = LazyInitialization;
static L3: TransitiveReferents = TransitiveReferents;

/// Strategy implementing `variant`.
pub fn strategy_for(variant: VariantId) -> &'static dyn PrecisionStrategy {
    match variant {
        VariantId::L0 => &L0,
        VariantId::L1 => &L1,
        VariantId::L2 => &L2,
        VariantId::L3 => &L3,
    }
}
