//! Classification lattices.
//!
//! Every lattice is ordered from the weakest guarantee (most mutable) to the
//! strongest one:
//!
//! ```text
//! FieldReferenceMutability:  Assignable ⊐ LazilyInitializedThreadSafe ⊐ NonAssignable
//! Field/Class/Type level:    Mutable ⊐ NonTransitivelyImmutable
//!                              ⊐ DependentlyImmutable(P) ⊐ TransitivelyImmutable
//! ```
//!
//! `meet` combines two values by keeping the weaker guarantee. Two dependent
//! values meet to a dependent value over the union of their parameters.

use crate::ids::ParamId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Set of unresolved generic parameters carried by a dependent value.
pub type ParamSet = BTreeSet<ParamId>;

/// Whether a field's reference can change after the owning object is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldReferenceMutability {
    /// The reference may be reassigned at any time.
    Assignable,
    /// Assigned at most once after construction, under a guard that serializes writers.
    LazilyInitializedThreadSafe,
    /// Assigned only during initialization.
    NonAssignable,
}

impl FieldReferenceMutability {
    /// Position in the lattice; higher is weaker.
    pub fn rank(self) -> u8 {
        match self {
            FieldReferenceMutability::Assignable => 2,
            FieldReferenceMutability::LazilyInitializedThreadSafe => 1,
            FieldReferenceMutability::NonAssignable => 0,
        }
    }

    pub fn meet(self, other: Self) -> Self {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }

    pub fn is_at_least_as_weak_as(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldReferenceMutability::Assignable => "Assignable",
            FieldReferenceMutability::LazilyInitializedThreadSafe => "LazilyInitializedThreadSafe",
            FieldReferenceMutability::NonAssignable => "NonAssignable",
        }
    }
}

impl fmt::Display for FieldReferenceMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Generates one four-level immutability lattice.
///
/// Field, class and type immutability share their shape but are distinct
/// properties, so each gets its own type.
macro_rules! immutability_lattice {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            Mutable,
            NonTransitivelyImmutable,
            /// Immutable once every listed generic parameter is bound to an immutable type.
            DependentlyImmutable(ParamSet),
            TransitivelyImmutable,
        }

        impl $name {
            /// Position in the lattice; higher is weaker.
            pub fn rank(&self) -> u8 {
                match self {
                    $name::Mutable => 3,
                    $name::NonTransitivelyImmutable => 2,
                    $name::DependentlyImmutable(_) => 1,
                    $name::TransitivelyImmutable => 0,
                }
            }

            /// Combine two values, keeping the weaker guarantee.
            pub fn meet(&self, other: &Self) -> Self {
                match (self, other) {
                    ($name::DependentlyImmutable(a), $name::DependentlyImmutable(b)) => {
                        $name::DependentlyImmutable(a.union(b).cloned().collect())
                    }
                    _ if self.rank() >= other.rank() => self.clone(),
                    _ => other.clone(),
                }
            }

            /// True when `self` is `other` or weaker.
            pub fn is_at_least_as_weak_as(&self, other: &Self) -> bool {
                self.meet(other) == *self
            }

            pub fn dependent_on<I, P>(params: I) -> Self
            where
                I: IntoIterator<Item = P>,
                P: Into<ParamId>,
            {
                $name::DependentlyImmutable(params.into_iter().map(Into::into).collect())
            }

            /// Parameters of a dependent value, `None` for every other level.
            pub fn params(&self) -> Option<&ParamSet> {
                match self {
                    $name::DependentlyImmutable(params) => Some(params),
                    _ => None,
                }
            }

            fn from_level(level: Level) -> Self {
                match level {
                    Level::Mutable => $name::Mutable,
                    Level::NonTransitive => $name::NonTransitivelyImmutable,
                    Level::Dependent(p) => $name::DependentlyImmutable(p),
                    Level::Transitive => $name::TransitivelyImmutable,
                }
            }

            fn into_level(self) -> Level {
                match self {
                    $name::Mutable => Level::Mutable,
                    $name::NonTransitivelyImmutable => Level::NonTransitive,
                    $name::DependentlyImmutable(p) => Level::Dependent(p),
                    $name::TransitivelyImmutable => Level::Transitive,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $name::Mutable => f.write_str("Mutable"),
                    $name::NonTransitivelyImmutable => f.write_str("NonTransitivelyImmutable"),
                    $name::DependentlyImmutable(params) => {
                        let names: Vec<&str> = params.iter().map(ParamId::as_str).collect();
                        write!(f, "DependentlyImmutable({})", names.join(", "))
                    }
                    $name::TransitivelyImmutable => f.write_str("TransitivelyImmutable"),
                }
            }
        }
    };
}

// Shared carrier for the level-for-level conversions below.
enum Level {
    Mutable,
    NonTransitive,
    Dependent(ParamSet),
    Transitive,
}

immutability_lattice!(
    /// Immutability of a single field: its reference and the object graph behind it.
    FieldImmutability
);

immutability_lattice!(
    /// Immutability of one class declaration, ignoring possible subclasses.
    ClassImmutability
);

immutability_lattice!(
    /// Immutability guaranteed for every instance of a type, subclasses included.
    TypeImmutability
);

impl FieldImmutability {
    /// Resolve a dependent value against concrete parameter bindings.
    ///
    /// Bound parameters contribute the binding's value; unbound parameters stay
    /// dependent. Non-dependent values are returned unchanged.
    pub fn instantiate(&self, bindings: &BTreeMap<ParamId, FieldImmutability>) -> Self {
        let FieldImmutability::DependentlyImmutable(params) = self else {
            return self.clone();
        };
        params
            .iter()
            .fold(FieldImmutability::TransitivelyImmutable, |acc, param| {
                let bound = bindings
                    .get(param)
                    .cloned()
                    .unwrap_or_else(|| FieldImmutability::dependent_on([param.clone()]));
                acc.meet(&bound)
            })
    }
}

impl From<ClassImmutability> for TypeImmutability {
    fn from(value: ClassImmutability) -> Self {
        TypeImmutability::from_level(value.into_level())
    }
}

impl From<FieldImmutability> for ClassImmutability {
    fn from(value: FieldImmutability) -> Self {
        ClassImmutability::from_level(value.into_level())
    }
}

impl From<TypeImmutability> for FieldImmutability {
    fn from(value: TypeImmutability) -> Self {
        FieldImmutability::from_level(value.into_level())
    }
}
