//! Field reference classification.
//!
//! Decides whether a field's reference can change once the owning object (or,
//! for static fields, the class) is initialized. First match wins:
//!
//! 1. Non-final field visible outside its type: `Assignable`.
//! 2. No mutator sites: `NonAssignable`.
//! 3. Mutator sites forming a thread-safe lazy initialization:
//!    `LazilyInitializedThreadSafe`.
//! 4. Otherwise `Assignable`.
//!
//! A write site is an *initializer site* when it sits in the owner's own
//! constructor (static initializer for static fields) and runs at most once.
//! Any other write is a *mutator site*.
//!
//! Lazy initialization requires, for every mutator site: the same monitor, a
//! check of the field's default value before the store, and the stored value
//! computed inside the guarded region. The field must have no initializer
//! sites, and readers outside the guard are only allowed when the field is
//! `volatile`.

use crate::variant::Capabilities;
use immutability_lattice_types::{
    FieldDecl, FieldReferenceMutability, Visibility, WriteLocation, WriteSite,
};

/// Result of classifying one field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOutcome {
    pub value: FieldReferenceMutability,
    /// Set when a lazy-initialization idiom was present but not accepted
    pub downgrade: Option<String>,
}

impl ReferenceOutcome {
    fn of(value: FieldReferenceMutability) -> Self {
        Self { value, downgrade: None }
    }

    fn downgraded(reason: &str) -> Self {
        Self {
            value: FieldReferenceMutability::Assignable,
            downgrade: Some(reason.to_string()),
        }
    }
}

pub fn is_initializer_site(field: &FieldDecl, site: &WriteSite) -> bool {
    let expected = if field.is_static {
        WriteLocation::StaticInitializer
    } else {
        WriteLocation::Constructor
    };
    site.enclosing == field.owner && !site.repeatable && site.location == expected
}

pub fn classify_reference(field: &FieldDecl, caps: &Capabilities) -> ReferenceOutcome {
    use FieldReferenceMutability::*;

    if !caps.effective_finality {
        return ReferenceOutcome::of(if field.is_final { NonAssignable } else { Assignable });
    }

    if !field.is_final && field.visibility != Visibility::Private {
        return ReferenceOutcome::of(Assignable);
    }

    let (initializers, mutators): (Vec<&WriteSite>, Vec<&WriteSite>) = field
        .write_sites
        .iter()
        .partition(|site| is_initializer_site(field, site));

    if mutators.is_empty() {
        return ReferenceOutcome::of(NonAssignable);
    }

    if !caps.lazy_initialization {
        return ReferenceOutcome::of(Assignable);
    }

    let attempted = mutators
        .iter()
        .any(|site| site.guard.is_some() || site.guarded_by_null_check);
    match lazy_init_violation(field, &initializers, &mutators) {
        None => ReferenceOutcome::of(LazilyInitializedThreadSafe),
        Some(reason) if attempted => ReferenceOutcome::downgraded(reason),
        Some(_) => ReferenceOutcome::of(Assignable),
    }
}

/// First reason the mutator sites fail to form a thread-safe lazy initialization.
fn lazy_init_violation(
    field: &FieldDecl,
    initializers: &[&WriteSite],
    mutators: &[&WriteSite],
) -> Option<&'static str> {
    if !initializers.is_empty() {
        return Some("lazy write alongside an initializer write");
    }

    let first_guard = mutators.first().and_then(|site| site.guard.as_ref());
    let Some(lock) = first_guard else {
        return Some("lazy write outside any monitor");
    };
    if mutators.iter().any(|site| site.guard.as_ref() != Some(lock)) {
        return Some("lazy writes guarded by different monitors");
    }
    if mutators.iter().any(|site| !site.guarded_by_null_check) {
        return Some("lazy write without a default-value check");
    }
    if mutators.iter().any(|site| !site.value_in_guard) {
        return Some("stored value computed outside the guarded region");
    }
    if field.unsynchronized_reads && !field.is_volatile {
        return Some("non-volatile field read outside the guard");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{strategy_for, VariantId};
    use immutability_lattice_types::{FieldId, TypeExpr, TypeId};

    const OWNER: TypeId = TypeId(0);
    const OTHER: TypeId = TypeId(1);

    fn field(sites: Vec<WriteSite>) -> FieldDecl {
        FieldDecl {
            id: FieldId(0),
            owner: OWNER,
            name: "f".into(),
            declared_type: TypeExpr::Concrete(OTHER),
            is_final: false,
            is_static: false,
            is_volatile: false,
            visibility: Visibility::Private,
            write_sites: sites,
            unsynchronized_reads: false,
        }
    }

    fn classify(field: &FieldDecl, variant: VariantId) -> ReferenceOutcome {
        strategy_for(variant).classify_reference(field)
    }

    fn lazy_site() -> WriteSite {
        WriteSite::method(OWNER).guarded_by("this").null_checked()
    }

    #[test]
    fn test_public_writable_field_is_assignable() {
        let mut f = field(vec![]);
        f.visibility = Visibility::Public;
        assert_eq!(classify(&f, VariantId::L3).value, FieldReferenceMutability::Assignable);

        f.is_final = true;
        assert_eq!(classify(&f, VariantId::L3).value, FieldReferenceMutability::NonAssignable);
    }

    #[test]
    fn test_constructor_only_write_is_effectively_final() {
        let f = field(vec![WriteSite::constructor(OWNER)]);
        assert_eq!(classify(&f, VariantId::L1).value, FieldReferenceMutability::NonAssignable);
        assert_eq!(classify(&f, VariantId::L0).value, FieldReferenceMutability::Assignable);
    }

    #[test]
    fn test_foreign_or_repeated_constructor_write_is_mutator() {
        let f = field(vec![WriteSite::constructor(OTHER)]);
        assert_eq!(classify(&f, VariantId::L3).value, FieldReferenceMutability::Assignable);

        let f = field(vec![WriteSite::constructor(OWNER).repeatable(true)]);
        assert_eq!(classify(&f, VariantId::L3).value, FieldReferenceMutability::Assignable);

        let mut f = field(vec![WriteSite::constructor(OWNER)]);
        f.is_static = true;
        assert_eq!(classify(&f, VariantId::L3).value, FieldReferenceMutability::Assignable);
    }

    #[test]
    fn test_guarded_null_checked_write_is_lazy() {
        let f = field(vec![lazy_site(), lazy_site()]);
        let outcome = classify(&f, VariantId::L2);
        assert_eq!(outcome.value, FieldReferenceMutability::LazilyInitializedThreadSafe);
        assert!(outcome.downgrade.is_none());

        assert_eq!(classify(&f, VariantId::L1).value, FieldReferenceMutability::Assignable);
        assert!(classify(&f, VariantId::L1).downgrade.is_none());
    }

    #[test]
    fn test_broken_lazy_idioms_are_downgraded() {
        let cases = vec![
            field(vec![lazy_site(), WriteSite::constructor(OWNER)]),
            field(vec![lazy_site(), WriteSite::method(OWNER).guarded_by("lock").null_checked()]),
            field(vec![WriteSite::method(OWNER).guarded_by("this")]),
            field(vec![lazy_site().value_outside_guard()]),
            field(vec![WriteSite::method(OWNER).null_checked()]),
            {
                let mut f = field(vec![lazy_site()]);
                f.unsynchronized_reads = true;
                f
            },
        ];
        for f in cases {
            let outcome = classify(&f, VariantId::L3);
            assert_eq!(outcome.value, FieldReferenceMutability::Assignable);
            assert!(outcome.downgrade.is_some(), "expected a downgrade for {:?}", f.write_sites);
        }
    }

    #[test]
    fn test_volatile_field_may_be_read_outside_guard() {
        let mut f = field(vec![lazy_site()]);
        f.unsynchronized_reads = true;
        f.is_volatile = true;
        assert_eq!(
            classify(&f, VariantId::L3).value,
            FieldReferenceMutability::LazilyInitializedThreadSafe
        );
    }

    #[test]
    fn test_plain_setter_is_assignable_without_note() {
        let f = field(vec![WriteSite::method(OWNER)]);
        let outcome = classify(&f, VariantId::L3);
        assert_eq!(outcome.value, FieldReferenceMutability::Assignable);
        assert!(outcome.downgrade.is_none());
    }
}
