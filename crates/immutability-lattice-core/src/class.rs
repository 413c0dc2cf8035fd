//! Class immutability classification.
//!
//! A class is as immutable as the weakest of its own fields and its
//! superclass. Possible subclasses are ignored; that is the type stage's job.

use immutability_lattice_types::{ClassImmutability, FieldImmutability};

/// Meet over own field values and the superclass value.
///
/// `Mutable` beats `NonTransitivelyImmutable`, which beats
/// `DependentlyImmutable` (parameters unioned), which beats
/// `TransitivelyImmutable`. A class with no fields and no superclass is
/// vacuously transitively immutable.
pub fn classify_class<'a, I>(fields: I, superclass: Option<&ClassImmutability>) -> ClassImmutability
where
    I: IntoIterator<Item = &'a FieldImmutability>,
{
    let own = fields
        .into_iter()
        .fold(ClassImmutability::TransitivelyImmutable, |acc, field| {
            acc.meet(&ClassImmutability::from(field.clone()))
        });
    match superclass {
        Some(sup) => own.meet(sup),
        None => own,
    }
}
