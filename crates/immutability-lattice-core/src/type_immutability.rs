//! Type immutability classification.

use immutability_lattice_types::{ClassImmutability, TypeDecl, TypeImmutability};

/// Immutability guaranteed for every instance of `decl`, subclasses included.
///
/// Pinned library types keep their assumed value. An open type can gain a
/// mutable subclass at any time, so only closed types inherit their class value.
pub fn classify_type(
    decl: &TypeDecl,
    class: &ClassImmutability,
    pinned: Option<&TypeImmutability>,
) -> TypeImmutability {
    if let Some(pinned) = pinned {
        return pinned.clone();
    }
    if !decl.is_closed {
        return TypeImmutability::Mutable;
    }
    TypeImmutability::from(class.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use immutability_lattice_types::TypeId;

    fn decl(is_closed: bool) -> TypeDecl {
        TypeDecl {
            id: TypeId(0),
            name: "EmptyClass".into(),
            is_closed,
            fields: vec![],
            superclass: None,
            generic_params: vec![],
        }
    }

    #[test]
    fn test_open_type_is_mutable() {
        let class = ClassImmutability::TransitivelyImmutable;
        assert_eq!(classify_type(&decl(false), &class, None), TypeImmutability::Mutable);
        assert_eq!(
            classify_type(&decl(true), &class, None),
            TypeImmutability::TransitivelyImmutable
        );
    }

    #[test]
    fn test_closed_type_maps_level_for_level() {
        let class = ClassImmutability::dependent_on(["T"]);
        assert_eq!(
            classify_type(&decl(true), &class, None),
            TypeImmutability::dependent_on(["T"])
        );
    }

    #[test]
    fn test_pinned_value_wins() {
        let pinned = TypeImmutability::TransitivelyImmutable;
        assert_eq!(
            classify_type(&decl(false), &ClassImmutability::Mutable, Some(&pinned)),
            pinned
        );
    }
}
