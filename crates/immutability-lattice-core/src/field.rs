//! Field immutability classification.
//!
//! Combines a field's reference classification with the immutability of the
//! object graph its declared type can reach:
//!
//! ```text
//! reference Assignable                  -> Mutable
//! declared type T[]                     -> NonTransitivelyImmutable
//! declared type T (generic parameter)   -> DependentlyImmutable({T})
//! declared type C (concrete)            -> TypeImmutability(C), non-transitive unless transitive
//! declared type C<A1..An>               -> see `classify_parameterized`
//! ```
//!
//! Reference laziness does not lower the ceiling: a lazily initialized field
//! of a transitively immutable type is transitively immutable.

use crate::variant::PrecisionStrategy;
use immutability_lattice_types::{
    FieldDecl, FieldImmutability, FieldReferenceMutability, ProgramModel, TypeExpr, TypeId,
    TypeImmutability,
};

/// Classify one field against the current type immutability of the types it references.
pub fn classify_field<F>(
    model: &ProgramModel,
    field: &FieldDecl,
    reference: FieldReferenceMutability,
    strategy: &dyn PrecisionStrategy,
    type_immutability: F,
) -> FieldImmutability
where
    F: Fn(TypeId) -> TypeImmutability,
{
    if reference == FieldReferenceMutability::Assignable {
        return FieldImmutability::Mutable;
    }
    let value = classify_type_expr(model, &field.declared_type, &type_immutability);
    strategy.refine_field(value)
}

/// Immutability of the object graph reachable through a value of type `expr`,
/// assuming the reference itself never changes.
///
/// Never returns `Mutable`: a fixed reference to mutable state is still
/// non-transitively immutable.
pub fn classify_type_expr<F>(
    model: &ProgramModel,
    expr: &TypeExpr,
    type_immutability: &F,
) -> FieldImmutability
where
    F: Fn(TypeId) -> TypeImmutability,
{
    match expr {
        TypeExpr::Array(_) => FieldImmutability::NonTransitivelyImmutable,
        TypeExpr::GenericParam(param) => FieldImmutability::dependent_on([param.clone()]),
        TypeExpr::Concrete(id) => match type_immutability(*id) {
            TypeImmutability::TransitivelyImmutable => FieldImmutability::TransitivelyImmutable,
            // Raw use of a generic type: arguments are unknown
            _ => FieldImmutability::NonTransitivelyImmutable,
        },
        TypeExpr::Parameterized(base, args) => {
            classify_parameterized(model, *base, args, type_immutability)
        }
    }
}

/// `Base<A1..An>`: a base that depends on parameter `Pi` contributes the
/// classification of argument `Ai`; arguments at positions the base does not
/// depend on are irrelevant. A base depending on a parameter it does not
/// declare is non-transitively immutable whatever the arguments.
fn classify_parameterized<F>(
    model: &ProgramModel,
    base: TypeId,
    args: &[TypeExpr],
    type_immutability: &F,
) -> FieldImmutability
where
    F: Fn(TypeId) -> TypeImmutability,
{
    let depends_on = match type_immutability(base) {
        TypeImmutability::TransitivelyImmutable => return FieldImmutability::TransitivelyImmutable,
        TypeImmutability::Mutable | TypeImmutability::NonTransitivelyImmutable => {
            return FieldImmutability::NonTransitivelyImmutable
        }
        TypeImmutability::DependentlyImmutable(params) => params,
    };

    let declared = &model.type_decl(base).generic_params;
    // Parameters inherited from a generic superclass are not bound by these arguments.
    if depends_on.iter().any(|param| !declared.contains(param)) {
        return FieldImmutability::NonTransitivelyImmutable;
    }
    declared
        .iter()
        .zip(args)
        .filter(|(param, _)| depends_on.contains(*param))
        .fold(FieldImmutability::TransitivelyImmutable, |acc, (_, arg)| {
            acc.meet(&classify_type_expr(model, arg, type_immutability))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantId;
    use immutability_lattice_types::{FieldDef, ProgramModelBuilder, TypeExprSpec, WriteSite};
    use std::collections::HashMap;

    struct Fixture {
        model: ProgramModel,
        types: HashMap<&'static str, TypeImmutability>,
    }

    impl Fixture {
        /// Generic<T> (dependent on T), Box<T> (mutable), Leaf (transitive), Holder<T>.
        fn new(fields: &[(&str, &str)]) -> Self {
            let mut b = ProgramModelBuilder::new();
            let generic = b.add_type("Generic", true).unwrap();
            b.add_generic_param(generic, "T").unwrap();
            let boxed = b.add_type("Box", false).unwrap();
            b.add_generic_param(boxed, "T").unwrap();
            b.add_type("Leaf", true).unwrap();
            b.add_type("Mutable", true).unwrap();
            let holder = b.add_type("Holder", true).unwrap();
            b.add_generic_param(holder, "T").unwrap();
            for (name, ty) in fields {
                let expr = b.resolve(holder, &TypeExprSpec::parse(ty).unwrap()).unwrap();
                b.add_field(
                    holder,
                    FieldDef::new(*name, expr).final_().write(WriteSite::constructor(holder)),
                )
                .unwrap();
            }
            let types = HashMap::from([
                ("Generic", TypeImmutability::dependent_on(["T"])),
                ("Box", TypeImmutability::Mutable),
                ("Leaf", TypeImmutability::TransitivelyImmutable),
                ("Mutable", TypeImmutability::Mutable),
                ("Holder", TypeImmutability::TransitivelyImmutable),
            ]);
            Self { model: b.build().unwrap(), types }
        }

        fn classify(&self, field: &str, variant: VariantId) -> FieldImmutability {
            let holder = self.model.type_by_name("Holder").unwrap();
            let decl = self.model.field(self.model.field_by_name(holder, field).unwrap());
            let strategy = variant.strategy();
            let reference = strategy.classify_reference(decl).value;
            classify_field(&self.model, decl, reference, strategy, |id| {
                self.types[self.model.type_decl(id).name.as_str()].clone()
            })
        }
    }

    #[test]
    fn test_nested_generics() {
        let fx = Fixture::new(&[
            ("dependent", "Generic<Generic<T>>"),
            ("transitive", "Generic<Generic<Leaf>>"),
            ("shallow", "Generic<Generic<Mutable>>"),
            ("container", "Box<Leaf>"),
            ("raw", "Generic"),
        ]);
        assert_eq!(fx.classify("dependent", VariantId::L3), FieldImmutability::dependent_on(["T"]));
        assert_eq!(
            fx.classify("transitive", VariantId::L3),
            FieldImmutability::TransitivelyImmutable
        );
        assert_eq!(
            fx.classify("shallow", VariantId::L3),
            FieldImmutability::NonTransitivelyImmutable
        );
        assert_eq!(
            fx.classify("container", VariantId::L3),
            FieldImmutability::NonTransitivelyImmutable
        );
        assert_eq!(fx.classify("raw", VariantId::L3), FieldImmutability::NonTransitivelyImmutable);
    }

    #[test]
    fn test_parameter_not_declared_by_base() {
        let mut b = ProgramModelBuilder::new();
        let sub = b.add_type("Sub", true).unwrap();
        b.add_generic_param(sub, "U").unwrap();
        let leaf = b.add_type("Leaf", true).unwrap();
        let expr = TypeExpr::Parameterized(sub, vec![TypeExpr::Concrete(leaf)]);
        let model = b.build().unwrap();

        // Sub<U> inherits a dependency on its superclass's T
        let value = classify_type_expr(&model, &expr, &|id: TypeId| {
            if id == sub {
                TypeImmutability::dependent_on(["T"])
            } else {
                TypeImmutability::TransitivelyImmutable
            }
        });
        assert_eq!(value, FieldImmutability::NonTransitivelyImmutable);
    }

    #[test]
    fn test_arrays_are_capped() {
        let fx = Fixture::new(&[("leaves", "Leaf[]"), ("params", "T[]")]);
        assert_eq!(
            fx.classify("leaves", VariantId::L3),
            FieldImmutability::NonTransitivelyImmutable
        );
        assert_eq!(
            fx.classify("params", VariantId::L3),
            FieldImmutability::NonTransitivelyImmutable
        );
    }

    #[test]
    fn test_generic_parameter_and_weaker_variants() {
        let fx = Fixture::new(&[("t", "T"), ("leaf", "Leaf")]);
        assert_eq!(fx.classify("t", VariantId::L3), FieldImmutability::dependent_on(["T"]));
        assert_eq!(fx.classify("t", VariantId::L2), FieldImmutability::NonTransitivelyImmutable);
        assert_eq!(fx.classify("leaf", VariantId::L3), FieldImmutability::TransitivelyImmutable);
        assert_eq!(fx.classify("leaf", VariantId::L1), FieldImmutability::NonTransitivelyImmutable);
    }

    #[test]
    fn test_assignable_reference_is_mutable() {
        let fx = Fixture::new(&[("leaf", "Leaf")]);
        let holder = fx.model.type_by_name("Holder").unwrap();
        let decl = fx.model.field(fx.model.field_by_name(holder, "leaf").unwrap());
        let value = classify_field(
            &fx.model,
            decl,
            FieldReferenceMutability::Assignable,
            VariantId::L3.strategy(),
            |_| TypeImmutability::TransitivelyImmutable,
        );
        assert_eq!(value, FieldImmutability::Mutable);
    }
}
