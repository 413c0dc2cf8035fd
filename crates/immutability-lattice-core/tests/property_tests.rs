//! Property-based tests for the classifiers and the fixpoint solver.
//!
//! Random program models (possibly cyclic) are classified in every variant:
//!
//! 1. **Reference monotonicity**: an extra write site never strengthens a reference
//! 2. **Lattice bound**: `Assignable` references always give `Mutable` fields
//! 3. **Array cap**: array-typed fields are never transitively immutable
//! 4. **Open types**: unpinned open types are always `Mutable`
//! 5. **Idempotence**: resuming from converged results changes nothing

use immutability_lattice_core::{AnalysisSession, SolverConfig, VariantId};
use immutability_lattice_types::{
    FieldDef, FieldImmutability, FieldReferenceMutability, ProgramModel, ProgramModelBuilder,
    TypeExpr, TypeId, TypeImmutability, Visibility, WriteSite,
};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

const MAX_TYPES: usize = 5;

#[derive(Debug, Clone)]
enum SiteSpec {
    Constructor,
    ForeignConstructor,
    Setter,
    Lazy(&'static str),
    LazyUnchecked,
}

#[derive(Debug, Clone)]
struct FieldSpec {
    target: usize,
    array: bool,
    is_final: bool,
    public: bool,
    volatile: bool,
    racy_reads: bool,
    sites: Vec<SiteSpec>,
}

#[derive(Debug, Clone)]
struct TypeSpec {
    closed: bool,
    superclass: Option<usize>,
    fields: Vec<FieldSpec>,
}

fn site() -> impl Strategy<Value = SiteSpec> {
    prop_oneof![
        Just(SiteSpec::Constructor),
        Just(SiteSpec::ForeignConstructor),
        Just(SiteSpec::Setter),
        Just(SiteSpec::Lazy("this")),
        Just(SiteSpec::Lazy("lock")),
        Just(SiteSpec::LazyUnchecked),
    ]
}

fn field() -> impl Strategy<Value = FieldSpec> {
    (
        0..MAX_TYPES,
        any::<bool>(),
        any::<bool>(),
        prop::bool::weighted(0.2),
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec(site(), 0..3),
    )
        .prop_map(|(target, array, is_final, public, volatile, racy_reads, sites)| FieldSpec {
            target,
            array,
            is_final,
            public,
            volatile,
            racy_reads,
            sites,
        })
}

fn program() -> impl Strategy<Value = Vec<TypeSpec>> {
    (1..=MAX_TYPES).prop_flat_map(|count| {
        prop::collection::vec(
            (
                any::<bool>(),
                prop::option::weighted(0.3, 0..count),
                prop::collection::vec(field(), 0..4),
            )
                .prop_map(|(closed, superclass, fields)| TypeSpec {
                    closed,
                    superclass,
                    fields,
                }),
            count,
        )
    })
}

fn to_site(spec: &SiteSpec, owner: TypeId, other: TypeId) -> WriteSite {
    match spec {
        SiteSpec::Constructor => WriteSite::constructor(owner),
        SiteSpec::ForeignConstructor => WriteSite::constructor(other),
        SiteSpec::Setter => WriteSite::method(owner),
        SiteSpec::Lazy(lock) => WriteSite::method(owner).guarded_by(*lock).null_checked(),
        SiteSpec::LazyUnchecked => WriteSite::method(owner).guarded_by("this"),
    }
}

/// Superclass links only point to lower indices, so chains never loop.
fn build(types: &[TypeSpec]) -> ProgramModel {
    let mut b = ProgramModelBuilder::new();
    let ids: Vec<TypeId> = types
        .iter()
        .enumerate()
        .map(|(i, t)| b.add_type(format!("T{}", i), t.closed).unwrap())
        .collect();
    for (i, t) in types.iter().enumerate() {
        if let Some(sup) = t.superclass.filter(|s| *s < i) {
            b.set_superclass(ids[i], ids[sup]).unwrap();
        }
        for (j, f) in t.fields.iter().enumerate() {
            let target = TypeExpr::Concrete(ids[f.target % ids.len()]);
            let declared = if f.array { TypeExpr::Array(Box::new(target)) } else { target };
            let mut def = FieldDef::new(format!("f{}", j), declared);
            def.is_final = f.is_final;
            def.is_volatile = f.volatile;
            def.unsynchronized_reads = f.racy_reads;
            if f.public {
                def = def.visibility(Visibility::Public);
            }
            let other = ids[(i + 1) % ids.len()];
            for s in &f.sites {
                def = def.write(to_site(s, ids[i], other));
            }
            b.add_field(ids[i], def).unwrap();
        }
    }
    b.build().unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn extra_write_never_strengthens_reference(types in program(), extra in site()) {
        let model = build(&types);
        prop_assume!(model.field_count() > 0);
        let field = model.fields().next().map(|f| (f.id, f.owner)).unwrap();
        let other = TypeId(((field.1.index() + 1) % model.type_count()) as u32);
        let extended = model.with_extra_write(field.0, to_site(&extra, field.1, other)).unwrap();

        let before = AnalysisSession::new(model, SolverConfig::strict());
        let after = AnalysisSession::new(extended, SolverConfig::strict());
        for variant in VariantId::ALL {
            let old = before.results(variant).unwrap().reference(field.0);
            let new = after.results(variant).unwrap().reference(field.0);
            prop_assert!(new.is_at_least_as_weak_as(old), "{}: {} -> {}", variant, old, new);
        }
    }

    #[test]
    fn classifications_respect_lattice_bounds(types in program()) {
        let session = AnalysisSession::new(build(&types), SolverConfig::default());
        let model = session.model();
        for results in session.results_for_all().unwrap() {
            for field in model.fields() {
                let value = results.field(field.id);
                if results.reference(field.id) == FieldReferenceMutability::Assignable {
                    prop_assert_eq!(value, &FieldImmutability::Mutable);
                }
                if field.declared_type.is_array() {
                    prop_assert_ne!(value, &FieldImmutability::TransitivelyImmutable);
                }
            }
            for ty in model.types().filter(|t| !t.is_closed) {
                prop_assert_eq!(results.type_immutability(ty.id), &TypeImmutability::Mutable);
            }
        }
    }

    #[test]
    fn resume_is_idempotent(types in program()) {
        let session = AnalysisSession::new(build(&types), SolverConfig::strict());
        for variant in VariantId::ALL {
            let resumed = session.resume(variant).unwrap();
            prop_assert_eq!(resumed.stats().changes, 0);
            prop_assert!(resumed.same_classifications(&session.results(variant).unwrap()));
        }
    }
}
