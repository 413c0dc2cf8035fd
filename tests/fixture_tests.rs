//! Fixture suite: every document under `tests/fixtures/` must validate cleanly.
//!
//! Each fixture carries its own oracles, with per-variant expectations. A
//! failure prints the full report so every violated expectation is visible.

use immutability_lattice::FixtureDocument;
use immutability_lattice_core::{SolverConfig, VariantId};
use immutability_lattice_types::{
    ClassImmutability, FieldImmutability, FieldReferenceMutability, TypeImmutability,
};
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(name: &str) -> FixtureDocument {
    FixtureDocument::load(&fixtures_dir().join(name)).unwrap()
}

fn assert_fixture_passes(name: &str) {
    let doc = load(name);
    for config in [SolverConfig::strict(), SolverConfig::default()] {
        let report = doc.validate(config, &[]).unwrap();
        assert!(report.is_success(), "{}\n{}", name, report.render_text());
        assert!(report.passed > 0, "{} checked nothing", name);
    }
}

// =============================================================================
// Fixture documents
// =============================================================================

#[test]
fn test_empty_classes_fixture() {
    assert_fixture_passes("empty_classes.json");
}

#[test]
fn test_generic_fields_fixture() {
    assert_fixture_passes("generic_fields.json");
}

#[test]
fn test_array_escape_fixture() {
    assert_fixture_passes("array_escape.json");
}

#[test]
fn test_directly_set_field_fixture() {
    assert_fixture_passes("directly_set_field.json");
}

#[test]
fn test_lazy_initialization_fixture() {
    assert_fixture_passes("lazy_initialization.json");
}

#[test]
fn test_cyclic_types_fixture() {
    assert_fixture_passes("cyclic_types.json");
}

#[test]
fn test_every_fixture_is_covered() {
    let mut names: Vec<String> = std::fs::read_dir(fixtures_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".json"))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "array_escape.json",
            "cyclic_types.json",
            "directly_set_field.json",
            "empty_classes.json",
            "generic_fields.json",
            "lazy_initialization.json",
        ]
    );
}

// =============================================================================
// Reports
// =============================================================================

#[test]
fn test_precondition_skips_are_counted() {
    let doc = load("directly_set_field.json");
    let report = doc.validate(SolverConfig::strict(), &[]).unwrap();
    // The lazy-reference precondition never holds, in any variant.
    assert_eq!(report.skipped, 4);
    assert_eq!(report.checked, report.passed + report.skipped);
}

#[test]
fn test_single_variant_validation() {
    let doc = load("generic_fields.json");
    let report = doc.validate(SolverConfig::strict(), &[VariantId::L3]).unwrap();
    assert!(report.is_success(), "{}", report.render_text());
    assert_eq!(report.variants, vec![VariantId::L3]);
}

#[test]
fn test_broken_expectation_is_reported() {
    let mut doc = load("empty_classes.json");
    // Flip the open-type oracle: EmptyClass is not transitively immutable as a type.
    doc.oracles[1].expect = immutability_lattice_core::PropertyExpectation::Type(
        TypeImmutability::TransitivelyImmutable,
    );
    let report = doc.validate(SolverConfig::strict(), &[]).unwrap();
    assert_eq!(report.mismatches.len(), 4);
    assert!(report.mismatches.iter().all(|m| m.entity == "EmptyClass"));
    assert!(report.render_text().contains("expected TransitivelyImmutable, found Mutable"));
}

#[test]
fn test_classify_summary_matches_oracles() {
    let doc = load("generic_fields.json");
    let summary = doc.classify(SolverConfig::strict(), VariantId::L3).unwrap();

    let field = |owner: &str, name: &str| {
        summary
            .fields
            .iter()
            .find(|f| f.owner == owner && f.name == name)
            .map(|f| f.immutability.clone())
            .unwrap()
    };
    assert_eq!(field("NestedGenericFields", "dependent"), FieldImmutability::dependent_on(["T"]));
    assert_eq!(
        field("NestedGenericFields", "transitive"),
        FieldImmutability::TransitivelyImmutable
    );

    let object = summary.types.iter().find(|t| t.name == "Object").unwrap();
    assert!(object.pinned);
    assert_eq!(object.type_immutability, TypeImmutability::Mutable);
}

#[test]
fn test_effectively_final_array_separates_l0_from_l1() {
    let doc = load("array_escape.json");
    let array1 = |variant| {
        let summary = doc.classify(SolverConfig::strict(), variant).unwrap();
        let field = summary.fields.iter().find(|f| f.name == "array1").unwrap();
        (field.reference, field.immutability.clone())
    };
    assert_eq!(
        array1(VariantId::L0),
        (FieldReferenceMutability::Assignable, FieldImmutability::Mutable)
    );
    assert_eq!(
        array1(VariantId::L1),
        (FieldReferenceMutability::NonAssignable, FieldImmutability::NonTransitivelyImmutable)
    );
}

#[test]
fn test_open_class_keeps_class_and_type_apart() {
    let doc = load("directly_set_field.json");
    let summary = doc.classify(SolverConfig::strict(), VariantId::L3).unwrap();
    let ty = summary
        .types
        .iter()
        .find(|t| t.name == "ClassWithDirectlySetDeepImmutableField")
        .unwrap();
    assert_eq!(ty.class, ClassImmutability::TransitivelyImmutable);
    assert_eq!(ty.type_immutability, TypeImmutability::Mutable);
}

#[test]
fn test_setter_makes_nested_generic_field_mutable() {
    let doc = load("generic_fields.json");
    for variant in VariantId::ALL {
        let summary = doc.classify(SolverConfig::strict(), variant).unwrap();
        let field = summary.fields.iter().find(|f| f.name == "nestedMutable").unwrap();
        assert_eq!(field.reference, FieldReferenceMutability::Assignable, "{}", variant);
        assert_eq!(field.immutability, FieldImmutability::Mutable, "{}", variant);
    }
}
