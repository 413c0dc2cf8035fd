//! Converged classification results for one precision variant.

use crate::variant::VariantId;
use immutability_lattice_types::{
    ClassImmutability, FieldId, FieldImmutability, FieldReferenceMutability, ProgramModel, TypeId,
    TypeImmutability,
};
use serde::{Deserialize, Serialize};

/// A conservative weakening caused by an unsupported synchronization idiom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downgrade {
    pub field: FieldId,
    /// `Owner.field`
    pub path: String,
    pub reason: String,
}

/// Statistics about one solver run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub nodes: usize,
    pub dependency_edges: usize,
    pub pinned_types: usize,
    pub rounds: usize,
    pub evaluations: usize,
    pub changes: usize,
}

/// Frozen per-entity classifications, indexed by arena id.
#[derive(Debug, Clone)]
pub struct ClassificationResults {
    pub(crate) variant: VariantId,
    pub(crate) references: Vec<FieldReferenceMutability>,
    pub(crate) fields: Vec<FieldImmutability>,
    pub(crate) classes: Vec<ClassImmutability>,
    pub(crate) types: Vec<TypeImmutability>,
    pub(crate) downgrades: Vec<Downgrade>,
    pub(crate) stats: SolverStats,
}

impl ClassificationResults {
    pub fn variant(&self) -> VariantId {
        self.variant
    }

    pub fn reference(&self, id: FieldId) -> FieldReferenceMutability {
        self.references[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldImmutability {
        &self.fields[id.index()]
    }

    pub fn class(&self, id: TypeId) -> &ClassImmutability {
        &self.classes[id.index()]
    }

    pub fn type_immutability(&self, id: TypeId) -> &TypeImmutability {
        &self.types[id.index()]
    }

    pub fn downgrades(&self) -> &[Downgrade] {
        &self.downgrades
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// True when every classification equals `other`'s; statistics are ignored.
    pub fn same_classifications(&self, other: &Self) -> bool {
        self.references == other.references
            && self.fields == other.fields
            && self.classes == other.classes
            && self.types == other.types
    }

    /// Name-keyed view of every classification, for rendering.
    pub fn summary(&self, model: &ProgramModel) -> ClassificationSummary {
        let fields = model
            .fields()
            .map(|field| FieldSummary {
                owner: model.type_decl(field.owner).name.clone(),
                name: field.name.clone(),
                reference: self.reference(field.id),
                immutability: self.field(field.id).clone(),
            })
            .collect();
        let types = model
            .types()
            .map(|ty| TypeSummary {
                name: ty.name.clone(),
                class: self.class(ty.id).clone(),
                type_immutability: self.type_immutability(ty.id).clone(),
                pinned: model.assumption(ty.id).is_some(),
            })
            .collect();

        ClassificationSummary {
            variant: self.variant,
            fields,
            types,
            downgrades: self.downgrades.clone(),
            stats: self.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub variant: VariantId,
    pub fields: Vec<FieldSummary>,
    pub types: Vec<TypeSummary>,
    pub downgrades: Vec<Downgrade>,
    pub stats: SolverStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSummary {
    pub owner: String,
    pub name: String,
    pub reference: FieldReferenceMutability,
    pub immutability: FieldImmutability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSummary {
    pub name: String,
    pub class: ClassImmutability,
    #[serde(rename = "type")]
    pub type_immutability: TypeImmutability,
    pub pinned: bool,
}
