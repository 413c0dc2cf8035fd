//! Name-based program declarations.
//!
//! This is the data-layer form of a program model: what fixture documents
//! contain. Types and write-site enclosures refer to each other by name and
//! are resolved into a [`ProgramModel`] by [`ProgramDecl::into_model`].

use crate::errors::{AnalysisError, AnalysisResult, ErrorCode};
use crate::ids::LockId;
use crate::lattice::TypeImmutability;
use crate::model::{
    FieldDef, ProgramModel, ProgramModelBuilder, Visibility, WriteLocation, WriteSite,
};
use crate::type_expr::TypeExprSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDecl {
    #[serde(default)]
    pub types: Vec<TypeDeclSpec>,
    #[serde(default)]
    pub assumptions: Vec<AssumptionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDeclSpec {
    pub name: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub generic_params: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDeclSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDeclSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: TypeExprSpec,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "volatile")]
    pub is_volatile: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub writes: Vec<WriteSiteSpec>,
    #[serde(default)]
    pub unsynchronized_reads: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteSiteSpec {
    /// Type containing the write; defaults to the field's owner
    #[serde(default)]
    pub enclosing: Option<String>,
    pub location: WriteLocation,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub null_check: bool,
    /// Defaults to `true` for method writes, `false` for initializer writes
    #[serde(default)]
    pub repeatable: Option<bool>,
    #[serde(default = "default_true")]
    pub value_in_guard: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssumptionSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    pub immutability: TypeImmutability,
}

fn default_true() -> bool {
    true
}

impl ProgramDecl {
    /// Resolve names and build a checked model.
    ///
    /// Types are declared first so fields and superclasses may refer to types
    /// declared later in the document.
    pub fn into_model(self) -> AnalysisResult<ProgramModel> {
        let mut builder = ProgramModelBuilder::new();
        for ty in &self.types {
            builder.add_type(ty.name.clone(), ty.closed)?;
        }

        for ty in &self.types {
            let id = lookup(&builder, &ty.name)?;
            if let Some(superclass) = &ty.superclass {
                let sup = lookup(&builder, superclass).map_err(|e| e.for_entity(ty.name.clone()))?;
                builder.set_superclass(id, sup)?;
            }
            for param in &ty.generic_params {
                builder.add_generic_param(id, param.as_str())?;
            }
        }

        for ty in &self.types {
            let owner = lookup(&builder, &ty.name)?;
            for field in &ty.fields {
                let declared_type = builder
                    .resolve(owner, &field.declared_type)
                    .map_err(|e| e.for_entity(format!("{}.{}", ty.name, field.name)))?;
                let mut def =
                    FieldDef::new(field.name.clone(), declared_type).visibility(field.visibility);
                def.is_final = field.is_final;
                def.is_static = field.is_static;
                def.is_volatile = field.is_volatile;
                def.unsynchronized_reads = field.unsynchronized_reads;
                for write in &field.writes {
                    def = def.write(resolve_write(&builder, owner, &ty.name, &field.name, write)?);
                }
                builder.add_field(owner, def)?;
            }
        }

        for assumption in &self.assumptions {
            let id = lookup(&builder, &assumption.type_name)?;
            builder.assume(id, assumption.immutability.clone())?;
        }

        builder.build()
    }
}

fn lookup(builder: &ProgramModelBuilder, name: &str) -> AnalysisResult<crate::ids::TypeId> {
    builder.type_by_name(name).ok_or_else(|| {
        AnalysisError::new(ErrorCode::UnknownType, format!("no type named '{}'", name))
    })
}

fn resolve_write(
    builder: &ProgramModelBuilder,
    owner: crate::ids::TypeId,
    owner_name: &str,
    field_name: &str,
    spec: &WriteSiteSpec,
) -> AnalysisResult<WriteSite> {
    let enclosing = match &spec.enclosing {
        None => owner,
        Some(name) => builder.type_by_name(name).ok_or_else(|| {
            AnalysisError::new(
                ErrorCode::OrphanWriteSite,
                format!("write site enclosed by unknown type '{}'", name),
            )
            .for_entity(format!("{}.{}", owner_name, field_name))
        })?,
    };
    let repeatable = spec
        .repeatable
        .unwrap_or(spec.location == WriteLocation::Method);

    Ok(WriteSite {
        enclosing,
        location: spec.location,
        guard: spec.guard.as_deref().map(LockId::from),
        guarded_by_null_check: spec.null_check,
        repeatable,
        value_in_guard: spec.value_in_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_expr::TypeExpr;

    const GENERIC_FIXTURE: &str = r#"{
        "types": [
            { "name": "Holder", "closed": true, "generic_params": ["T"],
              "fields": [
                { "name": "nested", "type": "Generic<Generic<T>>", "final": true,
                  "writes": [{ "location": "constructor" }] },
                { "name": "lazy", "type": "Object[]",
                  "writes": [{ "location": "method", "guard": "this", "null_check": true }] }
              ] },
            { "name": "Generic", "closed": true, "generic_params": ["T"],
              "fields": [{ "name": "t", "type": "T", "final": true }] },
            { "name": "Object" }
        ],
        "assumptions": [{ "type": "Object", "immutability": "mutable" }]
    }"#;

    #[test]
    fn test_decl_resolves_forward_references() {
        let decl: ProgramDecl = serde_json::from_str(GENERIC_FIXTURE).unwrap();
        let model = decl.into_model().unwrap();
        let holder = model.type_by_name("Holder").unwrap();
        let generic = model.type_by_name("Generic").unwrap();

        let nested = model.field(model.field_by_name(holder, "nested").unwrap());
        assert!(matches!(&nested.declared_type, TypeExpr::Parameterized(id, _) if *id == generic));
        assert!(nested.is_final);

        let lazy = model.field(model.field_by_name(holder, "lazy").unwrap());
        let site = &lazy.write_sites[0];
        assert!(site.repeatable);
        assert!(site.guarded_by_null_check);
        assert_eq!(site.guard, Some(LockId::from("this")));

        let object = model.type_by_name("Object").unwrap();
        assert_eq!(model.assumption(object), Some(&TypeImmutability::Mutable));
    }

    #[test]
    fn test_unknown_enclosing_type_is_orphan_write() {
        let json = r#"{ "types": [{ "name": "A", "fields": [
            { "name": "x", "type": "A", "writes": [{ "location": "method", "enclosing": "Ghost" }] }
        ] }] }"#;
        let decl: ProgramDecl = serde_json::from_str(json).unwrap();
        let err = decl.into_model().unwrap_err();
        assert_eq!(err.code, ErrorCode::OrphanWriteSite);
    }

    #[test]
    fn test_malformed_type_rejected_at_parse() {
        let json = r#"{ "types": [{ "name": "A", "fields": [{ "name": "x", "type": "A<" }] }] }"#;
        assert!(serde_json::from_str::<ProgramDecl>(json).is_err());
    }
}
