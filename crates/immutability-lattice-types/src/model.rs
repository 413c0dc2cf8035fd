//! Program model arena.
//!
//! The model is the analysis input: type declarations, their fields, and the
//! facts about each field's write sites that an upstream front end (bytecode
//! reader, escape analysis) has established. It is built once through
//! [`ProgramModelBuilder`], checked for consistency, and never mutated after.

use crate::errors::{AnalysisError, AnalysisResult, ErrorCode};
use crate::ids::{FieldId, LockId, ParamId, TypeId};
use crate::lattice::TypeImmutability;
use crate::type_expr::{TypeExpr, TypeExprSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Package,
    #[default]
    Private,
}

/// Where in the declaring code a write happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteLocation {
    Constructor,
    StaticInitializer,
    Method,
}

/// One instruction that stores into a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteSite {
    /// Type whose code contains the write
    pub enclosing: TypeId,
    pub location: WriteLocation,
    /// Monitor held while writing, `None` when unsynchronized
    pub guard: Option<LockId>,
    /// The write is dominated by a check that the field still holds its default value
    pub guarded_by_null_check: bool,
    /// The write may execute more than once per object (loops, repeated calls)
    pub repeatable: bool,
    /// The stored value is computed after the guard and its check succeed
    pub value_in_guard: bool,
}

impl WriteSite {
    fn at(enclosing: TypeId, location: WriteLocation) -> Self {
        Self {
            enclosing,
            location,
            guard: None,
            guarded_by_null_check: false,
            repeatable: false,
            value_in_guard: true,
        }
    }

    pub fn constructor(enclosing: TypeId) -> Self {
        Self::at(enclosing, WriteLocation::Constructor)
    }

    pub fn static_initializer(enclosing: TypeId) -> Self {
        Self::at(enclosing, WriteLocation::StaticInitializer)
    }

    /// A write in an ordinary method; methods may run any number of times.
    pub fn method(enclosing: TypeId) -> Self {
        Self {
            repeatable: true,
            ..Self::at(enclosing, WriteLocation::Method)
        }
    }

    pub fn guarded_by(mut self, lock: impl Into<LockId>) -> Self {
        self.guard = Some(lock.into());
        self
    }

    pub fn null_checked(mut self) -> Self {
        self.guarded_by_null_check = true;
        self
    }

    pub fn repeatable(mut self, repeatable: bool) -> Self {
        self.repeatable = repeatable;
        self
    }

    pub fn value_outside_guard(mut self) -> Self {
        self.value_in_guard = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub id: TypeId,
    pub name: String,
    /// No further subtypes can exist (`final`)
    pub is_closed: bool,
    pub fields: Vec<FieldId>,
    pub superclass: Option<TypeId>,
    pub generic_params: Vec<ParamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub id: FieldId,
    pub owner: TypeId,
    pub name: String,
    pub declared_type: TypeExpr,
    pub is_final: bool,
    pub is_static: bool,
    pub is_volatile: bool,
    pub visibility: Visibility,
    pub write_sites: Vec<WriteSite>,
    /// Some read of the field can run outside the guard that protects its writes
    pub unsynchronized_reads: bool,
}

/// Field contents handed to [`ProgramModelBuilder::add_field`].
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub declared_type: TypeExpr,
    pub is_final: bool,
    pub is_static: bool,
    pub is_volatile: bool,
    pub visibility: Visibility,
    pub write_sites: Vec<WriteSite>,
    pub unsynchronized_reads: bool,
}

impl FieldDef {
    /// A private, non-final instance field with no writes.
    pub fn new(name: impl Into<String>, declared_type: TypeExpr) -> Self {
        Self {
            name: name.into(),
            declared_type,
            is_final: false,
            is_static: false,
            is_volatile: false,
            visibility: Visibility::Private,
            write_sites: Vec::new(),
            unsynchronized_reads: false,
        }
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn write(mut self, site: WriteSite) -> Self {
        self.write_sites.push(site);
        self
    }

    pub fn unsynchronized_reads(mut self) -> Self {
        self.unsynchronized_reads = true;
        self
    }
}

/// Immutable, validated program model.
#[derive(Debug, Clone, Default)]
pub struct ProgramModel {
    types: Vec<TypeDecl>,
    fields: Vec<FieldDecl>,
    type_names: HashMap<String, TypeId>,
    assumptions: BTreeMap<TypeId, TypeImmutability>,
}

impl ProgramModel {
    pub fn type_decl(&self, id: TypeId) -> &TypeDecl {
        &self.types[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldDecl {
        &self.fields[id.index()]
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.iter()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    pub fn field_by_name(&self, owner: TypeId, name: &str) -> Option<FieldId> {
        self.type_decl(owner)
            .fields
            .iter()
            .copied()
            .find(|id| self.field(*id).name == name)
    }

    /// `Owner.field`, used in diagnostics.
    pub fn field_path(&self, id: FieldId) -> String {
        let field = self.field(id);
        format!("{}.{}", self.type_decl(field.owner).name, field.name)
    }

    /// Pinned immutability of a type that is not analysed field by field.
    pub fn assumption(&self, id: TypeId) -> Option<&TypeImmutability> {
        self.assumptions.get(&id)
    }

    /// Copy of this model with one more write site on `field`.
    pub fn with_extra_write(&self, field: FieldId, site: WriteSite) -> AnalysisResult<Self> {
        if field.index() >= self.fields.len() {
            return Err(AnalysisError::new(
                ErrorCode::OrphanWriteSite,
                format!("write site targets undeclared field #{}", field.0),
            ));
        }
        if site.enclosing.index() >= self.types.len() {
            return Err(orphan_write(&self.field_path(field)));
        }
        let mut model = self.clone();
        model.fields[field.index()].write_sites.push(site);
        Ok(model)
    }
}

/// Incremental, checked construction of a [`ProgramModel`].
#[derive(Debug, Default)]
pub struct ProgramModelBuilder {
    model: ProgramModel,
}

impl ProgramModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type. Names must be unique.
    pub fn add_type(&mut self, name: impl Into<String>, is_closed: bool) -> AnalysisResult<TypeId> {
        let name = name.into();
        if self.model.type_names.contains_key(&name) {
            return Err(AnalysisError::new(
                ErrorCode::DuplicateDeclaration,
                format!("type '{}' declared twice", name),
            ));
        }
        let id = TypeId(self.model.types.len() as u32);
        self.model.types.push(TypeDecl {
            id,
            name: name.clone(),
            is_closed,
            fields: Vec::new(),
            superclass: None,
            generic_params: Vec::new(),
        });
        self.model.type_names.insert(name, id);
        Ok(id)
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.model.type_by_name(name)
    }

    pub fn set_superclass(&mut self, ty: TypeId, superclass: TypeId) -> AnalysisResult<()> {
        self.check_type(superclass, "superclass")?;
        self.type_mut(ty)?.superclass = Some(superclass);
        Ok(())
    }

    pub fn add_generic_param(
        &mut self,
        ty: TypeId,
        param: impl Into<ParamId>,
    ) -> AnalysisResult<()> {
        let param = param.into();
        let decl = self.type_mut(ty)?;
        if decl.generic_params.contains(&param) {
            return Err(AnalysisError::new(
                ErrorCode::DuplicateDeclaration,
                format!("type '{}' declares parameter '{}' twice", decl.name, param),
            ));
        }
        decl.generic_params.push(param);
        Ok(())
    }

    /// Pin the type immutability of a library type.
    pub fn assume(&mut self, ty: TypeId, value: TypeImmutability) -> AnalysisResult<()> {
        self.check_type(ty, "assumption")?;
        self.model.assumptions.insert(ty, value);
        Ok(())
    }

    pub fn add_field(&mut self, owner: TypeId, def: FieldDef) -> AnalysisResult<FieldId> {
        self.check_type(owner, "field owner")?;
        let owner_name = self.model.type_decl(owner).name.clone();
        let duplicate = self
            .model
            .type_decl(owner)
            .fields
            .iter()
            .any(|id| self.model.field(*id).name == def.name);
        if duplicate {
            return Err(AnalysisError::new(
                ErrorCode::DuplicateDeclaration,
                format!("field '{}' declared twice", def.name),
            )
            .for_entity(owner_name));
        }

        let id = FieldId(self.model.fields.len() as u32);
        self.model.fields.push(FieldDecl {
            id,
            owner,
            name: def.name,
            declared_type: def.declared_type,
            is_final: def.is_final,
            is_static: def.is_static,
            is_volatile: def.is_volatile,
            visibility: def.visibility,
            write_sites: def.write_sites,
            unsynchronized_reads: def.unsynchronized_reads,
        });
        self.model.types[owner.index()].fields.push(id);
        Ok(id)
    }

    /// Resolve a parsed type expression in the scope of `owner`.
    ///
    /// A bare name matching one of the owner's generic parameters is that
    /// parameter; anything else must name a declared type. Parameters must be
    /// declared before fields that use them.
    pub fn resolve(&self, owner: TypeId, spec: &TypeExprSpec) -> AnalysisResult<TypeExpr> {
        self.check_type(owner, "field owner")?;
        match spec {
            TypeExprSpec::Array(inner) => {
                Ok(TypeExpr::Array(Box::new(self.resolve(owner, inner)?)))
            }
            TypeExprSpec::Named { name, args } => {
                let owner_decl = self.model.type_decl(owner);
                if let Some(param) = owner_decl.generic_params.iter().find(|p| p.as_str() == name) {
                    if !args.is_empty() {
                        return Err(AnalysisError::new(
                            ErrorCode::MalformedTypeExpr,
                            format!("generic parameter '{}' cannot take type arguments", name),
                        )
                        .for_entity(owner_decl.name.clone()));
                    }
                    return Ok(TypeExpr::GenericParam(param.clone()));
                }

                let id = self.model.type_by_name(name).ok_or_else(|| {
                    AnalysisError::new(ErrorCode::UnknownType, format!("no type named '{}'", name))
                        .for_entity(owner_decl.name.clone())
                })?;
                if args.is_empty() {
                    return Ok(TypeExpr::Concrete(id));
                }
                let args = args
                    .iter()
                    .map(|arg| self.resolve(owner, arg))
                    .collect::<AnalysisResult<Vec<_>>>()?;
                Ok(TypeExpr::Parameterized(id, args))
            }
        }
    }

    /// Check the model for consistency and freeze it.
    pub fn build(self) -> AnalysisResult<ProgramModel> {
        let model = self.model;
        check_superclass_chains(&model)?;
        for field in &model.fields {
            check_declared_type(&model, field, &field.declared_type)?;
            if field
                .write_sites
                .iter()
                .any(|site| site.enclosing.index() >= model.types.len())
            {
                return Err(orphan_write(&model.field_path(field.id)));
            }
        }
        Ok(model)
    }

    fn check_type(&self, id: TypeId, role: &str) -> AnalysisResult<()> {
        if id.index() < self.model.types.len() {
            Ok(())
        } else {
            Err(AnalysisError::new(
                ErrorCode::UnknownType,
                format!("{} refers to undeclared type #{}", role, id.0),
            ))
        }
    }

    fn type_mut(&mut self, id: TypeId) -> AnalysisResult<&mut TypeDecl> {
        self.check_type(id, "type")?;
        Ok(&mut self.model.types[id.index()])
    }
}

fn orphan_write(field_path: &str) -> AnalysisError {
    AnalysisError::new(
        ErrorCode::OrphanWriteSite,
        "write site has no enclosing type in the model",
    )
    .for_entity(field_path)
}

fn check_superclass_chains(model: &ProgramModel) -> AnalysisResult<()> {
    for start in &model.types {
        let mut seen = HashSet::new();
        let mut current = Some(start.id);
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(AnalysisError::new(
                    ErrorCode::CyclicSuperclass,
                    format!("superclass chain of '{}' loops", start.name),
                )
                .for_entity(start.name.clone()));
            }
            current = model.type_decl(id).superclass;
        }
    }
    Ok(())
}

fn check_declared_type(
    model: &ProgramModel,
    field: &FieldDecl,
    expr: &TypeExpr,
) -> AnalysisResult<()> {
    let path = || model.field_path(field.id);
    let check_id = |id: TypeId| {
        if id.index() < model.types.len() {
            Ok(())
        } else {
            Err(AnalysisError::new(
                ErrorCode::UnknownType,
                format!("declared type refers to undeclared type #{}", id.0),
            )
            .for_entity(path()))
        }
    };
    match expr {
        TypeExpr::Concrete(id) => check_id(*id),
        TypeExpr::Array(inner) => check_declared_type(model, field, inner),
        TypeExpr::GenericParam(param) => {
            if model.type_decl(field.owner).generic_params.contains(param) {
                Ok(())
            } else {
                Err(AnalysisError::new(
                    ErrorCode::MalformedTypeExpr,
                    format!("generic parameter '{}' is not declared by the owner", param),
                )
                .for_entity(path()))
            }
        }
        TypeExpr::Parameterized(id, args) => {
            check_id(*id)?;
            let base = model.type_decl(*id);
            if base.generic_params.len() != args.len() {
                return Err(AnalysisError::new(
                    ErrorCode::ArityMismatch,
                    format!(
                        "'{}' takes {} type arguments, got {}",
                        base.name,
                        base.generic_params.len(),
                        args.len()
                    ),
                )
                .for_entity(path()));
            }
            args.iter()
                .try_for_each(|arg| check_declared_type(model, field, arg))
        }
    }
}
