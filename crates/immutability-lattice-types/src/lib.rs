//! Shared types for the immutability-lattice workspace.
//!
//! This crate holds everything the classifier, the validator and the fixture
//! layer agree on:
//!
//! - [`model`]: the program model arena (types, fields, write sites) and its builder
//! - [`decl`]: the name-based, serde-friendly form of a program model
//! - [`lattice`]: field reference, field, class and type immutability lattices
//! - [`type_expr`]: declared field types and their compact textual syntax
//! - [`errors`]: the phase/code error taxonomy

pub mod decl;
pub mod env_utils;
pub mod errors;
pub mod ids;
pub mod lattice;
pub mod model;
pub mod type_expr;

pub use decl::{AssumptionSpec, FieldDeclSpec, ProgramDecl, TypeDeclSpec, WriteSiteSpec};
pub use errors::{AnalysisError, AnalysisResult, ErrorCode, ErrorContext, Phase};
pub use ids::{FieldId, LockId, ParamId, TypeId};
pub use lattice::{
    ClassImmutability, FieldImmutability, FieldReferenceMutability, ParamSet, TypeImmutability,
};
pub use model::{
    FieldDecl, FieldDef, ProgramModel, ProgramModelBuilder, TypeDecl, Visibility, WriteLocation,
    WriteSite,
};
pub use type_expr::{TypeExpr, TypeExprSpec};
