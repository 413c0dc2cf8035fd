//! Error codes and diagnostics for the immutability analysis.
//!
//! # Error Taxonomy
//!
//! | Phase | Purpose | Error Codes |
//! |-------|---------|-------------|
//! | Model | Program model consistency | E101-E106 |
//! | Fixpoint | Solver convergence | E201-E202 |
//! | Validation | Oracle checking | E301-E302 |
//!
//! Model and fixpoint errors are fatal and surface as `Err(AnalysisError)`.
//! Validation codes only appear inside mismatch diagnostics; a failed oracle
//! never aborts the remaining checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the analysis where an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Building and checking the program model
    Model,
    /// Running the classification fixpoint
    Fixpoint,
    /// Checking computed labels against oracles
    Validation,
}

impl Phase {
    pub fn short_name(&self) -> &'static str {
        match self {
            Phase::Model => "model",
            Phase::Fixpoint => "fixpoint",
            Phase::Validation => "validation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Specific error codes within each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // =========================================================================
    // Model Errors (1xx)
    // =========================================================================
    /// E101: A type name does not resolve to any declaration
    #[serde(rename = "E101")]
    UnknownType,

    /// E102: Two types, or two fields of one type, share a name
    #[serde(rename = "E102")]
    DuplicateDeclaration,

    /// E103: The superclass chain loops back on itself
    #[serde(rename = "E103")]
    CyclicSuperclass,

    /// E104: A write site has no enclosing type
    #[serde(rename = "E104")]
    OrphanWriteSite,

    /// E105: Undeclared generic parameter or malformed type expression
    #[serde(rename = "E105")]
    MalformedTypeExpr,

    /// E106: Parameterized type with the wrong number of type arguments
    #[serde(rename = "E106")]
    ArityMismatch,

    // =========================================================================
    // Fixpoint Errors (2xx)
    // =========================================================================
    /// E201: The solver exceeded its iteration bound
    #[serde(rename = "E201")]
    NonConvergence,

    /// E202: A recomputed value was stronger than its predecessor
    #[serde(rename = "E202")]
    MonotonicityViolation,

    // =========================================================================
    // Validation Errors (3xx)
    // =========================================================================
    /// E301: Oracle names an entity that is not in the model
    #[serde(rename = "E301")]
    UnknownOracleTarget,

    /// E302: Oracle expects a property the target cannot carry
    #[serde(rename = "E302")]
    PropertyKindMismatch,
}

impl ErrorCode {
    pub fn numeric_code(&self) -> u16 {
        match self {
            ErrorCode::UnknownType => 101,
            ErrorCode::DuplicateDeclaration => 102,
            ErrorCode::CyclicSuperclass => 103,
            ErrorCode::OrphanWriteSite => 104,
            ErrorCode::MalformedTypeExpr => 105,
            ErrorCode::ArityMismatch => 106,
            ErrorCode::NonConvergence => 201,
            ErrorCode::MonotonicityViolation => 202,
            ErrorCode::UnknownOracleTarget => 301,
            ErrorCode::PropertyKindMismatch => 302,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.numeric_code() / 100 {
            1 => Phase::Model,
            2 => Phase::Fixpoint,
            _ => Phase::Validation,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UnknownType => "unknown type reference",
            ErrorCode::DuplicateDeclaration => "duplicate declaration",
            ErrorCode::CyclicSuperclass => "cyclic superclass chain",
            ErrorCode::OrphanWriteSite => "write site without enclosing type",
            ErrorCode::MalformedTypeExpr => "malformed type expression",
            ErrorCode::ArityMismatch => "generic arity mismatch",
            ErrorCode::NonConvergence => "fixpoint did not converge",
            ErrorCode::MonotonicityViolation => "classification moved toward immutability",
            ErrorCode::UnknownOracleTarget => "oracle target not found",
            ErrorCode::PropertyKindMismatch => "property kind does not apply to target",
        }
    }

    /// Get the string code (e.g., "E101")
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric_code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.description())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Entity involved (type name or `Owner.field`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Precision variant being computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Solver rounds completed when the error was raised
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<usize>,
}

/// A fatal analysis error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisError {
    pub phase: Phase,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
}

impl AnalysisError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            phase: code.phase(),
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(
        code: ErrorCode,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self {
            phase: code.phase(),
            code,
            message: message.into(),
            context: Some(context),
        }
    }

    /// Attach the entity name, keeping any context already present.
    pub fn for_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.get_or_insert_with(ErrorContext::default).entity = Some(entity.into());
        self
    }

    /// Attach the precision variant, keeping any context already present.
    pub fn for_variant(mut self, variant: impl fmt::Display) -> Self {
        self.context.get_or_insert_with(ErrorContext::default).variant = Some(variant.to_string());
        self
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.code.code_string(), self.message)?;
        if let Some(ctx) = &self.context {
            if let Some(entity) = &ctx.entity {
                write!(f, " (entity: {})", entity)?;
            }
            if let Some(variant) = &ctx.variant {
                write!(f, " (variant: {})", variant)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AnalysisError {}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
