//! Immutability classification engine.
//!
//! Given a [`ProgramModel`](immutability_lattice_types::ProgramModel), computes
//! for every field, class and type its place in the immutability lattices and
//! checks the results against oracles.
//!
//! ## Pipeline
//!
//! ```text
//! ProgramModel
//!     │
//!     ▼
//! reference ──► field ──► class ──► type_immutability      (per PrecisionStrategy)
//!     └────────────── solver (worklist fixpoint) ──────────┘
//!                          │
//!                          ▼
//!             session (Arc<ClassificationResults> per variant)
//!                          │
//!                          ▼
//!                  validator ──► ValidationReport
//! ```
//!
//! ## Modules
//!
//! - [`variant`]: precision variants `L0`..`L3` and their strategies
//! - [`reference`], [`field`], [`class`], [`type_immutability`]: the four classifiers
//! - [`solver`]: whole-program fixpoint with monotonicity checking
//! - [`session`]: memoized results per variant
//! - [`oracle`], [`validator`]: expectations and their checking

pub mod class;
pub mod config;
pub mod field;
pub mod oracle;
pub mod reference;
pub mod results;
pub mod session;
pub mod solver;
pub mod type_immutability;
pub mod validator;
pub mod variant;

pub use config::SolverConfig;
pub use oracle::{Oracle, OracleTarget, Precondition, PropertyExpectation, PropertyKind};
pub use results::{ClassificationResults, ClassificationSummary, Downgrade, SolverStats};
pub use session::AnalysisSession;
pub use solver::{solve, FixpointSolver};
pub use validator::{CheckOutcome, Mismatch, ValidationReport, Validator};
pub use variant::{strategy_for, Capabilities, PrecisionStrategy, VariantId};
