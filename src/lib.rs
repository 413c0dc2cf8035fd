//! Immutability Lattice
//!
//! Fixture layer and command-line front end for the immutability analysis:
//!
//! - **Fixtures**: program models and their oracles as JSON documents ([`fixture`])
//! - **Classification**: every precision variant, via [`immutability_lattice_core`]
//! - **Validation**: oracle reports with per-variant expectations
//!
//! The `imm-check` binary wraps [`fixture`] for shell use.

pub mod fixture;

pub use fixture::{load_config, render_summary, FixtureDocument};
pub use immutability_lattice_core as engine;
pub use immutability_lattice_types as model;
