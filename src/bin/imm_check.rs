//! imm-check: classify and validate immutability fixtures
//!
//! ## Commands
//!
//! - **classify**: print every field reference, field, class and type label for one variant
//! - **validate**: check fixture oracles in every requested variant
//!
//! ## Example Usage
//!
//! ```bash
//! # Labels computed by the most precise variant
//! imm-check classify tests/fixtures/generic_fields.json --variant L3
//!
//! # Check all oracles of several fixtures, JSON report
//! imm-check validate tests/fixtures/*.json --json
//!
//! # Only the effectively-final variant, with solver tracing
//! RUST_LOG=immutability_lattice_core=trace imm-check validate fixture.json --variant L1
//! ```
//!
//! Exit status: 0 when every oracle holds, 1 on oracle mismatches, 2 on errors.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use immutability_lattice::{load_config, render_summary, FixtureDocument};
use immutability_lattice_core::{SolverConfig, ValidationReport, VariantId};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "imm-check",
    author,
    version,
    about = "Immutability lattice classification and oracle validation",
    long_about = "Classifies the fields, classes and types of a program fixture.\n\n\
                  Runs the L0-L3 precision variants and checks the fixture's oracles."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Solver configuration file (JSON); defaults come from IMMUTABILITY_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the classification of every entity
    Classify(ClassifyCmd),

    /// Check fixture oracles against computed classifications
    Validate(ValidateCmd),
}

#[derive(Args)]
struct ClassifyCmd {
    /// Fixture document
    fixture: PathBuf,

    /// Precision variant
    #[arg(long, default_value = "L3")]
    variant: VariantId,
}

#[derive(Args)]
struct ValidateCmd {
    /// Fixture documents
    #[arg(required = true)]
    fixtures: Vec<PathBuf>,

    /// Restrict to these variants (repeatable); defaults to the configured ones
    #[arg(long = "variant")]
    variants: Vec<VariantId>,
}

impl ClassifyCmd {
    fn execute(&self, config: SolverConfig, json: bool) -> Result<bool> {
        let doc = FixtureDocument::load(&self.fixture)?;
        let summary = doc.classify(config, self.variant)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", render_summary(&summary));
        }
        Ok(true)
    }
}

impl ValidateCmd {
    fn execute(&self, config: SolverConfig, json: bool) -> Result<bool> {
        let mut total: Option<ValidationReport> = None;
        for path in &self.fixtures {
            let doc = FixtureDocument::load(path)?;
            let report = doc.validate(config.clone(), &self.variants)?;
            if !json {
                println!("{}: {}", doc.name, report.render_text().trim_end());
            }
            match total.as_mut() {
                Some(total) => total.merge(report),
                None => total = Some(report),
            }
        }

        let total = total.context("no fixtures given")?;
        if json {
            println!("{}", serde_json::to_string_pretty(&total)?);
        } else if self.fixtures.len() > 1 {
            println!(
                "total: {} checked, {} passed, {} skipped, {} mismatches",
                total.checked,
                total.passed,
                total.skipped,
                total.mismatches.len()
            );
        }
        Ok(total.is_success())
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SolverConfig::from_env(),
    };
    match &cli.command {
        Commands::Classify(cmd) => cmd.execute(config, cli.json),
        Commands::Validate(cmd) => cmd.execute(config, cli.json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}
