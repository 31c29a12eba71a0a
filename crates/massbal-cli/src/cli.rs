use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "massbal CLI - mass-balance closure and measurement reconciliation for chemical-process flowsheets.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the mass and element closures of one or more boundaries.
    Closure(ClosureArgs),
    /// Reconcile the streams crossing one or more boundaries and apply the corrections.
    Reconcile(ReconcileArgs),
}

/// Options shared by every command that loads a flowsheet.
#[derive(Args, Debug)]
pub struct FlowsheetArgs {
    /// Path to the flowsheet definition in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub flowsheet: PathBuf,

    /// Boundary to process. Can be used multiple times; defaults to every boundary.
    #[arg(short, long = "boundary", value_name = "NAME")]
    pub boundaries: Vec<String>,

    /// Execute every unit operation once, in the stored order, before processing.
    #[arg(long)]
    pub execute: bool,
}

/// Arguments for the `closure` subcommand.
#[derive(Args, Debug)]
pub struct ClosureArgs {
    #[command(flatten)]
    pub flowsheet: FlowsheetArgs,
}

/// Arguments for the `reconcile` subcommand.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub flowsheet: FlowsheetArgs,

    // --- Objective Overrides ---
    /// Stream whose correction factor is held at exactly 1.0.
    #[arg(short, long, value_name = "STREAM")]
    pub anchor: Option<String>,

    /// Override the regularization strength penalizing corrections away from 1.0.
    #[arg(short, long, value_name = "FLOAT")]
    pub lambda: Option<f64>,

    /// Override the weight of the total mass-closure term.
    #[arg(long, value_name = "FLOAT")]
    pub total_weight: Option<f64>,

    /// Override the weight of every element-closure term.
    #[arg(long, value_name = "FLOAT")]
    pub element_weight: Option<f64>,

    // --- Solver Overrides ---
    /// Override the iteration budget of the minimiser.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    // --- Output ---
    /// Write the corrected streams to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the correction factors and closures to a TOML report.
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}
