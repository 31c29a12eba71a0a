use super::closure::describe_closure;
use super::{prepare, selected_boundaries};
use crate::cli::ReconcileArgs;
use crate::config::build_config;
use crate::error::Result;
use crate::io::output::{write_report, write_streams};
use crate::utils::progress::ProgressDisplay;
use massbal::workflows::closemb::{self, ClosureReport};
use std::fmt::Write;
use tracing::info;

pub fn run(args: ReconcileArgs) -> Result<()> {
    let mut loaded = prepare(&args.flowsheet)?;
    info!("Merging reconciliation settings from file and CLI arguments...");
    let config = build_config(&args, loaded.reconciliation.as_ref())?;

    let names = selected_boundaries(&config.boundaries, &loaded);
    let boundaries: Vec<&str> = names.iter().map(String::as_str).collect();

    let reporter = ProgressDisplay::stderr().reporter();

    let plural = if names.len() == 1 { "y" } else { "ies" };
    println!("Reconciling {} boundar{}...", names.len(), plural);
    info!("Invoking the mass-balance closure workflow...");
    let report = closemb::run(
        &mut loaded.flowsheet,
        &boundaries,
        &config.core_config,
        None,
        &reporter,
    )?;
    info!(
        iterations = report.corrections.iterations,
        "Workflow finished with {} correction factor(s).",
        report.corrections.factors.len()
    );

    print!("{}", summarize(&report));

    if let Some(output_path) = &config.output_path {
        let streams: Vec<_> = report
            .corrections
            .factors
            .keys()
            .filter_map(|name| loaded.flowsheet.stream(name))
            .collect();
        write_streams(output_path, &streams)?;
        println!("✓ Corrected streams written to: {}", output_path.display());
    }
    if let Some(report_path) = &config.report_path {
        write_report(report_path, &report)?;
        println!("✓ Report written to: {}", report_path.display());
    }
    Ok(())
}

/// Correction factors followed by each boundary's closures before and after.
fn summarize(report: &ClosureReport) -> String {
    let mut out = String::new();
    let corrections = &report.corrections;
    let _ = writeln!(
        out,
        "Correction factors ({} iterations, objective {:.3e}):",
        corrections.iterations, corrections.objective
    );
    for (stream, factor) in &corrections.factors {
        let _ = writeln!(out, "  {:<16} {:.6}", stream, factor);
    }
    for (before, after) in report.before.iter().zip(&report.after) {
        let _ = writeln!(out, "Boundary '{}' before reconciliation:", before.boundary);
        out.push_str(&describe_closure(&before.closure));
        let _ = writeln!(out, "Boundary '{}' after reconciliation:", after.boundary);
        out.push_str(&describe_closure(&after.closure));
    }
    out
}
