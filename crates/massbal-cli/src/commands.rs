pub mod closure;
pub mod reconcile;

use crate::cli::FlowsheetArgs;
use crate::error::Result;
use crate::io::flowsheet::{LoadedFlowsheet, load_flowsheet};
use crate::utils::progress::ProgressDisplay;
use tracing::info;

/// Loads the flowsheet named on the command line and, when asked, executes
/// it once so that computed outlets reflect the measured feeds.
fn prepare(args: &FlowsheetArgs) -> Result<LoadedFlowsheet> {
    info!("Loading flowsheet from {:?}", &args.flowsheet);
    let mut loaded = load_flowsheet(&args.flowsheet)?;

    if args.execute {
        let reporter = ProgressDisplay::stderr().reporter();
        loaded.flowsheet.execute_with_progress(&reporter)?;
    }
    Ok(loaded)
}

/// The boundaries selected on the command line, or every defined boundary.
fn selected_boundaries(requested: &[String], loaded: &LoadedFlowsheet) -> Vec<String> {
    if requested.is_empty() {
        loaded
            .flowsheet
            .boundary_names()
            .map(str::to_string)
            .collect()
    } else {
        requested.to_vec()
    }
}
