use super::{prepare, selected_boundaries};
use crate::cli::ClosureArgs;
use crate::error::Result;
use massbal::engine::boundary::{Boundary, Closure};
use std::fmt::Write;
use tracing::{info, warn};

pub fn run(args: ClosureArgs) -> Result<()> {
    let loaded = prepare(&args.flowsheet)?;
    let names = selected_boundaries(&args.flowsheet.boundaries, &loaded);
    if names.is_empty() {
        warn!("The flowsheet defines no boundaries.");
        println!("Warning: the flowsheet defines no boundaries.");
        return Ok(());
    }

    for name in &names {
        let boundary = loaded.flowsheet.boundary(name)?;
        info!(boundary = %name, "Computed boundary closure.");
        print!("{}", describe_boundary(&boundary));
    }
    Ok(())
}

/// Feeds, products, closures and per-component conversions of a boundary.
pub(crate) fn describe_boundary(boundary: &Boundary) -> String {
    let mut out = String::new();
    let cut = boundary.cut_set();
    let _ = writeln!(out, "Boundary '{}'", boundary.name());
    let _ = writeln!(out, "  Feeds:    {}", cut.feed_names().collect::<Vec<_>>().join(", "));
    let _ = writeln!(
        out,
        "  Products: {}",
        cut.product_names().collect::<Vec<_>>().join(", ")
    );
    out.push_str(&describe_closure(&boundary.closure()));

    let total_in = boundary.total_in();
    if !total_in.components().is_empty() {
        let _ = writeln!(out, "  Conversion:");
        for component in total_in.components() {
            let _ = writeln!(
                out,
                "    {:<12} {:>8.2}%",
                component,
                100.0 * boundary.conversion(component)
            );
        }
    }
    out
}

pub(crate) fn describe_closure(closure: &Closure) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Mass closure: {}", percent(closure.mass_closure()));
    for symbol in closure.atoms() {
        let _ = writeln!(
            out,
            "    {:<3} closure: {}",
            symbol,
            percent(closure.atom_closure(symbol))
        );
    }
    out
}

fn percent(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.3}%", 100.0 * r),
        None => "n/a (no inflow)".to_string(),
    }
}
