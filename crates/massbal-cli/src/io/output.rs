use super::history::TIMESTAMP_FORMAT;
use crate::error::{CliError, Result};
use massbal::core::stream::Stream;
use massbal::engine::boundary::Closure;
use massbal::engine::reconcile::Corrections;
use massbal::workflows::closemb::{BoundaryClosure, ClosureReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct FlowRecord<'a> {
    stream: &'a str,
    timestamp: Option<String>,
    component: &'a str,
    mole_flow: f64,
    mass_flow: f64,
}

/// Writes streams in long form: one row per stream, sample and component.
///
/// The `timestamp` column is empty for steady streams.
pub fn write_streams(path: &Path, streams: &[&Stream]) -> Result<()> {
    let unwritable = |source: anyhow::Error| CliError::Output {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |e: csv::Error| unwritable(e.into());
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

    let mut rows = 0usize;
    for stream in streams {
        let timestamps = stream.timestamps();
        for sample in 0..stream.n_samples() {
            let timestamp = timestamps
                .and_then(|t| t.get(sample))
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string());
            for (row, component) in stream.components().iter().enumerate() {
                writer
                    .serialize(FlowRecord {
                        stream: stream.name(),
                        timestamp: timestamp.clone(),
                        component,
                        mole_flow: stream.mole_flows()[(row, sample)],
                        mass_flow: stream.mass_flows()[(row, sample)],
                    })
                    .map_err(csv_err)?;
                rows += 1;
            }
        }
    }
    writer.flush().map_err(|e| unwritable(e.into()))?;
    info!(rows, streams = streams.len(), "Wrote corrected streams to {:?}", path);
    Ok(())
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
struct AtomClosureRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<f64>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct BoundaryRecord {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mass_before: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mass_after: Option<f64>,
    atoms: BTreeMap<String, AtomClosureRecord>,
}

#[derive(Serialize, Debug)]
struct ReportRecord<'a> {
    corrections: &'a Corrections,
    #[serde(rename = "boundary")]
    boundaries: Vec<BoundaryRecord>,
}

fn boundary_record(before: &BoundaryClosure, after: Option<&Closure>) -> BoundaryRecord {
    let mut atoms = BTreeMap::new();
    for symbol in before.closure.atoms() {
        atoms.insert(
            symbol.to_string(),
            AtomClosureRecord {
                before: before.closure.atom_closure(symbol),
                after: after.and_then(|c| c.atom_closure(symbol)),
            },
        );
    }
    BoundaryRecord {
        name: before.boundary.clone(),
        mass_before: before.closure.mass_closure(),
        mass_after: after.and_then(Closure::mass_closure),
        atoms,
    }
}

/// Renders the correction factors and the closures before and after
/// reconciliation as TOML.
pub fn render_report(report: &ClosureReport) -> std::result::Result<String, toml::ser::Error> {
    let boundaries = report
        .before
        .iter()
        .map(|before| {
            let after = report
                .after
                .iter()
                .find(|a| a.boundary == before.boundary)
                .map(|a| &a.closure);
            boundary_record(before, after)
        })
        .collect();
    let record = ReportRecord {
        corrections: &report.corrections,
        boundaries,
    };
    toml::to_string(&record)
}

pub fn write_report(path: &Path, report: &ClosureReport) -> Result<()> {
    let unwritable = |source: anyhow::Error| CliError::Output {
        path: path.to_path_buf(),
        source,
    };
    let rendered = render_report(report).map_err(|e| unwritable(e.into()))?;
    std::fs::write(path, rendered).map_err(|e| unwritable(e.into()))?;
    info!("Wrote reconciliation report to {:?}", path);
    Ok(())
}
