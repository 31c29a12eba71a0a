use super::history::read_history;
use crate::config::file::{
    FileConfig, FileReaction, FileReconciliationConfig, FileStream, FileUnitOp, FileUnitOpKind,
};
use crate::error::{CliError, Result};
use massbal::core::components::ComponentRegistry;
use massbal::core::reaction::Reaction;
use massbal::core::stream::Stream;
use massbal::engine::error::EngineError;
use massbal::engine::flowsheet::Flowsheet;
use massbal::engine::unit_op::{Calculation, UnitOp};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A flowsheet read from disk, together with the file's reconciliation table.
pub struct LoadedFlowsheet {
    pub flowsheet: Flowsheet,
    pub reconciliation: Option<FileReconciliationConfig>,
}

/// Reads a TOML flowsheet definition and builds the flowsheet it describes.
///
/// History paths are resolved relative to the directory of `path`.
pub fn load_flowsheet(path: &Path) -> Result<LoadedFlowsheet> {
    let file = FileConfig::from_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut registry = ComponentRegistry::new();
    for component in &file.components {
        let atoms: Vec<&str> = component.atoms.iter().map(String::as_str).collect();
        registry
            .define(&component.name, &atoms, &component.counts)
            .map_err(EngineError::from)?;
    }
    let mut flowsheet = Flowsheet::new(registry);

    for stream in &file.streams {
        let stream = build_stream(stream, flowsheet.registry(), base_dir)?;
        flowsheet.add_stream(stream)?;
    }
    for unit_op in &file.unit_ops {
        let unit_op = build_unit_op(unit_op, flowsheet.registry())?;
        flowsheet.define_unit_op(unit_op)?;
    }
    if let Some(order) = &file.execution_order {
        let order: Vec<&str> = order.iter().map(String::as_str).collect();
        flowsheet.set_execution_order(&order)?;
    }
    for boundary in &file.boundaries {
        let unit_ops: Vec<&str> = boundary.unit_ops.iter().map(String::as_str).collect();
        flowsheet.define_boundary(&boundary.name, &unit_ops)?;
    }

    info!(
        components = file.components.len(),
        streams = file.streams.len(),
        unit_ops = file.unit_ops.len(),
        boundaries = file.boundaries.len(),
        "Loaded flowsheet from {:?}",
        path
    );
    Ok(LoadedFlowsheet {
        flowsheet,
        reconciliation: file.reconciliation,
    })
}

fn build_stream(
    stream: &FileStream,
    registry: &Arc<ComponentRegistry>,
    base_dir: &Path,
) -> Result<Stream> {
    let built = match (&stream.flows, &stream.history) {
        (Some(flows), None) => {
            let pairs: Vec<(&str, f64)> = flows.0.iter().map(|(c, f)| (c.as_str(), *f)).collect();
            Stream::from_pairs(&stream.name, registry, &pairs, stream.basis)
        }
        (None, Some(history_path)) => {
            let history_path = base_dir.join(history_path);
            let history = read_history(&history_path).map_err(|source| CliError::History {
                stream: stream.name.clone(),
                source,
            })?;
            debug!(
                stream = %stream.name,
                samples = history.timestamps.len(),
                "Attached history."
            );
            let components = history.component_refs();
            Stream::history(
                &stream.name,
                registry,
                history.timestamps.clone(),
                &components,
                &history.flows,
                stream.basis,
            )
        }
        _ => {
            return Err(CliError::Flowsheet(format!(
                "stream '{}' must set exactly one of `flows` or `history`",
                stream.name
            )));
        }
    };
    Ok(built.map_err(EngineError::from)?)
}

fn build_unit_op(unit_op: &FileUnitOp, registry: &ComponentRegistry) -> Result<UnitOp> {
    let name = &unit_op.name;
    let unexpected = |field: &str| {
        CliError::Flowsheet(format!(
            "unit operation '{}' of kind {:?} does not take `{}`",
            name, unit_op.kind, field
        ))
    };
    let missing = |field: &str| {
        CliError::Flowsheet(format!(
            "unit operation '{}' of kind {:?} requires `{}`",
            name, unit_op.kind, field
        ))
    };

    let takes = match unit_op.kind {
        FileUnitOpKind::FlowSplitter => "fractions",
        FileUnitOpKind::ComponentSplitter => "routes",
        FileUnitOpKind::StoichiometricReactor => "reactions",
        FileUnitOpKind::Passive | FileUnitOpKind::Mixer => "",
    };
    for (field, present) in [
        ("fractions", unit_op.fractions.is_some()),
        ("routes", unit_op.routes.is_some()),
        ("reactions", unit_op.reactions.is_some()),
    ] {
        if present && field != takes {
            return Err(unexpected(field));
        }
    }

    let calculation = match unit_op.kind {
        FileUnitOpKind::Passive => Calculation::Passive,
        FileUnitOpKind::Mixer => Calculation::Mixer,
        FileUnitOpKind::FlowSplitter => Calculation::FlowSplitter {
            fractions: unit_op.fractions.clone().ok_or_else(|| missing("fractions"))?,
        },
        FileUnitOpKind::ComponentSplitter => Calculation::ComponentSplitter {
            routes: unit_op.routes.clone().ok_or_else(|| missing("routes"))?,
        },
        FileUnitOpKind::StoichiometricReactor => {
            let reactions = unit_op.reactions.as_ref().ok_or_else(|| missing("reactions"))?;
            Calculation::StoichiometricReactor {
                reactions: reactions
                    .iter()
                    .map(|r| build_reaction(r, registry))
                    .collect::<Result<_>>()?,
            }
        }
    };

    let inlets: Vec<&str> = unit_op.inlets.iter().map(String::as_str).collect();
    let outlets: Vec<&str> = unit_op.outlets.iter().map(String::as_str).collect();
    Ok(UnitOp::new(name, &inlets, &outlets, calculation)?)
}

fn build_reaction(reaction: &FileReaction, registry: &ComponentRegistry) -> Result<Reaction> {
    let reactants: Vec<(&str, f64)> = reaction
        .reactants
        .iter()
        .map(|(c, &n)| (c.as_str(), n))
        .collect();
    let products: Vec<(&str, f64)> = reaction
        .products
        .iter()
        .map(|(c, &n)| (c.as_str(), n))
        .collect();
    Reaction::new(
        registry,
        &reactants,
        &products,
        &reaction.key,
        reaction.conversion,
    )
    .map_err(|e| EngineError::from(e).into())
}
