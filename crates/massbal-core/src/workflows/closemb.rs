use crate::engine::boundary::{Boundary, Closure};
use crate::engine::config::ReconciliationConfig;
use crate::engine::error::EngineError;
use crate::engine::flowsheet::Flowsheet;
use crate::engine::progress::{Progress, ProgressReporter, Stage};
use crate::engine::reconcile::{self, Corrections, Penalty};
use tracing::{info, instrument};

/// The closure of one boundary at one point of the workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryClosure {
    pub boundary: String,
    pub closure: Closure,
}

#[derive(Debug, Clone)]
pub struct ClosureReport {
    pub corrections: Corrections,
    /// Closures of the raw measurements.
    pub before: Vec<BoundaryClosure>,
    /// Closures of the boundaries rebuilt after the corrections were applied.
    pub after: Vec<BoundaryClosure>,
}

/// Closes the mass balance over the named boundaries.
///
/// Builds the boundaries, computes correction factors, scales every corrected
/// stream in place and rebuilds the boundaries. An empty `boundaries` slice
/// selects every boundary defined on the flowsheet. No stream is modified
/// unless the solve succeeds.
#[instrument(skip_all, name = "closemb_workflow")]
pub fn run(
    flowsheet: &mut Flowsheet,
    boundaries: &[&str],
    config: &ReconciliationConfig,
    penalty: Option<Penalty<'_>>,
    reporter: &ProgressReporter,
) -> Result<ClosureReport, EngineError> {
    let names: Vec<String> = if boundaries.is_empty() {
        flowsheet.boundary_names().map(str::to_string).collect()
    } else {
        boundaries.iter().map(|b| b.to_string()).collect()
    };

    let built = reporter.stage(Stage::BoundaryConstruction, || build(flowsheet, &names))?;
    let before = closures(&built);
    info!(boundaries = built.len(), "Built boundaries from the raw measurements.");

    let corrections = reporter.stage(Stage::Reconciliation, || {
        reconcile::calc_corrections_with_progress(&built, config, penalty, reporter)
    })?;

    let after = reporter.stage(Stage::Application, || {
        flowsheet.apply_corrections(&corrections)?;
        build(flowsheet, &names).map(|rebuilt| closures(&rebuilt))
    })?;
    reporter.emit(Progress::Note(format!(
        "Corrected {} streams in {} iterations.",
        corrections.factors.len(),
        corrections.iterations
    )));
    info!(
        streams = corrections.factors.len(),
        objective = corrections.objective,
        "Mass balance closed."
    );

    Ok(ClosureReport {
        corrections,
        before,
        after,
    })
}

fn build(flowsheet: &Flowsheet, names: &[String]) -> Result<Vec<Boundary>, EngineError> {
    names.iter().map(|name| flowsheet.boundary(name)).collect()
}

fn closures(boundaries: &[Boundary]) -> Vec<BoundaryClosure> {
    boundaries
        .iter()
        .map(|b| BoundaryClosure {
            boundary: b.name().to_string(),
            closure: b.closure(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::ComponentRegistry;
    use crate::core::stream::{FlowBasis, Stream};
    use crate::engine::config::ReconciliationConfigBuilder;
    use crate::engine::unit_op::UnitOp;
    use std::sync::Mutex;

    /// Hydrogenation plant with a low-reading feed meter and a high-reading
    /// reactor effluent meter.
    fn biased_plant() -> Flowsheet {
        let mut registry = ComponentRegistry::new();
        registry.define("Hydrogen", &["H"], &[2]).unwrap();
        registry.define("Ethane", &["C", "H"], &[2, 6]).unwrap();
        registry.define("Ethylene", &["C", "H"], &[2, 4]).unwrap();
        let mut fs = Flowsheet::new(registry);

        let measured = [
            ("Feed2", vec![("Ethylene", 0.95), ("Hydrogen", 1.9)]),
            (
                "Prod2",
                vec![("Ethylene", 0.101), ("Ethane", 0.909), ("Hydrogen", 1.111)],
            ),
            ("C2", vec![("Ethylene", 0.1), ("Ethane", 0.9)]),
            ("H2", vec![("Hydrogen", 1.1)]),
        ];
        for (name, pairs) in measured {
            let stream = Stream::from_pairs(name, fs.registry(), &pairs, FlowBasis::Mole).unwrap();
            fs.add_stream(stream).unwrap();
        }
        fs.define_unit_op(UnitOp::passive("Reactor2", &["Feed2"], &["Prod2"]).unwrap())
            .unwrap();
        fs.define_unit_op(UnitOp::passive("Membrane2", &["Prod2"], &["C2", "H2"]).unwrap())
            .unwrap();
        fs.define_boundary("boundary2", &["Reactor2", "Membrane2"])
            .unwrap();
        fs
    }

    fn mass_closure(closures: &[BoundaryClosure]) -> f64 {
        closures[0].closure.mass_closure().unwrap()
    }

    #[test]
    fn closing_the_balance_corrects_the_streams_in_place() {
        let mut fs = biased_plant();
        let report = run(
            &mut fs,
            &[],
            &ReconciliationConfig::default(),
            None,
            &ProgressReporter::silent(),
        )
        .unwrap();

        let feed = report.corrections.factor("Feed2").unwrap();
        assert!((feed - 1.03306931).abs() < 1e-6);
        assert!((fs.stream("Feed2").unwrap().mole_flow("Hydrogen") - 1.9 * feed).abs() < 1e-12);
        // Internal streams are not corrected.
        assert!((fs.stream("Prod2").unwrap().mole_flow("Hydrogen") - 1.111).abs() < 1e-12);

        let before = mass_closure(&report.before);
        let after = mass_closure(&report.after);
        assert!((before - 1.0 / 0.95).abs() < 1e-9);
        assert!((after - 1.0).abs() < (before - 1.0).abs() / 100.0);
    }

    #[test]
    fn failed_solve_leaves_streams_untouched() {
        let mut fs = biased_plant();
        let original = fs.stream("Feed2").unwrap().clone();
        let config = ReconciliationConfigBuilder::new().max_iterations(1).build().unwrap();

        let result = run(&mut fs, &["boundary2"], &config, None, &ProgressReporter::silent());

        assert!(matches!(result, Err(EngineError::NonConvergence { .. })));
        assert!(Stream::flows_equal(fs.stream("Feed2").unwrap(), &original));
    }

    #[test]
    fn unknown_boundary_is_reported() {
        let mut fs = biased_plant();
        assert!(matches!(
            run(
                &mut fs,
                &["boundary9"],
                &ReconciliationConfig::default(),
                None,
                &ProgressReporter::silent()
            ),
            Err(EngineError::UnknownBoundary(name)) if name == "boundary9"
        ));
    }

    #[test]
    fn stages_are_reported_in_order() {
        let mut fs = biased_plant();
        let stages = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_sink(Box::new(|event| {
            if let Progress::StageStarted(stage) = event {
                stages.lock().unwrap().push(*stage);
            }
        }));
        let config = ReconciliationConfigBuilder::new().anchor("Feed2").build().unwrap();

        run(&mut fs, &[], &config, None, &reporter).unwrap();
        drop(reporter);

        assert_eq!(
            stages.into_inner().unwrap(),
            vec![
                Stage::BoundaryConstruction,
                Stage::Reconciliation,
                Stage::Application,
            ]
        );
    }
}
