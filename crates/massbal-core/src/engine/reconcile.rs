use super::boundary::Boundary;
use super::config::ReconciliationConfig;
use super::error::EngineError;
use super::optimizer::Bfgs;
use super::progress::{Progress, ProgressReporter};
use crate::core::stream::Stream;
use nalgebra::DVector;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

/// A user-supplied penalty evaluated on the full `stream -> factor` mapping.
pub type Penalty<'p> = &'p dyn Fn(&BTreeMap<String, f64>) -> f64;

/// Multiplicative correction factors for every stream crossing the reconciled
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Corrections {
    pub factors: BTreeMap<String, f64>,
    /// Objective value at the returned factors.
    pub objective: f64,
    pub iterations: usize,
    pub gradient_norm: f64,
}

impl Corrections {
    pub fn factor(&self, stream: &str) -> Option<f64> {
        self.factors.get(stream).copied()
    }
}

/// Stream contributions to one flow total: `(factor index, raw flow)`.
type Contributions = Vec<(usize, f64)>;

#[derive(Debug)]
struct RatioTerm {
    weight: f64,
    inflow: Contributions,
    outflow: Contributions,
}

impl RatioTerm {
    fn value(&self, factors: &[f64]) -> f64 {
        let total = |c: &Contributions| c.iter().map(|&(i, v)| factors[i] * v).sum::<f64>();
        let ratio = total(&self.outflow) / total(&self.inflow);
        self.weight * (ratio - 1.0).powi(2)
    }
}

/// The reconciliation objective with every per-sample term precomputed.
struct Problem<'p> {
    names: Vec<String>,
    anchor: Option<usize>,
    free: Vec<usize>,
    terms: Vec<RatioTerm>,
    regularization: f64,
    penalty: Option<Penalty<'p>>,
}

impl<'p> Problem<'p> {
    fn new(
        boundaries: &[Boundary],
        config: &ReconciliationConfig,
        penalty: Option<Penalty<'p>>,
    ) -> Result<Self, EngineError> {
        let mut names: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for name in boundaries.iter().flat_map(Boundary::stream_names) {
            if !index.contains_key(name) {
                index.insert(name.to_string(), names.len());
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(EngineError::NoStreamsToReconcile);
        }

        let anchor = match &config.anchor {
            Some(anchor) => Some(
                *index
                    .get(anchor)
                    .ok_or_else(|| EngineError::UnknownAnchor(anchor.clone()))?,
            ),
            None => None,
        };
        let free = (0..names.len()).filter(|&i| Some(i) != anchor).collect();

        let mut terms = Vec::new();
        for boundary in boundaries {
            let before = terms.len();
            push_boundary_terms(boundary, config, &index, &mut terms);
            debug!(
                boundary = boundary.name(),
                terms = terms.len() - before,
                "Collected closure terms."
            );
        }

        Ok(Self {
            names,
            anchor,
            free,
            terms,
            regularization: config.regularization,
            penalty,
        })
    }

    /// Expands the free vector into one factor per stream, anchor at 1.0.
    fn expand(&self, x: &DVector<f64>) -> Vec<f64> {
        let mut factors = vec![1.0; self.names.len()];
        for (&slot, &value) in self.free.iter().zip(x.iter()) {
            factors[slot] = value;
        }
        if let Some(anchor) = self.anchor {
            factors[anchor] = 1.0;
        }
        factors
    }

    fn mapping(&self, factors: &[f64]) -> BTreeMap<String, f64> {
        self.names.iter().cloned().zip(factors.iter().copied()).collect()
    }

    fn objective(&self, x: &DVector<f64>) -> f64 {
        let factors = self.expand(x);
        let closure: f64 = self.terms.iter().map(|t| t.value(&factors)).sum();
        let regularization =
            self.regularization * x.iter().map(|f| (1.0 - f).powi(2)).sum::<f64>();
        let penalty = self
            .penalty
            .map_or(0.0, |penalty| penalty(&self.mapping(&factors)));
        closure + regularization + penalty
    }
}

fn contributions(
    streams: &[Stream],
    index: &HashMap<String, usize>,
    flow: impl Fn(&Stream) -> Option<f64>,
) -> Contributions {
    streams
        .iter()
        .filter_map(|s| {
            let value = flow(s).filter(|v| *v != 0.0)?;
            Some((*index.get(s.name())?, value))
        })
        .collect()
}

fn push_boundary_terms(
    boundary: &Boundary,
    config: &ReconciliationConfig,
    index: &HashMap<String, usize>,
    terms: &mut Vec<RatioTerm>,
) {
    let atoms: BTreeSet<&'static str> = boundary
        .total_in()
        .atoms()
        .chain(boundary.total_out().atoms())
        .collect();

    for sample in 0..boundary.total_in().n_samples() {
        if config.total_weight > 0.0 {
            if boundary.total_in().total_mass_flow_series()[sample] > 0.0 {
                let mass = |s: &Stream| Some(s.total_mass_flow_series()[sample]);
                terms.push(RatioTerm {
                    weight: config.total_weight,
                    inflow: contributions(boundary.feeds(), index, mass),
                    outflow: contributions(boundary.products(), index, mass),
                });
            } else {
                debug!(
                    boundary = boundary.name(),
                    sample, "Skipping mass term for a sample with zero inflow."
                );
            }
        }

        for &atom in &atoms {
            let weight = config.element_weights.weight(atom);
            let inflow = boundary
                .total_in()
                .atom_flow_series(atom)
                .map_or(0.0, |series| series[sample]);
            if weight == 0.0 || inflow <= 0.0 {
                continue;
            }
            let atom_flow = |s: &Stream| s.atom_flow_series(atom).map(|series| series[sample]);
            terms.push(RatioTerm {
                weight,
                inflow: contributions(boundary.feeds(), index, atom_flow),
                outflow: contributions(boundary.products(), index, atom_flow),
            });
        }
    }
}

/// Computes correction factors for the streams crossing `boundaries`.
///
/// See [`calc_corrections_with_progress`].
pub fn calc_corrections(
    boundaries: &[Boundary],
    config: &ReconciliationConfig,
    penalty: Option<Penalty<'_>>,
) -> Result<Corrections, EngineError> {
    calc_corrections_with_progress(boundaries, config, penalty, &ProgressReporter::silent())
}

/// Computes correction factors for the streams crossing `boundaries`,
/// reporting every accepted solver step to `reporter`.
///
/// A stream shared by several boundaries gets a single factor. The anchor
/// stream, when configured, is held at exactly 1.0.
///
/// # Errors
///
/// - A configuration error if `config` does not validate.
/// - [`EngineError::NoStreamsToReconcile`] if no stream crosses the boundaries.
/// - [`EngineError::UnknownAnchor`] if the anchor does not cross any boundary.
/// - [`EngineError::NonConvergence`] if the minimiser stops short of the
///   gradient tolerance.
#[instrument(skip_all, name = "reconciliation", fields(boundaries = boundaries.len()))]
pub fn calc_corrections_with_progress(
    boundaries: &[Boundary],
    config: &ReconciliationConfig,
    penalty: Option<Penalty<'_>>,
    reporter: &ProgressReporter,
) -> Result<Corrections, EngineError> {
    config.validate()?;
    let problem = Problem::new(boundaries, config, penalty)?;
    info!(
        streams = problem.names.len(),
        free = problem.free.len(),
        terms = problem.terms.len(),
        anchor = config.anchor.as_deref().unwrap_or("none"),
        "Starting reconciliation."
    );

    let x0 = DVector::from_element(problem.free.len(), 1.0);
    let minimum = Bfgs::new(&config.solver).minimize(
        |x| problem.objective(x),
        x0,
        |step| reporter.emit(Progress::SolverStep(step)),
    );

    if !minimum.converged {
        warn!(
            iterations = minimum.iterations,
            gradient_norm = minimum.gradient_norm,
            "Reconciliation did not converge."
        );
        return Err(EngineError::NonConvergence {
            iterations: minimum.iterations,
            gradient_norm: minimum.gradient_norm,
        });
    }

    let factors = problem.mapping(&problem.expand(&minimum.x));
    info!(
        iterations = minimum.iterations,
        objective = minimum.value,
        "Reconciliation converged."
    );
    Ok(Corrections {
        factors,
        objective: minimum.value,
        iterations: minimum.iterations,
        gradient_norm: minimum.gradient_norm,
    })
}
