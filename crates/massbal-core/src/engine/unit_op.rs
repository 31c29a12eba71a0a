use super::error::EngineError;
use super::operations;
use crate::core::reaction::Reaction;
use crate::core::stream::Stream;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Per-component routing of a component splitter: `component -> (outlet -> fraction)`.
pub type ComponentRoutes = BTreeMap<String, BTreeMap<String, f64>>;

/// Extension point for user-defined unit operations.
///
/// `compute` receives the current inlet streams in inlet order and must return
/// exactly one stream per outlet name, in outlet order. Returned streams are
/// renamed to the outlet names before they are stored.
pub trait UnitOperation: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, inlets: &[&Stream], outlets: &[String]) -> Result<Vec<Stream>, EngineError>;
}

/// The computation a unit operation performs, with its typed parameters.
#[derive(Debug, Clone)]
pub enum Calculation {
    /// Connects streams topologically without computing anything.
    Passive,
    /// Sums all inlets into a single outlet.
    Mixer,
    /// Splits the summed inlet by fraction; the last outlet takes the remainder.
    FlowSplitter { fractions: Vec<f64> },
    /// Routes each component separately; see [`ComponentRoutes`].
    ComponentSplitter { routes: ComponentRoutes },
    /// Applies reactions in parallel to the summed inlet.
    StoichiometricReactor { reactions: Vec<Reaction> },
    Custom(Arc<dyn UnitOperation>),
}

impl Calculation {
    pub fn kind(&self) -> &str {
        match self {
            Calculation::Passive => "passive",
            Calculation::Mixer => "mixer",
            Calculation::FlowSplitter { .. } => "flow-splitter",
            Calculation::ComponentSplitter { .. } => "component-splitter",
            Calculation::StoichiometricReactor { .. } => "stoichiometric-reactor",
            Calculation::Custom(op) => op.name(),
        }
    }
}

/// A named node of the flowsheet graph.
///
/// Unit operations reference streams by name only; the streams themselves live
/// in the owning [`Flowsheet`](super::flowsheet::Flowsheet).
#[derive(Debug, Clone)]
pub struct UnitOp {
    name: String,
    inlets: Vec<String>,
    outlets: Vec<String>,
    calculation: Calculation,
}

impl UnitOp {
    /// Creates a unit operation, validating the calculation's parameters
    /// against the inlet and outlet lists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidUnitOp`] for structural problems (empty
    /// name, repeated outlet, wrong outlet count, bad fractions, unknown route
    /// target) and [`EngineError::Overconversion`] when reactions sharing a
    /// key component request more than full conversion.
    pub fn new(
        name: &str,
        inlets: &[&str],
        outlets: &[&str],
        calculation: Calculation,
    ) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidUnitOp {
            unit_op: name.to_string(),
            reason,
        };
        if name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = outlets.iter().find(|o| !seen.insert(**o)) {
            return Err(invalid(format!("outlet '{}' is listed more than once", dup)));
        }
        if let Some(both) = inlets.iter().find(|i| outlets.contains(*i)) {
            return Err(invalid(format!("stream '{}' is both inlet and outlet", both)));
        }

        let unit_op = Self {
            name: name.to_string(),
            inlets: inlets.iter().map(|s| s.to_string()).collect(),
            outlets: outlets.iter().map(|s| s.to_string()).collect(),
            calculation,
        };
        operations::validate(&unit_op)?;
        Ok(unit_op)
    }

    pub fn passive(name: &str, inlets: &[&str], outlets: &[&str]) -> Result<Self, EngineError> {
        Self::new(name, inlets, outlets, Calculation::Passive)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inlets(&self) -> &[String] {
        &self.inlets
    }

    pub fn outlets(&self) -> &[String] {
        &self.outlets
    }

    pub fn calculation(&self) -> &Calculation {
        &self.calculation
    }

    pub fn is_passive(&self) -> bool {
        matches!(self.calculation, Calculation::Passive)
    }

    /// Whether `stream` is one of this unit op's inlets or outlets.
    pub fn references(&self, stream: &str) -> bool {
        self.inlets.iter().chain(&self.outlets).any(|s| s == stream)
    }

    /// Computes the outlet streams from the given inlets.
    ///
    /// Returns `None` for passive unit operations. Otherwise the result holds
    /// one stream per outlet, in outlet order, each named after its outlet.
    pub fn compute(&self, inlets: &[&Stream]) -> Result<Option<Vec<Stream>>, EngineError> {
        let outlets = match &self.calculation {
            Calculation::Passive => return Ok(None),
            Calculation::Mixer => vec![operations::mixer(self, inlets)?],
            Calculation::FlowSplitter { fractions } => {
                operations::flow_splitter(self, inlets, fractions)?
            }
            Calculation::ComponentSplitter { routes } => {
                operations::component_splitter(self, inlets, routes)?
            }
            Calculation::StoichiometricReactor { reactions } => {
                vec![operations::stoichiometric_reactor(self, inlets, reactions)?]
            }
            Calculation::Custom(op) => {
                let computed = op.compute(inlets, &self.outlets)?;
                if computed.len() != self.outlets.len() {
                    return Err(EngineError::CustomOperation {
                        unit_op: self.name.clone(),
                        message: format!(
                            "returned {} streams for {} outlets",
                            computed.len(),
                            self.outlets.len()
                        ),
                    });
                }
                computed
                    .iter()
                    .zip(&self.outlets)
                    .map(|(stream, outlet)| stream.rename(outlet))
                    .collect()
            }
        };
        Ok(Some(outlets))
    }
}
