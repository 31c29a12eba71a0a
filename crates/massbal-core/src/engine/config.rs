use std::collections::BTreeMap;
use thiserror::Error;

const DEFAULT_TOTAL_WEIGHT: f64 = 1.0;
const DEFAULT_ELEMENT_WEIGHT: f64 = 1.0;
const DEFAULT_REGULARIZATION: f64 = 0.01;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Weight '{name}' must be finite and non-negative, got {value}")]
    NegativeWeight { name: String, value: f64 },

    #[error(
        "Reconciliation without an anchor stream requires a positive regularization strength"
    )]
    UnderDetermined,

    #[error("Invalid solver setting '{name}': {reason}")]
    InvalidSolverSetting { name: &'static str, reason: String },
}

/// Weights applied to the per-element closure terms of the objective.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementWeights {
    /// The same weight for every element.
    Uniform(f64),
    /// Explicit weights per element symbol; unlisted elements use `default`.
    PerAtom {
        weights: BTreeMap<String, f64>,
        default: f64,
    },
}

impl Default for ElementWeights {
    fn default() -> Self {
        Self::Uniform(DEFAULT_ELEMENT_WEIGHT)
    }
}

impl ElementWeights {
    pub fn weight(&self, atom: &str) -> f64 {
        match self {
            ElementWeights::Uniform(w) => *w,
            ElementWeights::PerAtom { weights, default } => {
                weights.get(atom).copied().unwrap_or(*default)
            }
        }
    }

    /// Weight of an element with no explicit entry.
    pub fn default_weight(&self) -> f64 {
        match self {
            ElementWeights::Uniform(w) => *w,
            ElementWeights::PerAtom { default, .. } => *default,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ElementWeights::Uniform(w) => check_weight("element_weight", *w),
            ElementWeights::PerAtom { weights, default } => {
                check_weight("element_weight", *default)?;
                weights
                    .iter()
                    .try_for_each(|(atom, &w)| check_weight(&format!("element_weight[{atom}]"), w))
            }
        }
    }
}

/// Settings of the quasi-Newton minimiser.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// Convergence is declared when the infinity norm of the gradient falls
    /// to or below this value.
    pub gradient_tolerance: f64,
    /// Step of the central finite-difference gradient.
    pub step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            gradient_tolerance: 1e-10,
            step: 1e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationConfig {
    /// Stream whose correction factor is fixed at exactly 1.0.
    pub anchor: Option<String>,
    pub total_weight: f64,
    pub element_weights: ElementWeights,
    /// Strength of the penalty on each free factor's deviation from 1.0.
    pub regularization: f64,
    pub solver: SolverConfig,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            anchor: None,
            total_weight: DEFAULT_TOTAL_WEIGHT,
            element_weights: ElementWeights::default(),
            regularization: DEFAULT_REGULARIZATION,
            solver: SolverConfig::default(),
        }
    }
}

#[derive(Default)]
pub struct ReconciliationConfigBuilder {
    anchor: Option<String>,
    total_weight: Option<f64>,
    element_weights: Option<ElementWeights>,
    regularization: Option<f64>,
    max_iterations: Option<usize>,
    gradient_tolerance: Option<f64>,
    step: Option<f64>,
}

impl ReconciliationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(mut self, stream: impl Into<String>) -> Self {
        self.anchor = Some(stream.into());
        self
    }
    pub fn total_weight(mut self, weight: f64) -> Self {
        self.total_weight = Some(weight);
        self
    }
    pub fn element_weight(mut self, weight: f64) -> Self {
        self.element_weights = Some(ElementWeights::Uniform(weight));
        self
    }
    pub fn element_weights(mut self, weights: ElementWeights) -> Self {
        self.element_weights = Some(weights);
        self
    }
    pub fn regularization(mut self, lambda: f64) -> Self {
        self.regularization = Some(lambda);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = Some(tolerance);
        self
    }
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Applies defaults and validates the result.
    ///
    /// # Errors
    ///
    /// See [`ReconciliationConfig::validate`].
    pub fn build(self) -> Result<ReconciliationConfig, ConfigError> {
        let defaults = ReconciliationConfig::default();
        let config = ReconciliationConfig {
            anchor: self.anchor,
            total_weight: self.total_weight.unwrap_or(defaults.total_weight),
            element_weights: self.element_weights.unwrap_or(defaults.element_weights),
            regularization: self.regularization.unwrap_or(defaults.regularization),
            solver: SolverConfig {
                max_iterations: self
                    .max_iterations
                    .unwrap_or(defaults.solver.max_iterations),
                gradient_tolerance: self
                    .gradient_tolerance
                    .unwrap_or(defaults.solver.gradient_tolerance),
                step: self.step.unwrap_or(defaults.solver.step),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl ReconciliationConfig {
    /// Checks weights and solver settings.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NegativeWeight`] for a negative or non-finite weight or
    ///   regularization strength.
    /// - [`ConfigError::UnderDetermined`] when no anchor is set and the
    ///   regularization strength is zero.
    /// - [`ConfigError::InvalidSolverSetting`] for a zero iteration budget or a
    ///   non-positive tolerance or step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let solver = &self.solver;
        if solver.max_iterations == 0 {
            return Err(ConfigError::InvalidSolverSetting {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(solver.gradient_tolerance.is_finite() && solver.gradient_tolerance > 0.0) {
            return Err(ConfigError::InvalidSolverSetting {
                name: "gradient_tolerance",
                reason: format!("must be positive, got {}", solver.gradient_tolerance),
            });
        }
        if !(solver.step.is_finite() && solver.step > 0.0) {
            return Err(ConfigError::InvalidSolverSetting {
                name: "step",
                reason: format!("must be positive, got {}", solver.step),
            });
        }

        check_weight("total_weight", self.total_weight)?;
        self.element_weights.validate()?;
        check_weight("regularization", self.regularization)?;

        if self.anchor.is_none() && self.regularization == 0.0 {
            return Err(ConfigError::UnderDetermined);
        }
        Ok(())
    }
}

fn check_weight(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeWeight {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ReconciliationConfigBuilder::new().build().unwrap();
        assert_eq!(config, ReconciliationConfig::default());
        assert_eq!(config.regularization, 0.01);
        assert_eq!(config.solver.max_iterations, 500);
        assert_eq!(config.element_weights.weight("C"), 1.0);
    }

    #[test]
    fn no_anchor_without_regularization_is_rejected() {
        let result = ReconciliationConfigBuilder::new().regularization(0.0).build();
        assert_eq!(result, Err(ConfigError::UnderDetermined));
    }

    #[test]
    fn anchor_allows_zero_regularization() {
        let config = ReconciliationConfigBuilder::new()
            .anchor("Feed")
            .regularization(0.0)
            .build()
            .unwrap();
        assert_eq!(config.anchor.as_deref(), Some("Feed"));
    }

    #[test]
    fn negative_weights_are_rejected() {
        assert!(matches!(
            ReconciliationConfigBuilder::new().total_weight(-1.0).build(),
            Err(ConfigError::NegativeWeight { .. })
        ));
        let weights = ElementWeights::PerAtom {
            weights: BTreeMap::from([("O".to_string(), -0.5)]),
            default: 1.0,
        };
        assert!(matches!(
            ReconciliationConfigBuilder::new().element_weights(weights).build(),
            Err(ConfigError::NegativeWeight { name, .. }) if name == "element_weight[O]"
        ));
    }

    #[test]
    fn invalid_solver_settings_are_rejected() {
        assert!(matches!(
            ReconciliationConfigBuilder::new().max_iterations(0).build(),
            Err(ConfigError::InvalidSolverSetting { name: "max_iterations", .. })
        ));
        assert!(matches!(
            ReconciliationConfigBuilder::new().step(0.0).build(),
            Err(ConfigError::InvalidSolverSetting { name: "step", .. })
        ));
    }

    #[test]
    fn hand_built_configs_are_validated() {
        let config = ReconciliationConfig {
            regularization: 0.0,
            ..ReconciliationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::UnderDetermined));
        assert_eq!(ReconciliationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn per_atom_weights_fall_back_to_default() {
        let weights = ElementWeights::PerAtom {
            weights: BTreeMap::from([("H".to_string(), 2.0)]),
            default: 0.5,
        };
        assert_eq!(weights.weight("H"), 2.0);
        assert_eq!(weights.weight("C"), 0.5);
        assert_eq!(weights.default_weight(), 0.5);
        assert_eq!(ElementWeights::Uniform(3.0).default_weight(), 3.0);
    }
}
