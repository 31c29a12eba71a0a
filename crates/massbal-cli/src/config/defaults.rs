use massbal::engine::config::ReconciliationConfig;

/// Values used when neither the command line nor the flowsheet file sets
/// a reconciliation knob.
pub struct DefaultsConfig {
    pub total_weight: f64,
    pub element_weight: f64,
    pub lambda: f64,
    pub max_iterations: usize,
    pub gradient_tolerance: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let core = ReconciliationConfig::default();
        Self {
            total_weight: core.total_weight,
            element_weight: core.element_weights.default_weight(),
            lambda: core.regularization,
            max_iterations: core.solver.max_iterations,
            gradient_tolerance: core.solver.gradient_tolerance,
        }
    }
}
