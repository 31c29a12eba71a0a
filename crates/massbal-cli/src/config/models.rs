use massbal::engine::config::ReconciliationConfig;
use std::path::PathBuf;

pub struct AppConfig {
    /// Boundaries to reconcile; empty selects every defined boundary.
    pub boundaries: Vec<String>,
    pub output_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub core_config: ReconciliationConfig,
}
