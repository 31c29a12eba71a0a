use super::defaults::DefaultsConfig;
use super::file::FileReconciliationConfig;
use super::models::AppConfig;
use crate::cli::ReconcileArgs;
use crate::error::{CliError, Result};
use massbal::engine::config::{ElementWeights, ReconciliationConfigBuilder};

/// Merges command-line overrides, the flowsheet file's `[reconciliation]`
/// table and the defaults, in that order of precedence.
pub fn build_config(
    args: &ReconcileArgs,
    file_config: Option<&FileReconciliationConfig>,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = file_config.cloned().unwrap_or_default();

    let anchor = args.anchor.clone().or(file_config.anchor);
    let lambda = args.lambda.or(file_config.lambda).unwrap_or(defaults.lambda);
    let total_weight = args
        .total_weight
        .or(file_config.total_weight)
        .unwrap_or(defaults.total_weight);
    let element_weight = args
        .element_weight
        .or(file_config.element_weight)
        .unwrap_or(defaults.element_weight);
    let element_weights = match file_config.element_weights {
        Some(weights) if !weights.is_empty() => ElementWeights::PerAtom {
            weights,
            default: element_weight,
        },
        _ => ElementWeights::Uniform(element_weight),
    };
    let max_iterations = args
        .max_iterations
        .or(file_config.max_iterations)
        .unwrap_or(defaults.max_iterations);
    let gradient_tolerance = file_config
        .gradient_tolerance
        .unwrap_or(defaults.gradient_tolerance);

    let mut builder = ReconciliationConfigBuilder::new()
        .total_weight(total_weight)
        .element_weights(element_weights)
        .regularization(lambda)
        .max_iterations(max_iterations)
        .gradient_tolerance(gradient_tolerance);
    if let Some(anchor) = anchor {
        builder = builder.anchor(anchor);
    }
    let core_config = builder
        .build()
        .map_err(|e| CliError::Settings(e.to_string()))?;

    Ok(AppConfig {
        boundaries: args.flowsheet.boundaries.clone(),
        output_path: args.output.clone(),
        report_path: args.report.clone(),
        core_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use massbal::engine::config::ReconciliationConfig;
    use std::collections::BTreeMap;

    fn reconcile_args(extra: &[&str]) -> ReconcileArgs {
        let mut argv = vec!["massbal", "reconcile", "-f", "plant.toml"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Reconcile(args) => args,
            other => panic!("Expected 'reconcile' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn defaults_apply_without_file_or_overrides() {
        let config = build_config(&reconcile_args(&[]), None).unwrap();

        assert_eq!(config.core_config, ReconciliationConfig::default());
        assert_eq!(config.core_config.element_weights, ElementWeights::Uniform(1.0));
        assert!(config.boundaries.is_empty());
        assert!(config.output_path.is_none());
    }

    #[test]
    fn cli_args_override_file_values() {
        let file = FileReconciliationConfig {
            anchor: Some("Feed".to_string()),
            lambda: Some(0.5),
            max_iterations: Some(50),
            ..Default::default()
        };
        let args = reconcile_args(&[
            "--lambda", "0.1", "-a", "C2", "-b", "plant", "-r", "out.toml",
        ]);

        let config = build_config(&args, Some(&file)).unwrap();

        assert_eq!(config.core_config.regularization, 0.1);
        assert_eq!(config.core_config.anchor.as_deref(), Some("C2"));
        assert_eq!(config.core_config.solver.max_iterations, 50);
        assert_eq!(config.boundaries, vec!["plant"]);
        assert_eq!(config.report_path.as_deref(), Some(std::path::Path::new("out.toml")));
    }

    #[test]
    fn per_element_weights_use_element_weight_as_default() {
        let file = FileReconciliationConfig {
            element_weights: Some(BTreeMap::from([("O".to_string(), 3.0)])),
            ..Default::default()
        };
        let args = reconcile_args(&["--element-weight", "0.5"]);

        let config = build_config(&args, Some(&file)).unwrap();

        assert_eq!(config.core_config.element_weights.weight("O"), 3.0);
        assert_eq!(config.core_config.element_weights.weight("C"), 0.5);
    }

    #[test]
    fn under_determined_settings_are_a_config_error() {
        let args = reconcile_args(&["--lambda", "0"]);
        let result = build_config(&args, None);
        assert!(matches!(result, Err(CliError::Settings(msg)) if msg.contains("anchor")));
    }
}
