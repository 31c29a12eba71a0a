use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, fmt, prelude::*};

/// Targets whose events follow the verbosity flags. Events from dependencies
/// are capped at `WARN`.
const MASSBAL_TARGETS: [&str; 2] = ["massbal", "massbal_cli"];

/// Stderr level chosen by `-q` and the number of `-v` flags.
pub fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// A log file keeps per-boundary and per-unit-op detail even when the
/// console is quiet; `-vvv` adds solver iterations to both.
fn file_level(console: LevelFilter) -> LevelFilter {
    console.max(LevelFilter::DEBUG)
}

fn massbal_filter(level: LevelFilter) -> Targets {
    let dependencies = level.min(LevelFilter::WARN);
    MASSBAL_TARGETS
        .into_iter()
        .fold(Targets::new().with_default(dependencies), |filter, target| {
            filter.with_target(target, level)
        })
}

fn file_layer<S>(path: &Path, level: LevelFilter) -> Result<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = File::create(path).map_err(|e| {
        CliError::Logging(format!("cannot create log file '{}': {e}", path.display()))
    })?;
    Ok(fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_filter(massbal_filter(level)))
}

/// Installs the global subscriber: a compact stderr layer and, with
/// `--log-file`, a plain-text file layer.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let console = console_level(verbosity, quiet);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .with_filter(massbal_filter(console));
    let file_layer = log_file
        .map(|path| file_layer(path, file_level(console)))
        .transpose()?;

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tracing::{Level, debug, trace, warn};
    use tracing_subscriber::Registry;

    #[test]
    fn verbosity_flags_select_the_console_level() {
        assert_eq!(console_level(0, false), LevelFilter::WARN);
        assert_eq!(console_level(2, false), LevelFilter::DEBUG);
        assert_eq!(console_level(7, false), LevelFilter::TRACE);
        assert_eq!(console_level(3, true), LevelFilter::OFF);
    }

    #[test]
    fn log_file_records_debug_detail_even_when_quiet() {
        assert_eq!(file_level(LevelFilter::OFF), LevelFilter::DEBUG);
        assert_eq!(file_level(LevelFilter::TRACE), LevelFilter::TRACE);
    }

    #[test]
    fn dependencies_are_capped_at_warn() {
        let filter = massbal_filter(LevelFilter::TRACE);
        assert!(filter.would_enable("massbal::engine::optimizer", &Level::TRACE));
        assert!(filter.would_enable("massbal_cli::commands::reconcile", &Level::DEBUG));
        assert!(!filter.would_enable("indicatif", &Level::INFO));
        assert!(filter.would_enable("indicatif", &Level::WARN));
    }

    #[test]
    fn quiet_filter_drops_everything() {
        let filter = massbal_filter(LevelFilter::OFF);
        assert!(!filter.would_enable("massbal::workflows::closemb", &Level::ERROR));
        assert!(!filter.would_enable("csv", &Level::ERROR));
    }

    #[test]
    fn file_layer_keeps_massbal_events_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("massbal.log");
        let layer = file_layer::<Registry>(&path, LevelFilter::DEBUG).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!(target: "massbal::engine::boundary", boundary = "plant", "Built boundary.");
            trace!(target: "massbal::engine::optimizer", "BFGS step.");
            debug!(target: "toml", "Parsed table.");
            warn!(target: "toml", "Duplicate key.");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Built boundary."));
        assert!(content.contains("boundary=\"plant\""));
        assert!(content.contains("massbal::engine::boundary"));
        assert!(!content.contains("BFGS step."));
        assert!(!content.contains("Parsed table."));
        assert!(content.contains("Duplicate key."));
    }

    #[test]
    fn unwritable_log_file_is_a_logging_error() {
        let result = file_layer::<Registry>(Path::new("/"), LevelFilter::DEBUG);
        assert!(matches!(result, Err(CliError::Logging(msg)) if msg.contains("cannot create")));
    }

    #[test]
    #[serial]
    fn global_subscriber_is_installed_once() {
        let _ = setup_logging(0, true, None);
        assert!(matches!(setup_logging(0, true, None), Err(CliError::Logging(_))));
    }
}
