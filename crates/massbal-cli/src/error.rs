use crate::io::history::HistoryError;
use massbal::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Why a `massbal` invocation failed, by the input or output at fault.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine rejected a definition from the flowsheet, or the solve failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Cannot read flowsheet '{}': {source}", path.display())]
    FlowsheetFile {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The file parsed, but the flowsheet it describes is incomplete or
    /// contradictory.
    #[error("Invalid flowsheet: {0}")]
    Flowsheet(String),

    #[error("History of stream '{stream}': {source}")]
    History {
        stream: String,
        #[source]
        source: HistoryError,
    },

    #[error("Invalid reconciliation settings: {0}")]
    Settings(String),

    #[error("Cannot write '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot set up logging: {0}")]
    Logging(String),
}
