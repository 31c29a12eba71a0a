use chrono::NaiveDateTime;
use nalgebra::DMatrix;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Timestamp format of the first column of a history file.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

const TIMESTAMP_HEADER: &str = "timestamp";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("CSV error in '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Expected the first column of '{}' to be 'timestamp', found '{found}'", path.display())]
    MissingTimestampColumn { path: PathBuf, found: String },
    #[error("'{}' has no component columns", path.display())]
    NoComponents { path: PathBuf },
    #[error("'{}' has no samples", path.display())]
    NoSamples { path: PathBuf },
    #[error(
        "Invalid timestamp '{value}' on line {line} of '{}' (expected YYYY/MM/DD HH:MM)",
        path.display()
    )]
    Timestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },
    #[error("Invalid flow '{value}' for '{component}' on line {line} of '{}'", path.display())]
    Flow {
        path: PathBuf,
        line: u64,
        component: String,
        value: String,
    },
}

/// Measured flows of one stream over time.
#[derive(Debug, Clone)]
pub struct History {
    pub timestamps: Vec<NaiveDateTime>,
    pub components: Vec<String>,
    /// One row per timestamp, one column per component.
    pub flows: DMatrix<f64>,
}

impl History {
    pub fn component_refs(&self) -> Vec<&str> {
        self.components.iter().map(String::as_str).collect()
    }
}

/// Reads a history CSV whose header is `timestamp,<component>,<component>,...`.
pub fn read_history(path: &Path) -> Result<History, HistoryError> {
    let csv_err = |e| HistoryError::Csv {
        path: path.to_path_buf(),
        source: e,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut columns = headers.iter();
    match columns.next() {
        Some(first) if first.eq_ignore_ascii_case(TIMESTAMP_HEADER) => {}
        other => {
            return Err(HistoryError::MissingTimestampColumn {
                path: path.to_path_buf(),
                found: other.unwrap_or_default().to_string(),
            });
        }
    }
    let components: Vec<String> = columns.map(str::to_string).collect();
    if components.is_empty() {
        return Err(HistoryError::NoComponents {
            path: path.to_path_buf(),
        });
    }

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());

        let stamp = record.get(0).unwrap_or_default();
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|_| {
            HistoryError::Timestamp {
                path: path.to_path_buf(),
                line,
                value: stamp.to_string(),
            }
        })?;
        timestamps.push(timestamp);

        for (component, field) in components.iter().zip(record.iter().skip(1)) {
            let flow = field.parse::<f64>().map_err(|_| HistoryError::Flow {
                path: path.to_path_buf(),
                line,
                component: component.clone(),
                value: field.to_string(),
            })?;
            values.push(flow);
        }
    }
    if timestamps.is_empty() {
        return Err(HistoryError::NoSamples {
            path: path.to_path_buf(),
        });
    }

    debug!(
        samples = timestamps.len(),
        components = components.len(),
        "Read stream history from {:?}",
        path
    );
    let flows = DMatrix::from_row_slice(timestamps.len(), components.len(), &values);
    Ok(History {
        timestamps,
        components,
        flows,
    })
}
