use thiserror::Error;

use super::config::ConfigError;
use crate::core::error::{ConsistencyError, DefinitionError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("Boundary '{0}' contains no unit operations")]
    EmptyBoundary(String),

    #[error("Boundary '{boundary}' references unknown unit operation '{unit_op}'")]
    UnknownUnitOp { boundary: String, unit_op: String },

    #[error("Boundary '{0}' has no feed streams crossing it")]
    NoFeeds(String),

    #[error("Boundary '{0}' has no product streams crossing it")]
    NoProducts(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Definition error: {source}")]
    Definition {
        #[from]
        source: DefinitionError,
    },

    #[error("Consistency error: {source}")]
    Consistency {
        #[from]
        source: ConsistencyError,
    },

    #[error("Boundary error: {source}")]
    Boundary {
        #[from]
        source: BoundaryError,
    },

    #[error("Invalid reconciliation configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Invalid unit operation '{unit_op}': {reason}")]
    InvalidUnitOp { unit_op: String, reason: String },

    #[error(
        "Reactions in '{unit_op}' sharing key component '{component}' request a total conversion of {total}"
    )]
    Overconversion {
        unit_op: String,
        component: String,
        total: f64,
    },

    #[error("Unit operation '{unit_op}' produced a negative flow of {value} for '{component}'")]
    NegativeFlow {
        unit_op: String,
        component: String,
        value: f64,
    },

    #[error("Stream '{0}' does not exist")]
    UnknownStream(String),

    #[error("Unit operation '{0}' does not exist")]
    UnknownUnitOp(String),

    #[error("Boundary '{0}' does not exist")]
    UnknownBoundary(String),

    #[error("Stream '{0}' already exists")]
    DuplicateStream(String),

    #[error("Unit operation '{0}' already exists")]
    DuplicateUnitOp(String),

    #[error("Boundary '{0}' already exists")]
    DuplicateBoundary(String),

    #[error("Invalid execution order: {0}")]
    InvalidExecutionOrder(String),

    #[error("Anchor stream '{0}' does not cross any of the boundaries")]
    UnknownAnchor(String),

    #[error("No streams cross the given boundaries")]
    NoStreamsToReconcile,

    #[error(
        "Reconciliation did not converge after {iterations} iterations (gradient norm {gradient_norm:e})"
    )]
    NonConvergence {
        iterations: usize,
        gradient_norm: f64,
    },

    #[error("Custom operation '{unit_op}' failed: {message}")]
    CustomOperation { unit_op: String, message: String },
}
