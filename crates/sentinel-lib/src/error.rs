//! Error types for the monitoring engine

use thiserror::Error;

/// Errors surfaced by the engine's public operations
///
/// Numeric degeneracy (zero variance, zero totals) is never an error; those
/// cases are guarded inside the statistics helpers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MonitorError {
    #[error("invalid sample for metric '{metric}': {reason}")]
    InvalidSample { metric: String, reason: String },

    #[error("sample for metric '{metric}' is older than the newest retained sample")]
    OutOfOrderSample { metric: String },

    #[error("invalid threshold '{id}': {reason}")]
    InvalidThreshold { id: String, reason: String },

    #[error("threshold not found: {0}")]
    ThresholdNotFound(String),

    #[error("alert not found: {0}")]
    AlertNotFound(String),

    #[error("detection model not found: {0}")]
    ModelNotFound(String),

    #[error("invalid detection model '{id}': {reason}")]
    InvalidModel { id: String, reason: String },

    #[error("alert {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("invalid experiment: {0}")]
    InvalidExperiment(String),
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
