//! Crate-level error types.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable simulation configuration.
///
/// Raised at construction time; a simulation never runs a single step
/// with a configuration that failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be within [{min}, {max}] (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{lower_field} ({lower}) must be below {upper_field} ({upper})")]
    Inverted {
        lower_field: &'static str,
        lower: f64,
        upper_field: &'static str,
        upper: f64,
    },

    #[error("burst bands must be listed in ascending temperature order")]
    UnorderedBurstBands,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
