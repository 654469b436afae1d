//! Error types for parsing, regression and run storage.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Export parsing
// ---------------------------------------------------------------------------

/// Failure while turning raw export text into rows. Always fatal to the
/// whole import.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The text does not follow the fixed export layout, or a
    /// closed-vocabulary field holds an unknown token.
    #[error("line {line}: {message}")]
    Format { line: usize, message: String },

    /// A field's text does not parse as its declared type.
    #[error("line {line}: column '{column}' value '{value}' is not a valid {expected}")]
    Cast {
        line: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// The raw text could not be read.
    #[error("reading export: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        ExportError::Format {
            line,
            message: message.into(),
        }
    }

    /// 1-based line the error was raised on, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ExportError::Format { line, .. } | ExportError::Cast { line, .. } => Some(*line),
            ExportError::Io(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegressionError {
    /// Unsupported model or weighting factor.
    #[error("invalid regression configuration: {0}")]
    InvalidConfiguration(String),

    /// The fit produced a non-finite gradient or intercept.
    #[error("calibration fit failed: gradient {gradient}, intercept {y_intercept} over {active} active standard(s)")]
    DegenerateFit {
        gradient: f64,
        y_intercept: f64,
        active: usize,
    },

    #[error("no {kind} point at index {index}")]
    PointNotFound { kind: String, index: usize },
}

// ---------------------------------------------------------------------------
// Run storage
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("run '{run_id}' not found in project '{project_id}'")]
    NotFound { project_id: String, run_id: String },

    #[error("invalid identifier '{0}'")]
    InvalidId(String),

    #[error("run storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("run document: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
