//! Error types for the featurepipe ETL pipeline.
//!
//! This module defines a hierarchy of error types, one per pipeline stage:
//!
//! - [`ExtractError`] - CSV extraction and schema-on-read errors
//! - [`TransformError`] - coercion and feature-derivation errors
//! - [`ConfigError`] - loader configuration errors
//! - [`LoadError`] - batch write errors, split into transient and persistent
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across stage boundaries.

use thiserror::Error;

use crate::validate::ValidationReport;

// =============================================================================
// Extraction Errors
// =============================================================================

/// Errors during CSV extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode content.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Expected columns missing from the header (schema-on-read failure).
    #[error("Dataset '{dataset}' is missing expected columns: {columns:?}")]
    MissingColumns {
        dataset: String,
        columns: Vec<String>,
    },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors during transformation.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A feature rule reads a column that does not exist.
    #[error("Feature rule '{rule}' reads unknown column '{column}'")]
    UnknownColumn { rule: String, column: String },

    /// A rule produced (or would produce) a value outside its declared
    /// codomain, e.g. an unmapped category hit an encoding table.
    #[error("Rule '{rule}': value '{value}' in column '{column}' is outside the declared codomain")]
    ImputationPolicy {
        rule: String,
        column: String,
        value: String,
    },

    /// Derived column length does not match the row count.
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors building the loader configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is not set.
    #[error("Missing environment variable: {0}")]
    MissingVar(String),

    /// Environment variable is set but cannot be parsed.
    #[error("Invalid value '{value}' for {var}")]
    InvalidVar { var: String, value: String },
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors from a single batch write attempt.
///
/// The transient/persistent split drives the Loader's retry policy:
/// transient failures are retried with backoff, persistent failures
/// abort the batch immediately.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Connection/timeout/throttling class failure. Retryable.
    #[error("Transient write failure{}: {message}", fmt_status(.status))]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Auth failure, constraint violation, schema mismatch. Not retryable.
    #[error("Persistent write failure{}: {message}", fmt_status(.status))]
    Persistent {
        status: Option<u16>,
        message: String,
    },

    /// The load was cancelled before this batch was dispatched.
    #[error("Load cancelled before dispatch")]
    Cancelled,
}

impl LoadError {
    /// Whether the Loader should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, LoadError::Transient { .. })
    }

    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        LoadError::Transient {
            status,
            message: message.into(),
        }
    }

    pub fn persistent(status: Option<u16>, message: impl Into<String>) -> Self {
        LoadError::Persistent {
            status,
            message: message.into(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::pipeline::run`].
/// It wraps all stage errors and adds pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extraction error.
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// One or more validation rules failed; the load never started.
    #[error("Validation failed:\n{0}")]
    Validation(ValidationReport),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown dataset name on the CLI surface.
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    /// IO error writing reports or staged output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV report writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ExtractError -> PipelineError
        let extract_err = ExtractError::EmptyFile;
        let pipeline_err: PipelineError = extract_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // TransformError -> PipelineError
        let transform_err = TransformError::UnknownColumn {
            rule: "tenure_group".into(),
            column: "tenure".into(),
        };
        let pipeline_err: PipelineError = transform_err.into();
        assert!(pipeline_err.to_string().contains("tenure"));
    }

    #[test]
    fn test_load_error_classification() {
        assert!(LoadError::transient(Some(429), "rate limited").is_transient());
        assert!(LoadError::transient(None, "timeout").is_transient());
        assert!(!LoadError::persistent(Some(409), "conflict").is_transient());
        assert!(!LoadError::Cancelled.is_transient());
    }

    #[test]
    fn test_load_error_format() {
        let err = LoadError::persistent(Some(401), "bad key");
        let msg = err.to_string();
        assert!(msg.contains("HTTP 401"));
        assert!(msg.contains("bad key"));

        let err = LoadError::transient(None, "connection reset");
        assert!(!err.to_string().contains("HTTP"));
    }
}
