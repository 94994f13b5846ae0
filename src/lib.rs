//! # Featurepipe - batched feature-engineering ETL for tabular datasets
//!
//! Featurepipe ingests flat CSV datasets (Telco customer
//! subscriptions, Titanic passengers), cleans and enriches them,
//! verifies data-quality invariants, and persists the result into an
//! external relational table with batched, retried writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    ┌─────────────┐    ┌───────────┐    ┌──────────┐
//! │  CSV File │───▶│ Transformer │───▶│ Validator │───▶│  Loader  │
//! │ (extract) │    │ (coerce +   │    │ (gate)    │    │ (batched │
//! │           │    │  features)  │    │           │    │  + retry)│
//! └───────────┘    └─────────────┘    └───────────┘    └──────────┘
//! ```
//!
//! Transformer and Validator are pure; the Loader is the only
//! component with side effects and retry logic.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use featurepipe::{pipeline, LoadConfig, RestWriter, RunOptions, TELCO};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoadConfig::from_env()?;
//!     let writer = RestWriter::new(&config);
//!     let summary = pipeline::run(
//!         "data/raw/telco.csv".as_ref(),
//!         &TELCO,
//!         &config,
//!         writer,
//!         &RunOptions::default(),
//!     )
//!     .await?;
//!     println!("{} rows loaded", summary.rows);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`record`] - Cell and RecordSet table abstraction
//! - [`dataset`] - Built-in dataset specifications
//! - [`extract`] - CSV extraction with auto-detection
//! - [`transform`] - Coercion, imputation, feature rules
//! - [`validate`] - Data-quality predicate set
//! - [`load`] - Batched, retried persistence
//! - [`analyze`] - Descriptive aggregation reports
//! - [`config`] - Loader configuration
//! - [`pipeline`] - Orchestration

// Core modules
pub mod error;
pub mod record;

// Dataset specifications
pub mod dataset;

// Extraction
pub mod extract;

// Transformation
pub mod transform;

// Validation
pub mod validate;

// Loading
pub mod config;
pub mod load;

// Analysis
pub mod analyze;

// Orchestration
pub mod logging;
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ExtractError, LoadError, PipelineError, PipelineResult, TransformError,
};

// =============================================================================
// Re-exports - Data model
// =============================================================================

pub use record::{Cell, RecordSet};

pub use dataset::{ColumnSpec, DatasetSpec, SemanticType, TELCO, TITANIC};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use extract::{extract_bytes, extract_file, write_csv};

pub use transform::{
    rules::{Codomain, FeatureRule, RuleKind, Threshold},
    transform, UNKNOWN_CATEGORY,
};

pub use validate::{validate, RuleOutcome, ValidationReport};

pub use config::LoadConfig;

pub use load::{
    rest::RestWriter, BatchOutcome, BatchRef, BatchStatus, BatchWriter, LoadReport, Loader,
    RetryEvent,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{run, RunOptions, RunSummary};
