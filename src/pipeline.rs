//! Pipeline orchestration: Extract → Transform → Validate → Load.
//!
//! The validation report is the gate: nothing is written to the store
//! unless every rule passed. Loader failures do not surface as errors
//! here; the [`RunSummary`] carries the full per-batch outcome list so
//! the caller can judge a partial load.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::analyze;
use crate::config::LoadConfig;
use crate::dataset::DatasetSpec;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{extract_file, write_csv};
use crate::load::{BatchWriter, LoadReport, Loader};
use crate::record::RecordSet;
use crate::transform::transform;
use crate::validate::{validate, ValidationReport};

/// Options for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after validation; never touch the store.
    pub skip_load: bool,
    /// Where to write the analysis reports. None skips analysis.
    pub report_dir: Option<PathBuf>,
    /// Where to write the transformed (staged) CSV. None skips it.
    pub staged_path: Option<PathBuf>,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    /// Rows after transformation.
    pub rows: usize,
    pub validation: ValidationReport,
    /// Per-batch load outcomes; None when the load was skipped.
    pub load: Option<LoadReport>,
}

/// Extract, transform, and validate one CSV file.
///
/// Returns the transformed RecordSet together with its (passing)
/// validation report; a failed validation is an error and aborts the
/// run before any write.
pub fn prepare(input: &Path, spec: &DatasetSpec) -> PipelineResult<(RecordSet, ValidationReport)> {
    info!(dataset = %spec.name, input = %input.display(), "extracting");
    let raw = extract_file(input, spec)?;
    info!(rows = raw.len(), "extracted");

    let transformed = transform(&raw, spec)?;
    info!(
        rows = transformed.len(),
        columns = transformed.columns().len(),
        "transformed"
    );

    let report = validate(&transformed, spec);
    if !report.passed() {
        return Err(PipelineError::Validation(report));
    }
    info!("validation passed");
    Ok((transformed, report))
}

/// Run the full pipeline against one CSV file.
pub async fn run<W: BatchWriter>(
    input: &Path,
    spec: &DatasetSpec,
    config: &LoadConfig,
    writer: W,
    options: &RunOptions,
) -> PipelineResult<RunSummary> {
    let (transformed, report) = prepare(input, spec)?;

    if let Some(staged) = &options.staged_path {
        write_csv(staged, &transformed)?;
        info!(path = %staged.display(), "staged CSV written");
    }

    let load = if options.skip_load {
        info!("load skipped");
        None
    } else {
        let loader = Loader::new(writer, config.clone());
        Some(loader.load(&transformed, &spec.table).await)
    };

    if let Some(dir) = &options.report_dir {
        write_reports(dir, &transformed, spec)?;
    }

    Ok(RunSummary {
        rows: transformed.len(),
        validation: report,
        load,
    })
}

/// Write the analysis summary and pivot CSVs into `dir`.
pub fn write_reports(dir: &Path, t: &RecordSet, spec: &DatasetSpec) -> PipelineResult<()> {
    std::fs::create_dir_all(dir)?;

    let summary_path = dir.join("analysis_summary.csv");
    analyze::write_summary_csv(&summary_path, &analyze::summarize(t, spec))?;
    info!(path = %summary_path.display(), "analysis summary written");

    if let Some(pivot) = analyze::pivot(t, spec) {
        let name = format!("{}_vs_{}.csv", pivot.col_column, pivot.row_column);
        let pivot_path = dir.join(name);
        pivot.write_csv(&pivot_path)?;
        info!(path = %pivot_path.display(), "pivot written");
    }
    Ok(())
}
