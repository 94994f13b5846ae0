//! Featurepipe CLI - run the feature-engineering ETL pipeline
//!
//! # Main Commands
//!
//! ```bash
//! featurepipe run data/telco.csv              # Full pipeline: extract → load
//! featurepipe transform data/telco.csv       # Stage the transformed CSV
//! featurepipe validate data/telco.csv        # Print the validation report
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! featurepipe analyze data/telco.csv         # Write analysis reports only
//! featurepipe schema --dataset telco         # Print the CREATE TABLE SQL
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use featurepipe::{
    analyze, extract, logging, pipeline, transform, validate, DatasetSpec, LoadConfig,
    PipelineError, PipelineResult, RestWriter, RunOptions,
};

#[derive(Parser)]
#[command(name = "featurepipe")]
#[command(about = "Batched feature-engineering ETL for tabular datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: extract, transform, validate, load, analyze
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Dataset name (telco or titanic)
        #[arg(short, long, default_value = "telco")]
        dataset: String,

        /// Validate only; never write to the store
        #[arg(long)]
        skip_load: bool,

        /// Directory for analysis reports
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Path for the staged (transformed) CSV
        #[arg(long)]
        staged: Option<PathBuf>,

        /// Override LOAD_BATCH_SIZE
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override LOAD_MAX_RETRIES
        #[arg(long)]
        max_retries: Option<u32>,

        /// Override LOAD_CONCURRENCY (opt-in concurrent batch dispatch)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Transform a CSV file and write the staged output
    Transform {
        /// Input CSV file
        input: PathBuf,

        #[arg(short, long, default_value = "telco")]
        dataset: String,

        /// Output CSV file (default: <input>_transformed.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a CSV file and print the full report
    Validate {
        /// Input CSV file
        input: PathBuf,

        #[arg(short, long, default_value = "telco")]
        dataset: String,
    },

    /// Transform, validate, and load a CSV file into the store
    Load {
        /// Input CSV file
        input: PathBuf,

        #[arg(short, long, default_value = "telco")]
        dataset: String,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long)]
        max_retries: Option<u32>,

        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Write the analysis reports for a CSV file
    Analyze {
        /// Input CSV file
        input: PathBuf,

        #[arg(short, long, default_value = "telco")]
        dataset: String,

        /// Output directory for the reports
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the CREATE TABLE SQL for a dataset's target table
    Schema {
        #[arg(short, long, default_value = "telco")]
        dataset: String,
    },
}

#[tokio::main]
async fn main() {
    logging::init_logging();
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli.command).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn dataset(name: &str) -> PipelineResult<&'static DatasetSpec> {
    DatasetSpec::from_name(name).ok_or_else(|| PipelineError::UnknownDataset(name.to_string()))
}

/// Warn when the target table cannot be confirmed; the load itself
/// still runs and reports per-batch failures.
async fn verify_target_table(writer: &RestWriter, table: &str) {
    match writer.table_exists(table).await {
        Ok(true) => {}
        Ok(false) => warn!(
            table,
            "target table not found; create it with the SQL from the schema command"
        ),
        Err(err) => warn!(table, error = %err, "could not verify target table"),
    }
}

fn load_config(
    batch_size: Option<usize>,
    max_retries: Option<u32>,
    concurrency: Option<usize>,
) -> PipelineResult<LoadConfig> {
    let mut config = LoadConfig::from_env()?;
    if let Some(batch_size) = batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(max_retries) = max_retries {
        config = config.with_max_retries(max_retries);
    }
    if let Some(concurrency) = concurrency {
        config = config.with_concurrency(concurrency);
    }
    Ok(config)
}

async fn dispatch(command: Commands) -> PipelineResult<()> {
    match command {
        Commands::Run {
            input,
            dataset: name,
            skip_load,
            report_dir,
            staged,
            batch_size,
            max_retries,
            concurrency,
        } => {
            let spec = dataset(&name)?;
            let config = if skip_load {
                // No store access needed; don't require credentials.
                LoadConfig::new("", "")
            } else {
                load_config(batch_size, max_retries, concurrency)?
            };
            let writer = RestWriter::new(&config);
            if !skip_load {
                verify_target_table(&writer, &spec.table).await;
            }
            let options = RunOptions {
                skip_load,
                report_dir,
                staged_path: staged,
            };

            let summary = pipeline::run(&input, spec, &config, writer, &options).await?;
            println!("Transformed {} rows", summary.rows);
            if let Some(load) = summary.load {
                println!("{}", load.summary());
                if !load.is_success() {
                    for outcome in load.outcomes.iter().filter(|o| !o.is_committed()) {
                        eprintln!(
                            "Batch {} (rows {}..{}): {:?}",
                            outcome.batch.index,
                            outcome.batch.start,
                            outcome.batch.start + outcome.batch.rows,
                            outcome.status
                        );
                    }
                    std::process::exit(2);
                }
            }
            Ok(())
        }

        Commands::Transform {
            input,
            dataset: name,
            output,
        } => {
            let spec = dataset(&name)?;
            let raw = extract::extract_file(&input, spec)?;
            let transformed = transform::transform(&raw, spec)?;

            let output = output.unwrap_or_else(|| {
                let stem = input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("output");
                input.with_file_name(format!("{stem}_transformed.csv"))
            });
            extract::write_csv(&output, &transformed)?;
            println!(
                "Transformed {} rows into {}",
                transformed.len(),
                output.display()
            );
            Ok(())
        }

        Commands::Validate {
            input,
            dataset: name,
        } => {
            let spec = dataset(&name)?;
            let raw = extract::extract_file(&input, spec)?;
            let transformed = transform::transform(&raw, spec)?;
            let report = validate::validate(&transformed, spec);
            print!("{report}");
            if !report.passed() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Load {
            input,
            dataset: name,
            batch_size,
            max_retries,
            concurrency,
        } => {
            let spec = dataset(&name)?;
            let config = load_config(batch_size, max_retries, concurrency)?;
            let writer = RestWriter::new(&config);
            verify_target_table(&writer, &spec.table).await;
            let options = RunOptions::default();

            let summary = pipeline::run(&input, spec, &config, writer, &options).await?;
            if let Some(load) = summary.load {
                println!("{}", load.summary());
                if !load.is_success() {
                    std::process::exit(2);
                }
            }
            Ok(())
        }

        Commands::Analyze {
            input,
            dataset: name,
            out_dir,
        } => {
            let spec = dataset(&name)?;
            let raw = extract::extract_file(&input, spec)?;
            let transformed = transform::transform(&raw, spec)?;
            pipeline::write_reports(&out_dir, &transformed, spec)?;
            let summary = analyze::summarize(&transformed, spec);
            println!("Wrote {} metrics to {}", summary.len(), out_dir.display());
            Ok(())
        }

        Commands::Schema { dataset: name } => {
            let spec = dataset(&name)?;
            println!("-- Run once in the store's SQL console:");
            println!("{}", spec.create_table_sql());
            Ok(())
        }
    }
}
