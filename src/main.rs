//! `immoprix` command line: clean DVF exports, train, estimate.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use immoprix::config::AppConfig;
use immoprix::dataset::{write_cleaned, PropertyType};
use immoprix::inference::Estimator;
use immoprix::logging::init_tracing;
use immoprix::presentation::{validate_form, EstimateReport, FormInput};
use immoprix::trainer::{Trainer, TrainingOutcome};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "immoprix")]
#[command(version)]
#[command(about = "French property price estimation", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Filter a raw DVF export and append corrected postal codes
    Clean {
        /// Raw export (default: paths.raw_data)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Cleaned output (default: paths.data)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Train a model and save it when it passes the quality gate
    Train {
        /// Cleaned transactions (default: paths.data)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Bundle directory (default: paths.model_dir)
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },
    /// Estimate the price of a property
    Estimate {
        /// 5-digit postal code
        #[arg(long)]
        postal_code: String,
        /// Living surface in m²
        #[arg(long)]
        surface: f64,
        /// Number of main rooms
        #[arg(long, default_value_t = 3)]
        rooms: u32,
        /// Plot surface in m²
        #[arg(long, default_value_t = 0.0)]
        plot: f64,
        /// apartment, house, commercial or outbuilding
        #[arg(long = "type", default_value = "apartment")]
        property_type: PropertyType,
        /// Sale year
        #[arg(long, default_value_t = 2024)]
        year: i32,
        /// Bundle directory (default: paths.model_dir)
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Clean { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.raw_data.clone());
            let output = output.unwrap_or_else(|| config.paths.data.clone());
            let source = File::open(&input)
                .with_context(|| format!("opening {}", input.display()))?;
            let sink = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let report = write_cleaned(
                BufReader::new(source),
                BufWriter::new(sink),
                &config.ingest,
                config.cleaning.top_codes,
            )?;
            info!(
                output = %output.display(),
                rows = report.rows_read,
                "cleaned file written"
            );
        }
        Command::Train { data, model_dir } => {
            let data = data.unwrap_or_else(|| config.paths.data.clone());
            let model_dir = model_dir.unwrap_or_else(|| config.paths.model_dir.clone());
            let trainer = Trainer::new(config.training.clone())
                .with_ingest(config.ingest.clone())
                .with_cleaning(config.cleaning.clone());
            let outcome = trainer
                .run(&data, &model_dir)
                .with_context(|| format!("training on {}", data.display()))?;
            let metrics = outcome.metrics();
            println!(
                "R² train {:.3}, test {:.3}, MAE test {:.0} € ({})",
                metrics.r2_train,
                metrics.r2_test,
                metrics.mae_test,
                metrics.verdict()
            );
            match outcome {
                TrainingOutcome::Saved { dir, .. } => println!("model saved to {}", dir.display()),
                TrainingOutcome::Rejected { .. } => {
                    bail!("model rejected: test R² at or below {}", config.training.min_test_r2)
                }
            }
        }
        Command::Estimate {
            postal_code,
            surface,
            rooms,
            plot,
            property_type,
            year,
            model_dir,
        } => {
            let form = FormInput {
                postal_code,
                surface,
                rooms,
                plot,
                property_type,
                year,
            };
            let errors: Vec<String> = validate_form(&form)
                .into_iter()
                .filter(|issue| issue.is_error())
                .map(|issue| issue.to_string())
                .collect();
            if !errors.is_empty() {
                bail!("invalid input: {}", errors.join("; "));
            }

            let model_dir = model_dir.unwrap_or_else(|| config.paths.model_dir.clone());
            let estimator = Estimator::load(&model_dir)
                .with_context(|| format!("loading model from {}", model_dir.display()))?;
            let report = EstimateReport::build(&estimator, &form)?;
            println!("{report}");
        }
    }
    Ok(())
}
