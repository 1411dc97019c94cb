//! Stratified train/test split of the converted records.
//!
//! ```text
//! cardio-split [--config config/pipeline.toml] [--seed N] [--test-fraction F]
//! ```

use anyhow::{Context, Result};
use cardio_prep::config::PipelineConfig;
use cardio_prep::error::exit_code_for;
use cardio_prep::split::{run_split, summary};
use cardio_prep::tracing_init;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Split labelled records into stratified train/test sets")]
struct Cli {
    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shuffle seed (overrides split.seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of records in the test set (overrides split.test_fraction)
    #[arg(long)]
    test_fraction: Option<f64>,
}

fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::load_optional(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(seed) = cli.seed {
        config.split.seed = seed;
    }
    if let Some(fraction) = cli.test_fraction {
        config.split.test_fraction = fraction;
    }
    config.validate()?;
    tracing_init::init_from_config(&config)?;

    let outcome = run_split(&config).context("Split failed")?;
    print!("{}", summary(&outcome.split, config.split.test_fraction));

    let missing = outcome.train_copy.missing.len() + outcome.test_copy.missing.len();
    if missing > 0 {
        println!("{missing} file(s) listed in the label table were not found");
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}
