//! Record converter: raw WFDB records to `.mat` containers.
//!
//! ```text
//! cardio-convert [--config config/pipeline.toml] [--input DIR] [--output DIR]
//! ```

use anyhow::{Context, Result};
use cardio_prep::config::PipelineConfig;
use cardio_prep::convert::{convert_all, source_for};
use cardio_prep::error::exit_code_for;
use cardio_prep::tracing_init;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert raw ECG+PCG records to MATLAB .mat files")]
struct Cli {
    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raw record directory (overrides paths.raw_dir)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory (overrides paths.mat_dir)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::load_optional(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(input) = cli.input {
        config.paths.raw_dir = input;
    }
    if let Some(output) = cli.output {
        config.paths.mat_dir = output;
    }
    tracing_init::init_from_config(&config)?;

    let source = source_for(&config.convert, &config.paths.raw_dir);
    let report = convert_all(source.as_ref(), &config.convert, &config.paths.mat_dir)
        .with_context(|| format!("Conversion of {} failed", config.paths.raw_dir.display()))?;

    println!("Conversion finished");
    println!(
        "Skipped {} records without {}+{}",
        report.skipped.len(),
        config.convert.ecg_channel,
        config.convert.pcg_channel
    );
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
