//! Appends a stage summary to the project log.
//!
//! ```text
//! cardio-log [--config config/pipeline.toml] <stage>
//! ```
//!
//! An unknown or missing stage prints usage to stdout and exits with code 2
//! without touching the log.

use anyhow::{Context, Result};
use cardio_prep::config::PipelineConfig;
use cardio_prep::error::{exit_code_for, EXIT_INVALID_STAGE};
use cardio_prep::stage_log::{run_stage, StageName};
use cardio_prep::tracing_init;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Append a pipeline stage summary to the project log")]
struct Cli {
    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stage to report on
    #[arg(value_enum)]
    stage: StageName,
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load_optional(cli.config.as_deref())
        .context("Failed to load configuration")?;
    tracing_init::init_from_config(&config)?;

    run_stage(&config, cli.stage)
        .with_context(|| format!("Stage '{}' could not be logged", cli.stage))?;

    let stages: Vec<&str> = cli.stage.expand().iter().map(|s| s.as_str()).collect();
    println!("✅ Project log updated ({})", stages.join(" → "));
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_INVALID_STAGE,
            };
            print!("{}", e.render());
            return ExitCode::from(code as u8);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}
