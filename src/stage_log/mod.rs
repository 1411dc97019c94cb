//! Append-only Markdown project log.
//!
//! Each pipeline stage has a reporting routine (see [`stages`]) that inspects
//! the stage's artifacts and produces one [`LogEntry`]. Entries are appended to
//! the configured log file as:
//!
//! ```text
//!
//! ---
//!
//! ## 2025-01-31 14:02:11 — Raw Data Summary
//!
//! <body>
//! ```
//!
//! The file is opened in append mode for each write and never truncated, so
//! earlier entries stay byte-identical. A single writer is assumed.

pub mod stages;

use crate::config::PipelineConfig;
use crate::error::{AppResult, PrepError};
use chrono::Local;
use clap::ValueEnum;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Timestamp format of entry headings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A pipeline stage the logger can report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum StageName {
    /// Raw WFDB records
    #[value(name = "raw")]
    Raw,
    /// Converted `.mat` records
    #[value(name = "mat")]
    Mat,
    /// Train/test split
    #[value(name = "split")]
    Split,
    /// R-peak segmentation
    #[value(name = "segment")]
    Segment,
    /// Training-set augmentation
    #[value(name = "augment")]
    Augment,
    /// NaN-ratio cleaning
    #[value(name = "clean")]
    Clean,
    /// Scalogram generation
    #[value(name = "scalogram")]
    Scalogram,
    /// Manual inspection of segments
    #[value(name = "visualize")]
    Visualize,
    /// Manual inspection of scalograms
    #[value(name = "scalogram_viz")]
    ScalogramViz,
    /// raw, mat, split and segment in order
    #[value(name = "all")]
    All,
}

impl StageName {
    /// Stages run by [`StageName::All`].
    pub const CORE: [StageName; 4] = [
        StageName::Raw,
        StageName::Mat,
        StageName::Split,
        StageName::Segment,
    ];

    /// Command-line name.
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Raw => "raw",
            StageName::Mat => "mat",
            StageName::Split => "split",
            StageName::Segment => "segment",
            StageName::Augment => "augment",
            StageName::Clean => "clean",
            StageName::Scalogram => "scalogram",
            StageName::Visualize => "visualize",
            StageName::ScalogramViz => "scalogram_viz",
            StageName::All => "all",
        }
    }

    /// Single stages this name expands to.
    pub fn expand(self) -> Vec<StageName> {
        match self {
            StageName::All => Self::CORE.to_vec(),
            stage => vec![stage],
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <StageName as ValueEnum>::from_str(s, false)
            .map_err(|_| PrepError::UnknownStage(s.to_string()))
    }
}

/// One timestamped block of the project log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Formatted local time.
    pub timestamp: String,
    /// Heading text after the timestamp.
    pub title: String,
    /// Markdown body, newline-terminated.
    pub body: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current local time.
    pub fn now(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// Markdown text appended to the log.
    pub fn render(&self) -> String {
        format!(
            "\n---\n\n## {} — {}\n\n{}",
            self.timestamp, self.title, self.body
        )
    }
}

/// Appends `entry` to `log_file`, creating the file (and its parent
/// directory) if needed.
pub fn append(log_file: &Path, entry: &LogEntry) -> AppResult<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    file.write_all(entry.render().as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Builds the entry for a single stage.
pub fn entry_for(config: &PipelineConfig, stage: StageName) -> AppResult<Vec<LogEntry>> {
    let entry = match stage {
        StageName::Raw => stages::raw(config)?,
        StageName::Mat => stages::mat(config)?,
        StageName::Split => stages::split(config)?,
        StageName::Segment => stages::segment(config)?,
        StageName::Augment => stages::augment(config)?,
        StageName::Clean => stages::clean(config)?,
        StageName::Scalogram => stages::scalogram(config)?,
        StageName::Visualize => stages::visualize(config),
        StageName::ScalogramViz => stages::scalogram_viz(config),
        StageName::All => {
            let mut entries = Vec::new();
            for single in stage.expand() {
                entries.extend(entry_for(config, single)?);
            }
            return Ok(entries);
        }
    };
    Ok(vec![entry])
}

/// Reports on `stage` and appends the result to the configured log file.
///
/// Every entry is built before anything is written: a stage whose inputs are
/// missing leaves the log untouched.
pub fn run_stage(config: &PipelineConfig, stage: StageName) -> AppResult<Vec<LogEntry>> {
    let entries = entry_for(config, stage)?;
    for entry in &entries {
        append(&config.paths.log_file, entry)?;
        info!(title = %entry.title, log = %config.paths.log_file.display(), "Log entry appended");
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> LogEntry {
        LogEntry {
            timestamp: "2025-01-31 14:02:11".to_string(),
            title: title.to_string(),
            body: "- Item: 1\n".to_string(),
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(
            entry("Raw Data Summary").render(),
            "\n---\n\n## 2025-01-31 14:02:11 — Raw Data Summary\n\n- Item: 1\n"
        );
    }

    #[test]
    fn test_timestamp_format() {
        let stamped = LogEntry::now("t", "");
        assert!(chrono::NaiveDateTime::parse_from_str(&stamped.timestamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_append_preserves_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("PROJECT_LOG.md");

        append(&log, &entry("First")).unwrap();
        let before = std::fs::read_to_string(&log).unwrap();
        append(&log, &entry("Second")).unwrap();
        let after = std::fs::read_to_string(&log).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(&after[before.len()..], entry("Second").render());
        assert_eq!(after.matches("\n---\n\n## ").count(), 2);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!("scalogram_viz".parse::<StageName>().unwrap(), StageName::ScalogramViz);
        assert_eq!("raw".parse::<StageName>().unwrap(), StageName::Raw);
        assert!(matches!(
            "bogus".parse::<StageName>(),
            Err(PrepError::UnknownStage(name)) if name == "bogus"
        ));
        for stage in StageName::value_variants() {
            assert_eq!(stage.as_str().parse::<StageName>().unwrap(), *stage);
        }
        assert_eq!(StageName::All.expand(), StageName::CORE.to_vec());
    }

    #[test]
    fn test_failed_stage_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.raw_dir = dir.path().join("missing");
        config.paths.log_file = dir.path().join("PROJECT_LOG.md");

        let err = run_stage(&config, StageName::Raw).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_MISSING_INPUT);
        assert!(!config.paths.log_file.exists());
    }
}
