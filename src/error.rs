//! Custom error types for the preparation tools.
//!
//! This module defines the primary error type, `PrepError`, shared by the
//! converter, the splitter and the stage logger. Using the `thiserror` crate, it
//! provides a centralized and consistent way to handle the failures that abort
//! an invocation.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically TOML syntax or type
//!   mismatches in the configuration file or environment overrides.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine
//!   (e.g. a test fraction of `1.5`).
//! - **`Io`**, **`Csv`**, **`Wav`**: Wrapped errors from the underlying readers.
//! - **`Header`** / **`SignalFormat`**: Malformed or unsupported WFDB input.
//! - **`Matrw`** / **`Mat`**: The MAT container could not be written or read,
//!   either inside `matrw` or because its contents are not what a converted
//!   record holds.
//! - **`Split`**: The label table does not satisfy the stratification
//!   preconditions.
//! - **`MissingInput`**: A required input file or directory does not exist.
//! - **`UnknownStage`**: The stage logger was asked for a stage it does not know.
//!
//! Recoverable conditions (a record without a PCG channel, a `.mat` file that is
//! missing during a copy) are *not* errors: they are counted and reported by the
//! component that meets them.
//!
//! `PrepError::exit_code` maps an error onto the process exit code used by the
//! binaries, so that scripts driving the pipeline can tell an invalid stage
//! name apart from a missing input file.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, PrepError>;

/// Exit code for an unrecognized stage name or bad command line.
pub const EXIT_INVALID_STAGE: i32 = 2;
/// Exit code for a required input file or directory that does not exist.
pub const EXIT_MISSING_INPUT: i32 = 3;
/// Exit code for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Top-level error for the preparation pipeline.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but holds an invalid value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// WAV decode failure.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Malformed WFDB header.
    #[error("Header error in {record}: {message}")]
    Header {
        /// Record (or file) the header belongs to.
        record: String,
        /// What was wrong with it.
        message: String,
    },

    /// WFDB storage format this reader does not decode.
    #[error("Unsupported signal format {0}")]
    SignalFormat(String),

    /// Failure inside the MAT-file library.
    #[error("MAT file error: {0}")]
    Matrw(#[from] matrw::MatrwError),

    /// MAT container contents are malformed or cannot be represented.
    #[error("MAT file error: {0}")]
    Mat(String),

    /// Label table contents are invalid.
    #[error("Label table error: {0}")]
    Labels(String),

    /// Stratified split preconditions not met.
    #[error("Split error: {0}")]
    Split(String),

    /// Peak normalization was impossible.
    #[error("Normalization error: {0}")]
    Normalization(#[from] crate::convert::NormalizationError),

    /// A required input path does not exist.
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// Stage name not in the known set.
    #[error("Unknown stage '{0}'")]
    UnknownStage(String),
}

impl From<figment::Error> for PrepError {
    fn from(err: figment::Error) -> Self {
        PrepError::Config(Box::new(err))
    }
}

impl PrepError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PrepError::UnknownStage(_) => EXIT_INVALID_STAGE,
            PrepError::MissingInput(_) => EXIT_MISSING_INPUT,
            _ => EXIT_FAILURE,
        }
    }

    pub(crate) fn header(record: impl Into<String>, message: impl Into<String>) -> Self {
        PrepError::Header {
            record: record.into(),
            message: message.into(),
        }
    }
}

/// Exit code for an `anyhow` error coming out of a binary's `run` function.
///
/// Errors that are not (or do not wrap) a `PrepError` map to `EXIT_FAILURE`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PrepError>())
        .map_or(EXIT_FAILURE, PrepError::exit_code)
}

/// Fails with `MissingInput` when `path` does not exist.
pub fn require_exists(path: &std::path::Path) -> AppResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PrepError::MissingInput(path.to_path_buf()))
    }
}
