//! Data preparation for an ECG+PCG cardiac classification pipeline.
//!
//! The crate backs three command-line tools that run one after another over a
//! directory tree:
//!
//! - `cardio-convert` reads raw WFDB records ([`wfdb`], optionally a WAV file
//!   through [`audio`]) and writes one MATLAB `.mat` container per record
//!   ([`convert`], [`data::mat`]).
//! - `cardio-split` partitions the record label table into stratified
//!   train/test sets and copies the matching `.mat` files ([`split`]).
//! - `cardio-log` appends a timestamped Markdown summary of a pipeline stage to
//!   the project log ([`stage_log`]).
//!
//! Paths, seeds and reporting constants come from [`config`]; all fallible
//! operations return [`error::AppResult`].

pub mod audio;
pub mod config;
pub mod convert;
pub mod data;
pub mod error;
pub mod record;
pub mod split;
pub mod stage_log;
pub mod tracing_init;
pub mod wfdb;

pub use config::PipelineConfig;
pub use error::{AppResult, PrepError};
