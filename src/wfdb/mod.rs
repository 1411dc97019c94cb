//! Reader for PhysioNet WFDB records.
//!
//! Provides header parsing ([`Header`]) and signal decoding for the storage
//! formats used by PhysioNet heart-sound and ECG databases (16, 61, 80, 212,
//! 24, 32). Records are returned as [`RawRecord`](crate::record::RawRecord)s
//! in physical units.

pub mod header;
pub mod signal;

pub use header::{Header, SignalSpec};
pub use signal::{read_record, read_signals};

use crate::error::AppResult;
use std::path::Path;

/// Record ids of every `*.hea` file in `dir`, sorted.
pub fn list_records(dir: &Path) -> AppResult<Vec<String>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "hea") {
            if let Some(stem) = path.file_stem() {
                ids.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    ids.sort();
    Ok(ids)
}
