//! Input adapters for the record converter.
//!
//! Both adapters enumerate records by their WFDB header files; they differ in
//! where the PCG channel comes from.

use crate::audio;
use crate::config::{ConvertConfig, InputAdapter};
use crate::error::AppResult;
use crate::record::{Channel, RawRecord};
use crate::wfdb::{self, Header};
use std::path::{Path, PathBuf};

/// A directory of raw records.
pub trait RecordSource {
    /// Ids of every record found (one per `*.hea` file), sorted.
    fn record_ids(&self) -> AppResult<Vec<String>>;

    /// Loads a record. Channels that the source cannot find are absent from
    /// the result rather than reported as errors.
    fn load(&self, id: &str) -> AppResult<RawRecord>;

    /// Whether ECG and PCG carry independent sampling rates.
    fn independent_rates(&self) -> bool {
        false
    }

    /// Directory the records are read from.
    fn dir(&self) -> &Path;
}

/// Both channels from the (multiplexed) WFDB record.
#[derive(Debug, Clone)]
pub struct WfdbSource {
    dir: PathBuf,
}

impl WfdbSource {
    /// Reads records from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RecordSource for WfdbSource {
    fn record_ids(&self) -> AppResult<Vec<String>> {
        wfdb::list_records(&self.dir)
    }

    fn load(&self, id: &str) -> AppResult<RawRecord> {
        wfdb::read_record(&self.dir, id)
    }

    fn dir(&self) -> &Path {
        &self.dir
    }
}

/// ECG from the WFDB record, PCG from a sibling `<id>.wav`.
#[derive(Debug, Clone)]
pub struct WfdbWavSource {
    dir: PathBuf,
    pcg_channel: String,
}

impl WfdbWavSource {
    /// Reads records from `dir`; the WAV contents are labelled `pcg_channel`.
    pub fn new(dir: impl Into<PathBuf>, pcg_channel: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pcg_channel: pcg_channel.into(),
        }
    }
}

impl RecordSource for WfdbWavSource {
    fn record_ids(&self) -> AppResult<Vec<String>> {
        wfdb::list_records(&self.dir)
    }

    fn load(&self, id: &str) -> AppResult<RawRecord> {
        let mut header = Header::read(&self.dir.join(format!("{id}.hea")))?;
        // The header may also describe the WAV payload as a WFDB signal; the
        // audio container is authoritative for that channel.
        header.signals.retain(|s| s.description != self.pcg_channel);
        let mut record = wfdb::read_signals(&self.dir, id, &header)?;

        let wav_path = self.dir.join(format!("{id}.wav"));
        if wav_path.exists() {
            let audio = audio::read_wav(&wav_path)?;
            record.channels.push(Channel {
                name: self.pcg_channel.clone(),
                fs: f64::from(audio.sample_rate),
                samples: audio.samples,
            });
        } else {
            tracing::debug!(record = id, "No WAV file next to the header");
        }
        Ok(record)
    }

    fn independent_rates(&self) -> bool {
        true
    }

    fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Builds the adapter selected in the configuration.
pub fn source_for(config: &ConvertConfig, dir: &Path) -> Box<dyn RecordSource> {
    match config.adapter {
        InputAdapter::Multiplexed => Box::new(WfdbSource::new(dir)),
        InputAdapter::Wav => Box::new(WfdbWavSource::new(dir, config.pcg_channel.clone())),
    }
}
