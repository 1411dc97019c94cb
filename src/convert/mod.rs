//! Record converter: raw WFDB (+ WAV) records to `.mat` containers.
//!
//! For each record found by a [`RecordSource`], the ECG and PCG channels are
//! selected, cast to `f32`, the PCG is peak-normalized, and the pair is written
//! to `<out_dir>/<id>.mat` together with the sampling rate(s) and the source
//! channel list.
//!
//! A record without both channels is skipped and counted; it never aborts the
//! run. A record that cannot be read at all (bad header, truncated signal file)
//! does abort it. Every header found therefore ends up either converted or
//! skipped.

pub mod sources;

pub use sources::{source_for, RecordSource, WfdbSource, WfdbWavSource};

use crate::config::{ConvertConfig, SilentSignalPolicy};
use crate::data::MatFile;
use crate::error::AppResult;
use crate::record::{CardiacRecord, RawRecord, SamplingRates};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Peak normalization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// No finite sample differs from zero.
    #[error("signal has no non-zero finite sample")]
    ZeroPeak,
}

/// Scales `samples` in place so that the largest finite absolute value is 1.0.
///
/// NaN samples are left as NaN and do not take part in the peak. Returns the
/// peak the samples were divided by.
pub fn normalize_peak(samples: &mut [f32]) -> Result<f32, NormalizationError> {
    let peak = samples
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f32, |peak, v| peak.max(v.abs()));
    if peak == 0.0 {
        return Err(NormalizationError::ZeroPeak);
    }
    samples.iter_mut().for_each(|s| *s /= peak);
    Ok(peak)
}

/// Why a record was not converted.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// A required channel is absent; holds the channels that were found.
    MissingChannel(Vec<String>),
    /// The PCG channel is silent and the policy is to skip.
    SilentPcg,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingChannel(channels) => write!(f, "channels = {channels:?}"),
            SkipReason::SilentPcg => f.write_str("PCG channel is all zeros"),
        }
    }
}

/// A record that was not converted.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// Record identifier.
    pub id: String,
    /// Why.
    pub reason: SkipReason,
}

/// Outcome of a conversion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    /// Ids written, in processing order.
    pub converted: Vec<String>,
    /// Ids skipped, in processing order.
    pub skipped: Vec<SkippedRecord>,
}

impl ConversionReport {
    /// Records seen (converted + skipped).
    pub fn total(&self) -> usize {
        self.converted.len() + self.skipped.len()
    }
}

/// Selects ECG and PCG from a raw record and normalizes the PCG.
pub fn extract(
    raw: &RawRecord,
    config: &ConvertConfig,
    independent_rates: bool,
) -> Result<CardiacRecord, SkipReason> {
    let (Some(ecg), Some(pcg)) = (raw.channel(&config.ecg_channel), raw.channel(&config.pcg_channel))
    else {
        return Err(SkipReason::MissingChannel(raw.channel_names()));
    };

    let ecg_samples: Vec<f32> = ecg.samples.iter().map(|&v| v as f32).collect();
    let mut pcg_samples: Vec<f32> = pcg.samples.iter().map(|&v| v as f32).collect();

    match normalize_peak(&mut pcg_samples) {
        Ok(peak) => debug!(record = %raw.id, peak, "PCG normalized"),
        Err(NormalizationError::ZeroPeak) => match config.silent_pcg {
            SilentSignalPolicy::Skip => return Err(SkipReason::SilentPcg),
            SilentSignalPolicy::Keep => {
                warn!(record = %raw.id, "PCG channel is all zeros, writing it unscaled")
            }
        },
    }

    let rates = if independent_rates {
        SamplingRates::Independent {
            ecg: ecg.fs,
            pcg: pcg.fs,
        }
    } else {
        SamplingRates::Shared(ecg.fs)
    };

    Ok(CardiacRecord {
        id: raw.id.clone(),
        ecg: ecg_samples,
        pcg: pcg_samples,
        rates,
        channel_names: raw.channel_names(),
    })
}

/// MAT layout of a converted record.
pub fn to_mat(record: &CardiacRecord) -> MatFile {
    let file = MatFile::new()
        .with_single_row("ecg", &record.ecg)
        .with_single_row("pcg", &record.pcg);
    let file = match record.rates {
        SamplingRates::Shared(fs) => file.with_double_scalar("fs", fs),
        SamplingRates::Independent { ecg, pcg } => file
            .with_double_scalar("fs_ecg", ecg)
            .with_double_scalar("fs_pcg", pcg),
    };
    file.with_char_rows("channels", &record.channel_names)
}

/// Converts every record of `source` into `out_dir`.
pub fn convert_all(
    source: &dyn RecordSource,
    config: &ConvertConfig,
    out_dir: &Path,
) -> AppResult<ConversionReport> {
    crate::error::require_exists(source.dir())?;
    std::fs::create_dir_all(out_dir)?;

    let mut report = ConversionReport::default();
    for id in source.record_ids()? {
        let raw = source.load(&id)?;
        match extract(&raw, config, source.independent_rates()) {
            Ok(record) => {
                to_mat(&record).write(&out_dir.join(format!("{id}.mat")), config.compress)?;
                debug!(record = %id, samples = record.ecg.len(), "Converted");
                report.converted.push(id);
            }
            Err(reason) => {
                warn!("Skipping {}: {}", id, reason);
                report.skipped.push(SkippedRecord { id, reason });
            }
        }
    }

    info!(
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        "Conversion finished"
    );
    Ok(report)
}
