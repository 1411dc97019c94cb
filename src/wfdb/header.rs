//! WFDB header (`.hea`) parsing.
//!
//! A header is a record line followed by one line per signal:
//!
//! ```text
//! a0001 2 2000 71332
//! a0001.wav 16+44 1 16 0 0 0 0 PCG
//! a0001.dat 16 1000/mV 16 0 -7 6474 0 ECG
//! ```
//!
//! Only single-segment records with one sample per frame are accepted.

use crate::error::{AppResult, PrepError};
use std::path::Path;

/// Sampling frequency assumed when the record line omits it.
pub const DEFAULT_FS: f64 = 250.0;
/// ADC gain assumed when a signal line omits it or gives zero.
pub const DEFAULT_GAIN: f64 = 200.0;

/// Parsed record line plus signal specifications.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Record name from the record line.
    pub record_name: String,
    /// Sampling frequency in Hz.
    pub fs: f64,
    /// Samples per signal, when the header states it.
    pub num_samples: Option<usize>,
    /// One entry per signal, in header order.
    pub signals: Vec<SignalSpec>,
}

/// One signal line.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    /// Signal file name, relative to the header's directory.
    pub file_name: String,
    /// Storage format code (16, 212, ...).
    pub format: u16,
    /// Byte offset of the first sample in the file.
    pub byte_offset: u64,
    /// ADC units per physical unit.
    pub gain: f64,
    /// ADC value corresponding to zero physical units.
    pub baseline: i32,
    /// Physical units, `mV` when unstated.
    pub units: String,
    /// Signal description, used as the channel label.
    pub description: String,
}

impl Header {
    /// Reads and parses `<path>`; the record name for error messages comes
    /// from the file stem.
    pub fn read(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&stem, &text)
    }

    /// Parses header text.
    pub fn parse(record: &str, text: &str) -> AppResult<Self> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let record_line = lines
            .next()
            .ok_or_else(|| PrepError::header(record, "empty header"))?;
        let mut fields = record_line.split_whitespace();

        let record_name = fields.next().unwrap_or_default();
        if record_name.contains('/') {
            return Err(PrepError::header(
                record,
                "multi-segment records are not supported",
            ));
        }

        let nsig: usize = fields
            .next()
            .ok_or_else(|| PrepError::header(record, "record line has no signal count"))?
            .parse()
            .map_err(|_| PrepError::header(record, "invalid signal count"))?;

        let fs = match fields.next() {
            Some(field) => parse_frequency(field)
                .ok_or_else(|| PrepError::header(record, format!("invalid frequency '{field}'")))?,
            None => DEFAULT_FS,
        };

        let num_samples = match fields.next() {
            Some(field) => Some(
                field
                    .parse::<usize>()
                    .map_err(|_| PrepError::header(record, format!("invalid sample count '{field}'")))?,
            ),
            None => None,
        };

        let signals = lines
            .take(nsig)
            .map(|line| parse_signal_line(record, line))
            .collect::<AppResult<Vec<_>>>()?;

        if signals.len() != nsig {
            return Err(PrepError::header(
                record,
                format!("expected {} signal lines, found {}", nsig, signals.len()),
            ));
        }

        Ok(Self {
            record_name: record_name.to_string(),
            fs,
            num_samples: num_samples.filter(|&n| n > 0),
            signals,
        })
    }

    /// Channel labels in header order.
    pub fn channel_names(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.description.clone()).collect()
    }

    /// Whether a channel with this label exists.
    pub fn has_channel(&self, name: &str) -> bool {
        self.signals.iter().any(|s| s.description == name)
    }
}

/// `fs[/counterfreq][(basecounter)]`
fn parse_frequency(field: &str) -> Option<f64> {
    let end = field.find(['/', '(']).unwrap_or(field.len());
    field[..end].parse::<f64>().ok().filter(|fs| *fs > 0.0)
}

fn parse_signal_line(record: &str, line: &str) -> AppResult<SignalSpec> {
    let mut fields = line.split_whitespace();
    let file_name = fields
        .next()
        .ok_or_else(|| PrepError::header(record, "empty signal line"))?
        .to_string();
    let format_field = fields
        .next()
        .ok_or_else(|| PrepError::header(record, format!("signal '{file_name}' has no format")))?;
    let (format, byte_offset) = parse_format(record, format_field)?;

    let (gain, baseline, units) = match fields.next() {
        Some(field) => parse_gain(record, field)?,
        None => (DEFAULT_GAIN, None, "mV".to_string()),
    };

    let _adc_resolution = fields.next();
    let adc_zero: i32 = match fields.next() {
        Some(field) => field
            .parse()
            .map_err(|_| PrepError::header(record, format!("invalid ADC zero '{field}'")))?,
        None => 0,
    };
    let _initial_value = fields.next();
    let _checksum = fields.next();
    let _block_size = fields.next();
    let description = fields.collect::<Vec<_>>().join(" ");

    Ok(SignalSpec {
        file_name,
        format,
        byte_offset,
        gain,
        baseline: baseline.unwrap_or(adc_zero),
        units,
        description,
    })
}

/// `fmt[xspf][:skew][+offset]`
fn parse_format(record: &str, field: &str) -> AppResult<(u16, u64)> {
    let invalid = || PrepError::header(record, format!("invalid format '{field}'"));

    let (spec, offset) = match field.split_once('+') {
        Some((spec, offset)) => (spec, offset.parse::<u64>().map_err(|_| invalid())?),
        None => (field, 0),
    };
    let spec = spec.split(':').next().unwrap_or(spec);
    let (format, spf) = match spec.split_once('x') {
        Some((format, spf)) => (format, spf.parse::<u32>().map_err(|_| invalid())?),
        None => (spec, 1),
    };
    if spf != 1 {
        return Err(PrepError::header(
            record,
            format!("{spf} samples per frame is not supported"),
        ));
    }
    let format = format.parse::<u16>().map_err(|_| invalid())?;
    Ok((format, offset))
}

/// `gain[(baseline)][/units]`
fn parse_gain(record: &str, field: &str) -> AppResult<(f64, Option<i32>, String)> {
    let invalid = || PrepError::header(record, format!("invalid gain '{field}'"));

    let (value, units) = match field.split_once('/') {
        Some((value, units)) => (value, units.to_string()),
        None => (field, "mV".to_string()),
    };
    let (gain, baseline) = match value.split_once('(') {
        Some((gain, rest)) => {
            let baseline = rest
                .strip_suffix(')')
                .ok_or_else(invalid)?
                .parse::<i32>()
                .map_err(|_| invalid())?;
            (gain, Some(baseline))
        }
        None => (value, None),
    };
    let gain = gain.parse::<f64>().map_err(|_| invalid())?;
    let gain = if gain == 0.0 { DEFAULT_GAIN } else { gain };
    Ok((gain, baseline, units))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAINING_A: &str = "a0001 2 2000 71332\n\
        a0001.wav 16+44 1 16 0 0 0 0 PCG\n\
        a0001.dat 16 1000/mV 16 0 -7 6474 0 ECG\n";

    #[test]
    fn test_parse_training_header() {
        let header = Header::parse("a0001", TRAINING_A).unwrap();
        assert_eq!(header.record_name, "a0001");
        assert_eq!(header.fs, 2000.0);
        assert_eq!(header.num_samples, Some(71332));
        assert_eq!(header.channel_names(), vec!["PCG", "ECG"]);

        let pcg = &header.signals[0];
        assert_eq!(pcg.format, 16);
        assert_eq!(pcg.byte_offset, 44);
        assert_eq!(pcg.gain, 1.0);

        let ecg = &header.signals[1];
        assert_eq!(ecg.gain, 1000.0);
        assert_eq!(ecg.units, "mV");
        assert_eq!(ecg.baseline, 0);
    }

    #[test]
    fn test_defaults_and_baseline() {
        let text = "# comment\nrec 1\nrec.dat 212 0(12)/uV 12 5 0 0 0 Lead II\n";
        let header = Header::parse("rec", text).unwrap();
        assert_eq!(header.fs, DEFAULT_FS);
        assert_eq!(header.num_samples, None);
        let spec = &header.signals[0];
        assert_eq!(spec.gain, DEFAULT_GAIN);
        assert_eq!(spec.baseline, 12);
        assert_eq!(spec.units, "uV");
        assert_eq!(spec.description, "Lead II");
    }

    #[test]
    fn test_minimal_signal_line() {
        let header = Header::parse("r", "r 1 500\nr.dat 80\n").unwrap();
        assert_eq!(header.signals[0].gain, DEFAULT_GAIN);
        assert_eq!(header.signals[0].baseline, 0);
        assert_eq!(header.signals[0].description, "");
    }

    #[test]
    fn test_rejects_truncated_header() {
        let err = Header::parse("a0002", "a0002 2 2000\na0002.dat 16 1 16 0 0 0 0 ECG\n")
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 signal lines"));
    }

    #[test]
    fn test_rejects_multi_segment_and_multi_frame() {
        assert!(Header::parse("m", "m/3 2 360\n").is_err());
        assert!(Header::parse("m", "m 1 360\nm.dat 16x2 200 16 0 0 0 0 ECG\n").is_err());
    }

    #[test]
    fn test_frequency_with_counter() {
        let header = Header::parse("c", "c 1 360/1(0) 100\nc.dat 16\n").unwrap();
        assert_eq!(header.fs, 360.0);
        assert_eq!(header.num_samples, Some(100));
    }
}
