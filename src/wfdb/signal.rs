//! Sample decoding for WFDB signal files.
//!
//! Signals that share a file are stored frame-interleaved: the file holds one
//! sample of each of its signals per frame, in header order. Decoding turns the
//! raw bytes into one stream of ADC values, which is then split per signal.

use super::header::{Header, SignalSpec};
use crate::error::{AppResult, PrepError};
use crate::record::{Channel, RawRecord};
use std::collections::HashMap;
use std::path::Path;

/// ADC values as decoded from disk; `None` marks the format's invalid-sample code.
pub type AdcStream = Vec<Option<i32>>;

/// Decodes a byte buffer in the given WFDB storage format.
pub fn decode(format: u16, bytes: &[u8]) -> AppResult<AdcStream> {
    let stream = match format {
        16 => bytes
            .chunks_exact(2)
            .map(|b| valid(i16::from_le_bytes([b[0], b[1]]) as i32, i16::MIN as i32))
            .collect(),
        61 => bytes
            .chunks_exact(2)
            .map(|b| valid(i16::from_be_bytes([b[0], b[1]]) as i32, i16::MIN as i32))
            .collect(),
        80 => bytes
            .iter()
            .map(|&b| valid(b as i32 - 128, -128))
            .collect(),
        24 => bytes
            .chunks_exact(3)
            .map(|b| {
                let raw = i32::from_le_bytes([b[0], b[1], b[2], 0]);
                valid(sign_extend(raw, 24), -(1 << 23))
            })
            .collect(),
        32 => bytes
            .chunks_exact(4)
            .map(|b| valid(i32::from_le_bytes([b[0], b[1], b[2], b[3]]), i32::MIN))
            .collect(),
        212 => decode_212(bytes),
        other => return Err(PrepError::SignalFormat(other.to_string())),
    };
    Ok(stream)
}

/// Format 212: pairs of 12-bit samples packed into three bytes.
fn decode_212(bytes: &[u8]) -> AdcStream {
    let mut out = Vec::with_capacity(bytes.len() * 2 / 3 + 1);
    for chunk in bytes.chunks(3) {
        match *chunk {
            [b0, b1, b2] => {
                let s0 = b0 as i32 | ((b1 as i32 & 0x0F) << 8);
                let s1 = b2 as i32 | ((b1 as i32 & 0xF0) << 4);
                out.push(valid(sign_extend(s0, 12), -2048));
                out.push(valid(sign_extend(s1, 12), -2048));
            }
            [b0, b1] => {
                let s0 = b0 as i32 | ((b1 as i32 & 0x0F) << 8);
                out.push(valid(sign_extend(s0, 12), -2048));
            }
            _ => {}
        }
    }
    out
}

fn sign_extend(value: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

fn valid(value: i32, invalid_code: i32) -> Option<i32> {
    (value != invalid_code).then_some(value)
}

/// Converts an ADC value to physical units.
pub fn to_physical(adc: Option<i32>, spec: &SignalSpec) -> f64 {
    match adc {
        Some(v) => (f64::from(v) - f64::from(spec.baseline)) / spec.gain,
        None => f64::NAN,
    }
}

/// Reads `<dir>/<id>.hea` and every signal file it references.
pub fn read_record(dir: &Path, id: &str) -> AppResult<RawRecord> {
    let header = Header::read(&dir.join(format!("{id}.hea")))?;
    read_signals(dir, id, &header)
}

/// Reads the signal files described by an already parsed header.
pub fn read_signals(dir: &Path, id: &str, header: &Header) -> AppResult<RawRecord> {
    // Group signal indices by file, preserving header order within each file.
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    let mut group_of: HashMap<&str, usize> = HashMap::new();
    for (idx, spec) in header.signals.iter().enumerate() {
        let slot = *group_of.entry(spec.file_name.as_str()).or_insert_with(|| {
            groups.push((spec.file_name.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(idx);
    }

    let mut channels: Vec<Option<Channel>> = vec![None; header.signals.len()];
    for (file_name, members) in groups {
        let first = &header.signals[members[0]];
        if members
            .iter()
            .any(|&i| header.signals[i].format != first.format)
        {
            return Err(PrepError::header(
                id,
                format!("signals in '{file_name}' use different formats"),
            ));
        }

        let bytes = std::fs::read(dir.join(file_name))?;
        let start = usize::try_from(first.byte_offset).unwrap_or(usize::MAX);
        let payload = bytes.get(start..).ok_or_else(|| {
            PrepError::header(
                id,
                format!(
                    "'{file_name}' is shorter than its byte offset {}",
                    first.byte_offset
                ),
            )
        })?;
        let stream = decode(first.format, payload)?;

        let width = members.len();
        let mut frames = stream.len() / width;
        if let Some(n) = header.num_samples {
            if n > frames {
                return Err(PrepError::header(
                    id,
                    format!("'{file_name}' holds {frames} samples, header declares {n}"),
                ));
            }
            frames = n;
        }

        for (column, &sig_idx) in members.iter().enumerate() {
            let spec = &header.signals[sig_idx];
            let samples = (0..frames)
                .map(|frame| to_physical(stream[frame * width + column], spec))
                .collect();
            channels[sig_idx] = Some(Channel {
                name: spec.description.clone(),
                fs: header.fs,
                samples,
            });
        }
    }

    Ok(RawRecord {
        id: id.to_string(),
        channels: channels.into_iter().flatten().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(gain: f64, baseline: i32) -> SignalSpec {
        SignalSpec {
            file_name: "x.dat".into(),
            format: 16,
            byte_offset: 0,
            gain,
            baseline,
            units: "mV".into(),
            description: "ECG".into(),
        }
    }

    #[test]
    fn test_decode_format_16_and_61() {
        let le = [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80];
        assert_eq!(decode(16, &le).unwrap(), vec![Some(1), Some(-1), None]);
        let be = [0x00, 0x01, 0xFF, 0xFE];
        assert_eq!(decode(61, &be).unwrap(), vec![Some(1), Some(-2)]);
    }

    #[test]
    fn test_decode_format_212() {
        // 0x123 and -1 (0xFFF)
        let bytes = [0x23, 0xF1, 0xFF];
        assert_eq!(decode(212, &bytes).unwrap(), vec![Some(0x123), Some(-1)]);
        // invalid code 0x800 in the first slot
        let bytes = [0x00, 0x08, 0x05];
        assert_eq!(decode(212, &bytes).unwrap(), vec![None, Some(5)]);
    }

    #[test]
    fn test_decode_format_80_24_32() {
        assert_eq!(decode(80, &[128, 0, 130]).unwrap(), vec![Some(0), None, Some(2)]);
        assert_eq!(
            decode(24, &[0xFF, 0xFF, 0xFF, 0x02, 0x00, 0x00]).unwrap(),
            vec![Some(-1), Some(2)]
        );
        assert_eq!(decode(32, &7i32.to_le_bytes()).unwrap(), vec![Some(7)]);
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(decode(8, &[0]), Err(PrepError::SignalFormat(_))));
    }

    #[test]
    fn test_physical_units() {
        assert_eq!(to_physical(Some(1010), &spec(1000.0, 10)), 1.0);
        assert!(to_physical(None, &spec(1000.0, 0)).is_nan());
    }

    #[test]
    fn test_read_multiplexed_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("r1.hea"),
            "r1 2 500 3\nr1.dat 16 100/mV 16 0 0 0 0 ECG\nr1.dat 16 1 16 0 0 0 0 PCG\n",
        )
        .unwrap();
        let frames: [[i16; 2]; 3] = [[100, 5], [200, -5], [-100, 0]];
        let bytes: Vec<u8> = frames
            .iter()
            .flat_map(|f| f.iter().flat_map(|s| s.to_le_bytes()))
            .collect();
        std::fs::write(dir.path().join("r1.dat"), bytes).unwrap();

        let record = read_record(dir.path(), "r1").unwrap();
        assert_eq!(record.channel_names(), vec!["ECG", "PCG"]);
        assert_eq!(record.channels[0].samples, vec![1.0, 2.0, -1.0]);
        assert_eq!(record.channels[1].samples, vec![5.0, -5.0, 0.0]);
        assert_eq!(record.channels[1].fs, 500.0);
    }

    #[test]
    fn test_read_separate_files_with_offset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("r2.hea"),
            "r2 2 1000\nr2.wav 16+4 1 16 0 0 0 0 PCG\nr2.dat 80 10 8 0 0 0 0 ECG\n",
        )
        .unwrap();
        let mut wav = vec![0xAA; 4];
        wav.extend(3i16.to_le_bytes());
        wav.extend((-3i16).to_le_bytes());
        std::fs::write(dir.path().join("r2.wav"), wav).unwrap();
        std::fs::write(dir.path().join("r2.dat"), [138u8, 118u8]).unwrap();

        let record = read_record(dir.path(), "r2").unwrap();
        assert_eq!(record.channel("PCG").unwrap().samples, vec![3.0, -3.0]);
        assert_eq!(record.channel("ECG").unwrap().samples, vec![1.0, -1.0]);
    }

    #[test]
    fn test_truncated_signal_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r3.hea"), "r3 1 500 10\nr3.dat 16 1 16 0 0 0 0 ECG\n")
            .unwrap();
        std::fs::write(dir.path().join("r3.dat"), [0u8; 4]).unwrap();
        assert!(read_record(dir.path(), "r3").is_err());
    }
}
