//! WAV input for the standalone-audio PCG adapter.

use crate::error::{AppResult, PrepError};
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Samples scaled to [-1.0, 1.0] by the format's full-scale value.
    pub samples: Vec<f64>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channels in the source file; multi-channel files are averaged.
    pub channels: u16,
}

/// Reads a WAV file and mixes it down to mono.
pub fn read_wav(path: &Path) -> AppResult<AudioData> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f64> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| f64::from(v) / 128.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f64::from(v) / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| f64::from(v) / 8_388_608.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| f64::from(v) / 2_147_483_648.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(PrepError::SignalFormat(format!(
                "{:?} {}-bit WAV in {}",
                format,
                bits,
                path.display()
            )))
        }
    };

    let channels = spec.channels.max(1);
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels as usize)
            .map(|frame| frame.iter().sum::<f64>() / f64::from(channels))
            .collect()
    };

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 4000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_read_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 1, &[16384, -16384, 0]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 4000);
        assert_eq!(audio.samples, vec![0.5, -0.5, 0.0]);
    }

    #[test]
    fn test_stereo_is_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.wav");
        write_wav(&path, 2, &[16384, 0, -16384, -16384]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_wav(Path::new("/nonexistent/x.wav")).is_err());
    }
}
