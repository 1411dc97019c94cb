//! Record and label types shared by the converter, splitter and stage logger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel label of the electrical (ECG) signal.
pub const ECG: &str = "ECG";
/// Channel label of the acoustic (PCG) signal.
pub const PCG: &str = "PCG";

/// Binary class label as stored in label tables (`+1` / `-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Label {
    /// `+1`
    Abnormal,
    /// `-1`
    Normal,
}

impl Label {
    /// Both labels, positive class first.
    pub const ALL: [Label; 2] = [Label::Abnormal, Label::Normal];

    /// Integer value used in label tables.
    pub fn value(self) -> i64 {
        match self {
            Label::Abnormal => 1,
            Label::Normal => -1,
        }
    }

    /// Signed display form (`+1` / `-1`).
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Abnormal => "+1",
            Label::Normal => "-1",
        }
    }
}

impl TryFrom<i64> for Label {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Label::Abnormal),
            -1 => Ok(Label::Normal),
            other => Err(format!("invalid label {other}, expected +1 or -1")),
        }
    }
}

impl From<Label> for i64 {
    fn from(label: Label) -> Self {
        label.value()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named signal stream in physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Channel label (e.g. `ECG`).
    pub name: String,
    /// Sampling frequency in Hz.
    pub fs: f64,
    /// Samples in physical units; NaN marks an invalid sample.
    pub samples: Vec<f64>,
}

/// A record as produced by an input adapter, before channel selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Record identifier (file stem of the header).
    pub id: String,
    /// Channels in header order.
    pub channels: Vec<Channel>,
}

impl RawRecord {
    /// Channel names in header order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    /// First channel with the given label.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Sampling rate layout of a converted record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingRates {
    /// Both channels share one rate (multiplexed input).
    Shared(f64),
    /// ECG and PCG were recorded at independent rates (WAV input).
    Independent {
        /// ECG rate in Hz.
        ecg: f64,
        /// PCG rate in Hz.
        pcg: f64,
    },
}

/// A converted record: time-aligned ECG and PCG in `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct CardiacRecord {
    /// Record identifier.
    pub id: String,
    /// Electrical signal in physical units.
    pub ecg: Vec<f32>,
    /// Acoustic signal, peak-normalized.
    pub pcg: Vec<f32>,
    /// Sampling rate(s).
    pub rates: SamplingRates,
    /// Channel names of the source record.
    pub channel_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_conversion() {
        assert_eq!(Label::try_from(1), Ok(Label::Abnormal));
        assert_eq!(Label::try_from(-1), Ok(Label::Normal));
        assert!(Label::try_from(0).is_err());
        assert_eq!(i64::from(Label::Normal), -1);
        assert_eq!(Label::Abnormal.to_string(), "+1");
    }

    #[test]
    fn test_channel_lookup() {
        let record = RawRecord {
            id: "a0001".into(),
            channels: vec![
                Channel {
                    name: "PCG".into(),
                    fs: 2000.0,
                    samples: vec![0.1],
                },
                Channel {
                    name: "ECG".into(),
                    fs: 2000.0,
                    samples: vec![0.2],
                },
            ],
        };
        assert_eq!(record.channel_names(), vec!["PCG", "ECG"]);
        assert_eq!(record.channel(ECG).map(|c| c.samples[0]), Some(0.2));
        assert!(record.channel("ABP").is_none());
    }
}
