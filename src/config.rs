//! Pipeline configuration using Figment.
//!
//! Every path, seed, skip list and manual-run constant used by the three tools
//! lives here instead of in source. Configuration is layered, highest
//! precedence last:
//!
//! 1. Built-in defaults ([`PipelineConfig::default`])
//! 2. `config/pipeline.toml` (or the file passed with `--config`)
//! 3. Environment variables prefixed with `CARDIO_`, using `__` between
//!    nested keys
//!
//! # Environment Variable Overrides
//!
//! ```text
//! CARDIO_APPLICATION__LOG_LEVEL=debug
//! CARDIO_SPLIT__SEED=7
//! CARDIO_PATHS__LOG_FILE=/tmp/PROJECT_LOG.md
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cardio_prep::config::PipelineConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     println!("Raw data: {}", config.paths.raw_dir.display());
//!     println!("Split seed: {}", config.split.seed);
//!     Ok(())
//! }
//! ```

use crate::error::{require_exists, AppResult, PrepError};
use crate::record::{ECG, PCG};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file read when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CARDIO_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Input and output locations of every stage
    pub paths: PathsConfig,
    /// Record converter settings
    pub convert: ConvertConfig,
    /// Splitter settings
    pub split: SplitConfig,
    /// Constants reported by the stage logger
    pub stages: StageSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Directory layout of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw WFDB records (`*.hea` + signal files, optional `*.wav`)
    pub raw_dir: PathBuf,
    /// Converted `.mat` records
    pub mat_dir: PathBuf,
    /// Full label table
    pub labels_csv: PathBuf,
    /// Split output; holds `train/`, `test/` and the split label tables
    pub split_dir: PathBuf,
    /// Segment label table of the training partition
    pub train_segment_labels: PathBuf,
    /// Segment label table of the test partition
    pub test_segment_labels: PathBuf,
    /// Segment label table of the augmented training partition
    pub augmented_train_labels: PathBuf,
    /// Segment label table of the training partition after cleaning
    pub cleaned_train_labels: PathBuf,
    /// Segment label table of the test partition after cleaning
    pub cleaned_test_labels: PathBuf,
    /// Scalogram images, in `train/` and `test/` subdirectories
    pub scalogram_dir: PathBuf,
    /// Append-only project log
    pub log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = PathBuf::from("DATASET");
        Self {
            raw_dir: data.join("1-PHYSIONET RAW DATA").join("training-a"),
            mat_dir: data.join("2-MATLAB DATA"),
            labels_csv: data.join("2-MATLAB DATA").join("LABELS.csv"),
            split_dir: data.join("3-SPLIT_DATA"),
            train_segment_labels: data.join("4-SEGMENTED_DATA").join("train_segment_labels.csv"),
            test_segment_labels: data.join("4-SEGMENTED_DATA").join("test_segment_labels.csv"),
            augmented_train_labels: data
                .join("5-AUGMENTED_DATA")
                .join("train_augmented_labels.csv"),
            cleaned_train_labels: data.join("6-CLEANED_DATA").join("train_clean_labels.csv"),
            cleaned_test_labels: data.join("6-CLEANED_DATA").join("test_clean_labels.csv"),
            scalogram_dir: data.join("7-SCALOGRAMS"),
            log_file: PathBuf::from("PROJECT_LOG.md"),
        }
    }
}

impl PathsConfig {
    /// Destination of the training partition's `.mat` files.
    pub fn train_dir(&self) -> PathBuf {
        self.split_dir.join("train")
    }

    /// Destination of the test partition's `.mat` files.
    pub fn test_dir(&self) -> PathBuf {
        self.split_dir.join("test")
    }

    /// Label table of the training partition.
    pub fn train_labels(&self) -> PathBuf {
        self.split_dir.join("train_labels.csv")
    }

    /// Label table of the test partition.
    pub fn test_labels(&self) -> PathBuf {
        self.split_dir.join("test_labels.csv")
    }
}

/// Where the converter reads the PCG channel from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputAdapter {
    /// Both channels from the WFDB record; one shared sampling rate.
    Multiplexed,
    /// ECG from the WFDB record, PCG from `<id>.wav`; independent rates.
    Wav,
}

/// What the converter does with a PCG channel that has no non-zero sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilentSignalPolicy {
    /// Skip the record and count it.
    Skip,
    /// Write the channel unscaled (all zeros).
    Keep,
}

/// Record converter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Input adapter
    pub adapter: InputAdapter,
    /// Channel label of the electrical signal
    pub ecg_channel: String,
    /// Channel label of the acoustic signal
    pub pcg_channel: String,
    /// Handling of an all-zero PCG channel
    pub silent_pcg: SilentSignalPolicy,
    /// Store `.mat` variables zlib-compressed
    pub compress: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            adapter: InputAdapter::Multiplexed,
            ecg_channel: ECG.to_string(),
            pcg_channel: PCG.to_string(),
            silent_pcg: SilentSignalPolicy::Skip,
            compress: false,
        }
    }
}

/// Splitter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of records assigned to the test partition
    pub test_fraction: f64,
    /// Shuffle seed
    pub seed: u64,
    /// Extension of the per-record artifacts to copy
    pub artifact_extension: String,
    /// Also write `train_labels.csv` / `test_labels.csv`
    pub write_label_tables: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.30,
            seed: 42,
            artifact_extension: "mat".to_string(),
            write_label_tables: true,
        }
    }
}

/// Constants recorded from the downstream stages, reported by the logger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// R-peak segmentation
    pub segmentation: SegmentationSettings,
    /// Data augmentation
    pub augmentation: AugmentationSettings,
    /// NaN-ratio cleaning
    pub cleaning: CleaningSettings,
    /// Time-frequency transform
    pub scalogram: ScalogramSettings,
    /// Manual inspection of segmented signals
    pub visual_validation: VisualValidation,
    /// Manual inspection of scalogram images
    pub scalogram_validation: VisualValidation,
}

/// Segmentation parameters and skip lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Window length in seconds
    pub window_seconds: f64,
    /// Overlap between consecutive windows
    pub overlap: String,
    /// R-peak detector
    pub detector: String,
    /// Training records that produced no segments. Empty: derive from the
    /// segment label table.
    pub skipped_train: Vec<String>,
    /// Test records that produced no segments. Empty: derive from the segment
    /// label table.
    pub skipped_test: Vec<String>,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            window_seconds: 3.0,
            overlap: "None".to_string(),
            detector: "Pan–Tompkins–based (NeuroKit2)".to_string(),
            skipped_train: Vec::new(),
            skipped_test: Vec::new(),
        }
    }
}

/// Augmentation description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationSettings {
    /// Transformations applied
    pub methods: Vec<String>,
    /// Partition(s) augmented
    pub applied_to: String,
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self {
            methods: vec![
                "Additive Gaussian noise".to_string(),
                "Amplitude scaling".to_string(),
                "Small time shift".to_string(),
            ],
            applied_to: "Training set only".to_string(),
        }
    }
}

/// Cleaning thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSettings {
    /// Segments with a larger share of NaN samples are removed
    pub max_nan_ratio: f64,
    /// Additional criteria, one bullet each
    pub criteria: Vec<String>,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        Self {
            max_nan_ratio: 0.05,
            criteria: vec!["Flat-line (zero variance) segments removed".to_string()],
        }
    }
}

/// Time-frequency transform parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalogramSettings {
    /// Wavelet
    pub wavelet: String,
    /// Output image width and height in pixels
    pub image_size: [u32; 2],
    /// File extension of the generated images
    pub image_extension: String,
    /// Signals transformed
    pub signals: String,
}

impl Default for ScalogramSettings {
    fn default() -> Self {
        Self {
            wavelet: "Complex Morlet (CWT)".to_string(),
            image_size: [224, 224],
            image_extension: "png".to_string(),
            signals: "ECG and PCG".to_string(),
        }
    }
}

/// Result of a manual visual validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualValidation {
    /// Items inspected
    pub samples_inspected: usize,
    /// Observations, one bullet each
    pub findings: Vec<String>,
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl PipelineConfig {
    /// Load configuration from `config/pipeline.toml` and environment variables.
    ///
    /// A missing file is not an error: the defaults and environment still
    /// apply. After loading, configuration is validated.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns `PrepError::Config` if the file or an override cannot be
    /// deserialized, and `PrepError::Configuration` if validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file given on the command line, which must exist, or the
    /// default location otherwise.
    pub fn load_optional(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => {
                require_exists(path)?;
                Self::load_from(path)
            }
            None => Self::load(),
        }
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Test fraction lies strictly between 0 and 1
    /// - Channel labels are non-empty and distinct
    /// - NaN-ratio threshold lies in `[0, 1]`
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(PrepError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let fraction = self.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(PrepError::Configuration(format!(
                "Invalid test_fraction {fraction}. Must be between 0 and 1 (exclusive)"
            )));
        }

        let convert = &self.convert;
        if convert.ecg_channel.is_empty() || convert.pcg_channel.is_empty() {
            return Err(PrepError::Configuration(
                "Channel labels cannot be empty".to_string(),
            ));
        }
        if convert.ecg_channel == convert.pcg_channel {
            return Err(PrepError::Configuration(format!(
                "ECG and PCG channel labels are both '{}'",
                convert.ecg_channel
            )));
        }

        let ratio = self.stages.cleaning.max_nan_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(PrepError::Configuration(format!(
                "Invalid max_nan_ratio {ratio}. Must be 0-1"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.split.test_fraction, 0.30);
        assert_eq!(config.convert.adapter, InputAdapter::Multiplexed);
        assert_eq!(
            config.paths.train_labels(),
            PathBuf::from("DATASET/3-SPLIT_DATA/train_labels.csv")
        );
    }

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        let config = PipelineConfig::load_from("/nonexistent/pipeline.toml").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    #[serial]
    fn test_shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = PipelineConfig::load_from(path).unwrap();
        assert_eq!(config.paths, PathsConfig::default());
        assert_eq!(config.stages.segmentation.skipped_train.len(), 17);
        assert_eq!(config.stages.segmentation.skipped_test.len(), 10);
    }

    #[test]
    #[serial]
    fn test_explicit_config_must_exist() {
        let err = PipelineConfig::load_optional(Some(Path::new("/nonexistent/pipeline.toml")))
            .unwrap_err();
        assert!(matches!(err, PrepError::MissingInput(_)));
    }

    #[test]
    #[serial]
    fn test_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(
            &path,
            r#"
[paths]
log_file = "logs/run.md"

[convert]
adapter = "wav"
silent_pcg = "keep"

[stages.segmentation]
skipped_train = ["a0077", "a0084"]
"#,
        )
        .unwrap();

        let config = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(config.paths.log_file, PathBuf::from("logs/run.md"));
        assert_eq!(config.convert.adapter, InputAdapter::Wav);
        assert_eq!(config.convert.silent_pcg, SilentSignalPolicy::Keep);
        assert_eq!(config.stages.segmentation.skipped_train.len(), 2);
        // untouched sections keep their defaults
        assert_eq!(config.split, SplitConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("CARDIO_SPLIT__SEED", "7");
        std::env::set_var("CARDIO_APPLICATION__LOG_LEVEL", "debug");
        let result = PipelineConfig::load_from("/nonexistent/pipeline.toml");
        std::env::remove_var("CARDIO_SPLIT__SEED");
        std::env::remove_var("CARDIO_APPLICATION__LOG_LEVEL");

        let config = result.unwrap();
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.application.log_level, "debug");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.split.test_fraction = 1.0;
        assert!(matches!(config.validate(), Err(PrepError::Configuration(_))));

        let mut config = PipelineConfig::default();
        config.application.log_level = "verbose".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.convert.pcg_channel = "ECG".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.stages.cleaning.max_nan_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[split]\nseed = \"forty-two\"\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_from(&path),
            Err(PrepError::Config(_))
        ));
    }
}
