//! Per-stage reporting routines.
//!
//! Each routine reads the artifacts of one stage and renders a Markdown body.
//! Problems with individual artifacts (unreadable headers, invalid `.mat`
//! files) are counted in the report; a missing input directory or table is an
//! error.

use super::LogEntry;
use crate::config::{PipelineConfig, VisualValidation};
use crate::data::{ClassBalance, LabelTable, MatFile, SegmentTable};
use crate::error::{require_exists, AppResult};
use crate::record::Label;
use crate::wfdb::{self, Header};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Raw WFDB headers: how many records carry both channels.
pub fn raw(config: &PipelineConfig) -> AppResult<LogEntry> {
    let dir = &config.paths.raw_dir;
    require_exists(dir)?;
    let (ecg, pcg) = (&config.convert.ecg_channel, &config.convert.pcg_channel);

    let mut total = 0;
    let mut both = 0;
    let mut pcg_only = 0;
    for id in wfdb::list_records(dir)? {
        let header = match Header::read(&dir.join(format!("{id}.hea"))) {
            Ok(header) => header,
            Err(e) => {
                debug!(record = %id, error = %e, "Unreadable header ignored");
                continue;
            }
        };
        total += 1;
        if header.has_channel(ecg) && header.has_channel(pcg) {
            both += 1;
        } else if header.has_channel(pcg) {
            pcg_only += 1;
        }
    }

    let mut md = String::new();
    md.push_str(&format!("**Raw data path:**  \n`{}`\n\n", dir.display()));
    md.push_str(&format!("- Total records found: {total}\n"));
    md.push_str(&format!("- {ecg} + {pcg} records: {both}\n"));
    md.push_str(&format!("- {pcg}-only records: {pcg_only}\n\n"));
    md.push_str("Notes:\n");
    md.push_str(&format!("- Only records with synchronous {ecg} and {pcg} are used.\n"));
    md.push_str(&format!("- {pcg}-only records are excluded.\n"));
    Ok(LogEntry::now("Raw Data Summary", md))
}

/// Sampling rates stored in a converted record, or `None` if the file is not
/// a complete record.
fn record_rates(mat: &MatFile) -> Option<Vec<f64>> {
    if mat.get("ecg").is_none() || mat.get("pcg").is_none() {
        return None;
    }
    if let Some(fs) = mat.get("fs").and_then(|v| v.scalar()) {
        return Some(vec![fs]);
    }
    let ecg = mat.get("fs_ecg").and_then(|v| v.scalar())?;
    let pcg = mat.get("fs_pcg").and_then(|v| v.scalar())?;
    Some(vec![ecg, pcg])
}

fn files_with_extension(dir: &Path, extension: &str) -> AppResult<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Converted records: count, distinct sampling rates, invalid files.
pub fn mat(config: &PipelineConfig) -> AppResult<LogEntry> {
    let dir = &config.paths.mat_dir;
    require_exists(dir)?;

    let files = files_with_extension(dir, "mat")?;
    let mut rates = BTreeSet::new();
    let mut invalid = 0;
    for path in &files {
        match MatFile::read(path).ok().as_ref().and_then(record_rates) {
            Some(fs) => rates.extend(fs.into_iter().map(|hz| hz.round() as i64)),
            None => {
                debug!(file = %path.display(), "Invalid or incomplete record");
                invalid += 1;
            }
        }
    }
    let rates: Vec<String> = rates.iter().map(i64::to_string).collect();

    let mut md = String::new();
    md.push_str(&format!("**Converted data path:**  \n`{}`\n\n", dir.display()));
    md.push_str(&format!("- Total .mat records: {}\n", files.len()));
    md.push_str(&format!("- Sampling rates detected: [{}]\n", rates.join(", ")));
    md.push_str(&format!("- Invalid or incomplete records: {invalid}\n\n"));
    md.push_str("Notes:\n");
    md.push_str("- ECG preserved in physical units (mV).\n");
    md.push_str("- PCG amplitude normalized during conversion.\n");
    Ok(LogEntry::now("MATLAB Converted Data Summary", md))
}

fn push_balance(md: &mut String, balance: &ClassBalance, noun: &str) {
    for label in Label::ALL {
        md.push_str(&balance.bullet(label, noun));
        md.push('\n');
    }
}

/// Per-partition record counts and class shares of the split.
pub fn split(config: &PipelineConfig) -> AppResult<LogEntry> {
    let paths = &config.paths;
    let train = LabelTable::from_csv(&paths.train_labels())?;
    let test = LabelTable::from_csv(&paths.test_labels())?;

    let test_pct = (config.split.test_fraction * 100.0).round();
    let mut md = String::new();
    md.push_str("**Split strategy:**\n");
    md.push_str(&format!(
        "- {:.0}% Train / {:.0}% Test\n",
        100.0 - test_pct,
        test_pct
    ));
    md.push_str("- Stratified at patient (record) level\n");
    md.push_str("- No cross-patient leakage\n\n");

    for (heading, table) in [("Training Set", &train), ("Test Set", &test)] {
        md.push_str(&format!("### {heading}\n"));
        md.push_str(&format!("- Records: {}\n", table.len()));
        push_balance(&mut md, &table.balance(), "records");
        md.push('\n');
    }

    md.push_str("Notes:\n");
    md.push_str("- Split performed before segmentation.\n");
    md.push_str("- Class proportions preserved across splits.\n");
    Ok(LogEntry::now("Patient-wise Train–Test Split Summary", md))
}

/// Records of one partition that produced no segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkippedRecords {
    /// Taken from configuration.
    Configured(Vec<String>),
    /// Split-table records absent from the segment table.
    Derived(Vec<String>),
    /// The segment table does not link segments to records.
    NotDerivable,
}

impl SkippedRecords {
    /// Resolves the skipped records of a partition. A non-empty configured
    /// list wins over derivation, which needs both the split table and a
    /// segment table with a record column.
    pub fn resolve(
        configured: &[String],
        split: Option<&LabelTable>,
        segments: &SegmentTable,
    ) -> Self {
        if !configured.is_empty() {
            return SkippedRecords::Configured(configured.to_vec());
        }
        match (split, segments.source_records()) {
            (Some(split), Some(segmented)) => SkippedRecords::Derived(
                split
                    .records()
                    .filter(|r| !segmented.contains(r))
                    .map(str::to_string)
                    .collect(),
            ),
            _ => SkippedRecords::NotDerivable,
        }
    }

    /// Number of skipped records, when known.
    pub fn count(&self) -> Option<usize> {
        match self {
            SkippedRecords::Configured(ids) | SkippedRecords::Derived(ids) => Some(ids.len()),
            SkippedRecords::NotDerivable => None,
        }
    }
}

impl fmt::Display for SkippedRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count() {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("not derivable (segment table has no record column)"),
        }
    }
}

/// Segment counts and class shares per partition.
pub fn segment(config: &PipelineConfig) -> AppResult<LogEntry> {
    let paths = &config.paths;
    let settings = &config.stages.segmentation;
    let train = SegmentTable::from_csv(&paths.train_segment_labels)?;
    let test = SegmentTable::from_csv(&paths.test_segment_labels)?;

    let mut md = String::new();
    md.push_str("**Segmentation method:**\n");
    md.push_str("- R-peak–centered windows\n");
    md.push_str(&format!("- Window length: {} seconds\n", settings.window_seconds));
    md.push_str(&format!("- Overlap: {}\n", settings.overlap));
    md.push_str(&format!("- R-peak detection: {}\n\n", settings.detector));

    let partitions = [
        ("Training Data", &train, &settings.skipped_train, paths.train_labels()),
        ("Test Data", &test, &settings.skipped_test, paths.test_labels()),
    ];
    for (heading, segments, configured, split_labels) in partitions {
        let split = if split_labels.exists() {
            Some(LabelTable::from_csv(&split_labels)?)
        } else {
            debug!(table = %split_labels.display(), "No split table to derive skipped records from");
            None
        };
        let skipped = SkippedRecords::resolve(configured, split.as_ref(), segments);

        md.push_str(&format!("### {heading}\n"));
        md.push_str(&format!("- Total segments: {}\n", segments.len()));
        push_balance(&mut md, &segments.balance(), "segments");
        md.push_str(&format!("- Skipped records: {skipped}\n\n"));
    }

    md.push_str("Notes:\n");
    md.push_str("- Patient-wise split preserved.\n");
    md.push_str("- No data augmentation applied at this stage.\n");
    Ok(LogEntry::now("R-Peak–Based Segmentation Summary", md))
}

/// Training segments before and after augmentation.
pub fn augment(config: &PipelineConfig) -> AppResult<LogEntry> {
    let paths = &config.paths;
    let settings = &config.stages.augmentation;
    let before = SegmentTable::from_csv(&paths.train_segment_labels)?;
    let after = SegmentTable::from_csv(&paths.augmented_train_labels)?;

    let mut md = String::new();
    md.push_str("**Augmentation methods:**\n");
    for method in &settings.methods {
        md.push_str(&format!("- {method}\n"));
    }
    md.push_str(&format!("- Applied to: {}\n\n", settings.applied_to));

    md.push_str("### Before Augmentation\n");
    md.push_str(&format!("- Total segments: {}\n", before.len()));
    push_balance(&mut md, &before.balance(), "segments");
    md.push('\n');

    md.push_str("### After Augmentation\n");
    md.push_str(&format!("- Total segments: {}\n", after.len()));
    push_balance(&mut md, &after.balance(), "segments");
    md.push_str(&format!(
        "- Segments added: {}\n\n",
        after.len().saturating_sub(before.len())
    ));

    md.push_str("Notes:\n");
    md.push_str("- Test set left unchanged.\n");
    md.push_str("- Augmented segments inherit the label of their source segment.\n");
    Ok(LogEntry::now("Data Augmentation Summary", md))
}

/// Segments kept and removed by cleaning.
pub fn clean(config: &PipelineConfig) -> AppResult<LogEntry> {
    let paths = &config.paths;
    let settings = &config.stages.cleaning;
    let partitions = [
        (
            "Training Data",
            SegmentTable::from_csv(&paths.train_segment_labels)?,
            SegmentTable::from_csv(&paths.cleaned_train_labels)?,
        ),
        (
            "Test Data",
            SegmentTable::from_csv(&paths.test_segment_labels)?,
            SegmentTable::from_csv(&paths.cleaned_test_labels)?,
        ),
    ];

    let mut md = String::new();
    md.push_str("**Cleaning criteria:**\n");
    md.push_str(&format!(
        "- Segments with NaN ratio above {:.2}% removed\n",
        settings.max_nan_ratio * 100.0
    ));
    for criterion in &settings.criteria {
        md.push_str(&format!("- {criterion}\n"));
    }
    md.push('\n');

    for (heading, before, after) in &partitions {
        md.push_str(&format!("### {heading}\n"));
        md.push_str(&format!("- Segments before cleaning: {}\n", before.len()));
        md.push_str(&format!("- Segments kept: {}\n", after.len()));
        md.push_str(&format!(
            "- Segments removed: {}\n",
            before.len().saturating_sub(after.len())
        ));
        push_balance(&mut md, &after.balance(), "segments");
        md.push('\n');
    }

    md.push_str("Notes:\n");
    md.push_str("- Cleaning applied independently to each partition.\n");
    Ok(LogEntry::now("Data Cleaning Summary", md))
}

/// Image counts under the scalogram directory.
pub fn scalogram(config: &PipelineConfig) -> AppResult<LogEntry> {
    let dir = &config.paths.scalogram_dir;
    let settings = &config.stages.scalogram;
    require_exists(dir)?;

    let count = |partition: &str| -> AppResult<usize> {
        let sub = dir.join(partition);
        if sub.is_dir() {
            Ok(files_with_extension(&sub, &settings.image_extension)?.len())
        } else {
            Ok(0)
        }
    };
    let train = count("train")?;
    let test = count("test")?;

    let [width, height] = settings.image_size;
    let mut md = String::new();
    md.push_str(&format!("**Scalogram path:**  \n`{}`\n\n", dir.display()));
    md.push_str("**Transform:**\n");
    md.push_str(&format!("- Wavelet: {}\n", settings.wavelet));
    md.push_str(&format!("- Signals: {}\n", settings.signals));
    md.push_str(&format!("- Image size: {width}×{height}\n\n"));
    md.push_str(&format!("- Training images: {train}\n"));
    md.push_str(&format!("- Test images: {test}\n"));
    md.push_str(&format!("- Total images: {}\n", train + test));
    Ok(LogEntry::now("Scalogram Generation Summary", md))
}

fn validation_body(validation: &VisualValidation, noun: &str) -> String {
    let mut md = String::new();
    md.push_str(&format!("- {noun} inspected: {}\n", validation.samples_inspected));
    if !validation.findings.is_empty() {
        md.push_str("\nFindings:\n");
        for finding in &validation.findings {
            md.push_str(&format!("- {finding}\n"));
        }
    }
    md
}

/// Manual inspection of segmented signals.
pub fn visualize(config: &PipelineConfig) -> LogEntry {
    LogEntry::now(
        "Segment Visual Validation",
        validation_body(&config.stages.visual_validation, "Segments"),
    )
}

/// Manual inspection of scalogram images.
pub fn scalogram_viz(config: &PipelineConfig) -> LogEntry {
    LogEntry::now(
        "Scalogram Visual Validation",
        validation_body(&config.stages.scalogram_validation, "Scalograms"),
    )
}
