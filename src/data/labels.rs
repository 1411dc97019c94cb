//! Label tables (`record,label` CSV) and class-balance summaries.

use crate::error::{require_exists, AppResult, PrepError};
use crate::record::Label;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// One row of a record label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRow {
    /// Record identifier.
    pub record: String,
    /// Class label.
    pub label: Label,
}

impl LabelRow {
    /// Creates a row.
    pub fn new(record: impl Into<String>, label: Label) -> Self {
        Self {
            record: record.into(),
            label,
        }
    }
}

/// A row-per-record label table. Record ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    rows: Vec<LabelRow>,
}

impl LabelTable {
    /// Builds a table, rejecting duplicate record ids.
    pub fn new(rows: Vec<LabelRow>) -> AppResult<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.record.as_str()) {
                return Err(PrepError::Labels(format!(
                    "record '{}' appears more than once",
                    row.record
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Loads a table from a CSV file with a header row and at least the
    /// columns `record` and `label`. Extra columns are ignored.
    pub fn from_csv(path: &Path) -> AppResult<Self> {
        require_exists(path)?;
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize::<LabelRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rows)
    }

    /// Writes the table as `record,label` CSV.
    pub fn to_csv(&self, path: &Path) -> AppResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Rows in table order.
    pub fn rows(&self) -> &[LabelRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Record ids in table order.
    pub fn records(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.record.as_str())
    }

    /// Per-class counts.
    pub fn balance(&self) -> ClassBalance {
        ClassBalance::from_labels(self.rows.iter().map(|r| r.label))
    }
}

/// One row of a segment label table.
///
/// Segmentation writes one row per window; `record` links the window back to
/// its source record when the producing tool emits that column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRow {
    /// Segment identifier (usually a file name).
    #[serde(default)]
    pub segment: Option<String>,
    /// Source record identifier.
    #[serde(default)]
    pub record: Option<String>,
    /// Class label inherited from the record.
    pub label: Label,
}

/// A row-per-segment label table. Unlike [`LabelTable`], several rows share a
/// record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    rows: Vec<SegmentRow>,
}

impl SegmentTable {
    /// Builds a table from rows.
    pub fn new(rows: Vec<SegmentRow>) -> Self {
        Self { rows }
    }

    /// Loads a table from a CSV file with at least a `label` column.
    pub fn from_csv(path: &Path) -> AppResult<Self> {
        require_exists(path)?;
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize::<SegmentRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rows))
    }

    /// Rows in table order.
    pub fn rows(&self) -> &[SegmentRow] {
        &self.rows
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no segments.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Segments per label.
    pub fn balance(&self) -> ClassBalance {
        ClassBalance::from_labels(self.rows.iter().map(|r| r.label))
    }

    /// Distinct source records, or `None` when any row lacks one.
    pub fn source_records(&self) -> Option<BTreeSet<&str>> {
        self.rows.iter().map(|r| r.record.as_deref()).collect()
    }
}

/// Counts of each label in a collection of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassBalance {
    counts: BTreeMap<Label, usize>,
    total: usize,
}

impl ClassBalance {
    /// Tallies a sequence of labels.
    pub fn from_labels(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut balance = Self::default();
        for label in labels {
            *balance.counts.entry(label).or_insert(0) += 1;
            balance.total += 1;
        }
        balance
    }

    /// Total number of rows.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Rows with this label.
    pub fn count(&self, label: Label) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    /// Share of rows with this label, in `[0, 1]`; zero for an empty table.
    pub fn fraction(&self, label: Label) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(label) as f64 / self.total as f64
        }
    }

    /// Share of rows with this label, in percent.
    pub fn percent(&self, label: Label) -> f64 {
        self.fraction(label) * 100.0
    }

    /// Markdown bullet for one label, e.g. `- +1 records: 42 (60.00%)`.
    pub fn bullet(&self, label: Label, noun: &str) -> String {
        format!(
            "- {} {}: {} ({:.2}%)",
            label,
            noun,
            self.count(label),
            self.percent(label)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, text: &str) {
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_load_label_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LABELS.csv");
        write(&path, "record,label,quality\na0001,1,1\na0002,-1,0\na0003,-1,1\n");

        let table = LabelTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0], LabelRow::new("a0001", Label::Abnormal));

        let balance = table.balance();
        assert_eq!(balance.count(Label::Normal), 2);
        assert!((balance.percent(Label::Abnormal) - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_missing_file_is_missing_input() {
        let err = LabelTable::from_csv(Path::new("/nonexistent/LABELS.csv")).unwrap_err();
        assert!(matches!(err, PrepError::MissingInput(_)));
    }

    #[test]
    fn test_invalid_label_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        write(&path, "record,label\na0001,2\n");
        assert!(matches!(
            LabelTable::from_csv(&path),
            Err(PrepError::Csv(_))
        ));
    }

    #[test]
    fn test_duplicate_records_rejected() {
        let rows = vec![
            LabelRow::new("a0001", Label::Normal),
            LabelRow::new("a0001", Label::Abnormal),
        ];
        assert!(matches!(LabelTable::new(rows), Err(PrepError::Labels(_))));
    }

    #[test]
    fn test_csv_written_with_signed_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = LabelTable::new(vec![
            LabelRow::new("a0001", Label::Abnormal),
            LabelRow::new("a0002", Label::Normal),
        ])
        .unwrap();
        table.to_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "record,label\na0001,1\na0002,-1\n");
        assert_eq!(LabelTable::from_csv(&path).unwrap(), table);
    }

    #[test]
    fn test_segment_table_with_record_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.csv");
        write(
            &path,
            "segment,record,label\na0001_0.mat,a0001,1\na0001_1.mat,a0001,1\na0002_0.mat,a0002,-1\n",
        );

        let table = SegmentTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.balance().count(Label::Abnormal), 2);
        let records: Vec<&str> = table.source_records().unwrap().into_iter().collect();
        assert_eq!(records, vec!["a0001", "a0002"]);
    }

    #[test]
    fn test_segment_table_without_record_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.csv");
        write(&path, "segment,label\na0001_0.mat,1\na0002_0.mat,-1\n");

        let table = SegmentTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].segment.as_deref(), Some("a0001_0.mat"));
        assert!(table.source_records().is_none());
    }

    #[test]
    fn test_empty_balance() {
        let balance = ClassBalance::default();
        assert_eq!(balance.fraction(Label::Normal), 0.0);
        assert_eq!(balance.bullet(Label::Normal, "records"), "- -1 records: 0 (0.00%)");
    }
}
