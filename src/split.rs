//! Stratified train/test split of a label table and the file copy that
//! materializes it.
//!
//! Sizes follow the usual stratified-shuffle convention: the test partition
//! gets `ceil(test_fraction * n)` rows and the training partition the rest.
//! Each class then receives its largest-remainder share of the training size,
//! and of the test size over the rows left in that class, so the class
//! proportions of both partitions track the full table as closely as integer
//! counts allow.
//!
//! Shuffling uses `StdRng` seeded from the configured seed: the same table and
//! seed always produce the same partition.

use crate::config::PipelineConfig;
use crate::data::labels::{LabelRow, LabelTable};
use crate::error::{require_exists, AppResult, PrepError};
use crate::record::Label;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// A disjoint train/test partition of a label table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Training rows.
    pub train: LabelTable,
    /// Test rows.
    pub test: LabelTable,
}

/// Partitions `table` into train and test sets stratified by label.
///
/// # Errors
///
/// `PrepError::Split` when `test_fraction` is not strictly between 0 and 1,
/// when a class has fewer than two rows, or when either partition would be
/// smaller than the number of classes.
pub fn stratified_split(table: &LabelTable, test_fraction: f64, seed: u64) -> AppResult<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PrepError::Split(format!(
            "test fraction {test_fraction} must be between 0 and 1"
        )));
    }

    let mut by_class: BTreeMap<Label, Vec<&LabelRow>> = BTreeMap::new();
    for row in table.rows() {
        by_class.entry(row.label).or_default().push(row);
    }
    if let Some((label, rows)) = by_class.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(PrepError::Split(format!(
            "class {} has {} row(s); at least 2 are needed to stratify",
            label,
            rows.len()
        )));
    }

    let n = table.len();
    // Guard against products like 0.3 * 10 landing a hair above the integer.
    let n_test = (test_fraction * n as f64 - 1e-9).ceil() as usize;
    let n_train = n - n_test;
    let n_classes = by_class.len();
    if n_train < n_classes || n_test < n_classes {
        return Err(PrepError::Split(format!(
            "{n} rows cannot fill {n_train} train / {n_test} test slots with {n_classes} classes each"
        )));
    }

    let class_counts: Vec<usize> = by_class.values().map(Vec::len).collect();
    let train_counts = apportion(&class_counts, n_train);
    let remaining: Vec<usize> = class_counts
        .iter()
        .zip(&train_counts)
        .map(|(total, train)| total - train)
        .collect();
    let test_counts = apportion(&remaining, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for ((label, mut rows), (n_i, t_i)) in by_class
        .into_iter()
        .zip(train_counts.into_iter().zip(test_counts))
    {
        rows.shuffle(&mut rng);
        debug!(class = %label, train = n_i, test = t_i, "Class allocation");
        train.extend(rows[..n_i].iter().map(|r| (*r).clone()));
        test.extend(rows[n_i..n_i + t_i].iter().map(|r| (*r).clone()));
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(Split {
        train: LabelTable::new(train)?,
        test: LabelTable::new(test)?,
    })
}

/// Distributes `draws` over classes in proportion to `counts`, using the
/// largest remainders for the leftover units (ties go to the earlier class).
fn apportion(counts: &[usize], draws: usize) -> Vec<usize> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| draws as f64 * c as f64 / total as f64)
        .collect();
    let mut allocated: Vec<usize> = exact.iter().map(|x| x.floor() as usize).collect();
    let mut left = draws.saturating_sub(allocated.iter().sum());

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for idx in order {
        if left == 0 {
            break;
        }
        if allocated[idx] < counts[idx] {
            allocated[idx] += 1;
            left -= 1;
        }
    }
    allocated
}

/// Files copied into one partition directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Records whose artifact was copied.
    pub copied: Vec<String>,
    /// Records whose artifact was not found in the source directory.
    pub missing: Vec<String>,
}

/// Copies `<record>.<extension>` for every row of `table` from `src_dir` to
/// `dst_dir`. Missing sources are reported, not raised.
pub fn copy_partition(
    table: &LabelTable,
    src_dir: &Path,
    dst_dir: &Path,
    extension: &str,
) -> AppResult<CopyReport> {
    require_exists(src_dir)?;
    std::fs::create_dir_all(dst_dir)?;

    let mut report = CopyReport::default();
    for record in table.records() {
        let file_name = format!("{record}.{extension}");
        let src = src_dir.join(&file_name);
        if src.is_file() {
            std::fs::copy(&src, dst_dir.join(&file_name))?;
            report.copied.push(record.to_string());
        } else {
            println!("Missing file: {file_name}");
            report.missing.push(record.to_string());
        }
    }

    info!(
        destination = %dst_dir.display(),
        copied = report.copied.len(),
        missing = report.missing.len(),
        "Partition copied"
    );
    Ok(report)
}

/// Everything one splitter run produced.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// The partition.
    pub split: Split,
    /// Copy results for `train/`.
    pub train_copy: CopyReport,
    /// Copy results for `test/`.
    pub test_copy: CopyReport,
}

/// Loads the label table, splits it, copies the artifacts and, when enabled,
/// writes the per-partition label tables.
pub fn run_split(config: &PipelineConfig) -> AppResult<SplitOutcome> {
    let paths = &config.paths;
    let table = LabelTable::from_csv(&paths.labels_csv)?;
    info!(records = table.len(), source = %paths.labels_csv.display(), "Label table loaded");

    let split = stratified_split(&table, config.split.test_fraction, config.split.seed)?;
    let ext = &config.split.artifact_extension;
    let train_copy = copy_partition(&split.train, &paths.mat_dir, &paths.train_dir(), ext)?;
    let test_copy = copy_partition(&split.test, &paths.mat_dir, &paths.test_dir(), ext)?;

    if config.split.write_label_tables {
        split.train.to_csv(&paths.train_labels())?;
        split.test.to_csv(&paths.test_labels())?;
    }

    Ok(SplitOutcome {
        split,
        train_copy,
        test_copy,
    })
}

/// Plain-text summary printed by the splitter.
pub fn summary(split: &Split, test_fraction: f64) -> String {
    let train_pct = ((1.0 - test_fraction) * 100.0).round();
    let test_pct = (test_fraction * 100.0).round();
    let mut out = format!(
        "{train_pct:.0}–{test_pct:.0} stratified train–test split completed\n\
         Train samples: {}\n\
         Test samples: {}\n",
        split.train.len(),
        split.test.len()
    );
    for (name, table) in [("Train", &split.train), ("Test", &split.test)] {
        let balance = table.balance();
        out.push_str(&format!("{name} label proportions:\n"));
        for label in Label::ALL {
            out.push_str(&format!("  {:>2}  {:.6}\n", label, balance.fraction(label)));
        }
    }
    out
}
