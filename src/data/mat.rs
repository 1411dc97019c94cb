//! MAT-file container for converted records.
//!
//! Reading and writing go through the [`matrw`] crate: files are written as
//! version 7 MAT-files, optionally zlib-compressed, and anything `matrw` can
//! load is accepted on the way back in. This module only keeps a small owned
//! view of the variables ([`MatVariable`] / [`MatData`]) so the rest of the
//! crate never matches on `matrw`'s own types.
//!
//! Integer-class arrays (for example an `fs` saved as `int64`) are decoded and
//! widen to `f64` like the floating-point classes. Cells, structs, sparse and
//! logical arrays are kept as [`MatData::Unsupported`] so a file can still be
//! inspected.
//!
//! A file that `matrw` cannot parse, or whose dimensions do not describe its
//! data, is an error from [`MatFile::read`]. Callers that only count valid
//! files (the stage logger) never see a panic from a corrupt input.

use crate::error::{AppResult, PrepError};
use matrw::{MatlabType, NumericArray};
use std::panic;
use std::path::Path;
use tracing::debug;

/// Contents of one MAT variable (column-major for numeric data).
#[derive(Debug, Clone, PartialEq)]
pub enum MatData {
    /// `single` array.
    Single(Vec<f32>),
    /// `double` array.
    Double(Vec<f64>),
    /// Any signed or unsigned integer class.
    Integer(Vec<i64>),
    /// `char` matrix, one string per row with trailing padding removed.
    Char(Vec<String>),
    /// Variable of a class this view does not decode.
    Unsupported(String),
}

/// A named variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MatVariable {
    /// Variable name.
    pub name: String,
    /// Dimensions as stored in the file.
    pub dims: Vec<usize>,
    /// Decoded data.
    pub data: MatData,
}

impl MatVariable {
    /// Numeric contents widened to `f64`, if the variable is numeric.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match &self.data {
            MatData::Single(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            MatData::Double(v) => Some(v.clone()),
            MatData::Integer(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// First numeric element, for scalars such as `fs`.
    pub fn scalar(&self) -> Option<f64> {
        match &self.data {
            MatData::Single(v) => v.first().map(|&x| f64::from(x)),
            MatData::Double(v) => v.first().copied(),
            MatData::Integer(v) => v.first().map(|&x| x as f64),
            _ => None,
        }
    }
}

/// An in-memory MAT file: an ordered list of variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatFile {
    variables: Vec<MatVariable>,
}

impl MatFile {
    /// Creates an empty file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `single` row vector.
    pub fn with_single_row(mut self, name: &str, values: &[f32]) -> Self {
        self.push(name, vec![1, values.len()], MatData::Single(values.to_vec()));
        self
    }

    /// Adds a 1x1 `double`.
    pub fn with_double_scalar(mut self, name: &str, value: f64) -> Self {
        self.push(name, vec![1, 1], MatData::Double(vec![value]));
        self
    }

    /// Adds a 1x1 `int64`.
    pub fn with_int_scalar(mut self, name: &str, value: i64) -> Self {
        self.push(name, vec![1, 1], MatData::Integer(vec![value]));
        self
    }

    /// Adds a `char` matrix with one row per string (rows space-padded).
    pub fn with_char_rows(mut self, name: &str, rows: &[String]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        self.push(name, vec![rows.len(), width], MatData::Char(rows.to_vec()));
        self
    }

    fn push(&mut self, name: &str, dims: Vec<usize>, data: MatData) {
        self.variables.retain(|v| v.name != name);
        self.variables.push(MatVariable {
            name: name.to_string(),
            dims,
            data,
        });
    }

    /// Looks a variable up by name.
    pub fn get(&self, name: &str) -> Option<&MatVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// All variables in file order.
    pub fn variables(&self) -> &[MatVariable] {
        &self.variables
    }

    /// Writes the file to `path` as a v7 MAT-file, replacing any existing
    /// file. With `compress` every variable is stored zlib-compressed.
    pub fn write(&self, path: &Path, compress: bool) -> AppResult<()> {
        let file = self.to_matrw()?;
        matrw::save_matfile_v7(utf8_path(path)?, file, compress)?;
        Ok(())
    }

    /// Reads `path` and decodes every variable.
    pub fn read(path: &Path) -> AppResult<Self> {
        if !path.is_file() {
            return Err(PrepError::MissingInput(path.to_path_buf()));
        }
        let path_str = utf8_path(path)?;

        // matrw asserts on some malformed layouts instead of returning an error
        let loaded = panic::catch_unwind(|| matrw::load_matfile(path_str)).map_err(|_| {
            PrepError::Mat(format!("{} could not be parsed", path.display()))
        })??;

        let mut variables = Vec::new();
        for (name, var) in loaded.iter() {
            variables.push(view(name, var)?);
        }
        debug!(file = %path.display(), variables = variables.len(), "Read MAT file");
        Ok(Self { variables })
    }

    fn to_matrw(&self) -> AppResult<matrw::MatFile> {
        let mut file = matrw::MatFile::new();
        for var in &self.variables {
            if !is_valid_name(&var.name) {
                return Err(PrepError::Mat(format!(
                    "'{}' is not a valid MATLAB variable name",
                    var.name
                )));
            }
            let value = match &var.data {
                MatData::Single(v) => MatlabType::from(v.clone()),
                MatData::Double(v) => MatlabType::from(v.clone()),
                MatData::Integer(v) => MatlabType::from(v.clone()),
                MatData::Char(rows) => MatlabType::UTF8(char_column_major(rows, &var.dims)),
                MatData::Unsupported(class) => {
                    return Err(PrepError::Mat(format!(
                        "cannot write {class} variable '{}'",
                        var.name
                    )))
                }
            };
            let array = NumericArray::new(var.dims.clone(), value, None)?;
            file.insert(&var.name, matrw::MatVariable::NumericArray(array));
        }
        Ok(file)
    }
}

fn utf8_path(path: &Path) -> AppResult<&str> {
    path.to_str()
        .ok_or_else(|| PrepError::Mat(format!("{} is not a UTF-8 path", path.display())))
}

const KEYWORDS: [&str; 20] = [
    "break", "case", "catch", "classdef", "continue", "else", "elseif", "end", "for", "function",
    "global", "if", "otherwise", "parfor", "persistent", "return", "spmd", "switch", "try",
    "while",
];

/// MATLAB identifier rules: a letter, then letters, digits or `_`, at most
/// 63 characters, and not a keyword.
fn is_valid_name(name: &str) -> bool {
    if KEYWORDS.contains(&name) {
        return false;
    }
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 63
}

/// Product of `dims`, `None` if it overflows.
fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1_usize, |acc, &d| acc.checked_mul(d))
}

fn view(name: &str, var: &matrw::MatVariable) -> AppResult<MatVariable> {
    let (dims, data) = match var {
        matrw::MatVariable::NumericArray(array) => (array.dim.clone(), numeric(name, array)?),
        matrw::MatVariable::SparseArray(_) => (Vec::new(), unsupported("sparse")),
        matrw::MatVariable::StructureArray(_) | matrw::MatVariable::Structure(_) => {
            (Vec::new(), unsupported("struct"))
        }
        matrw::MatVariable::CellArray(_) => (Vec::new(), unsupported("cell")),
        _ => (Vec::new(), unsupported("unknown")),
    };
    Ok(MatVariable {
        name: name.to_string(),
        dims,
        data,
    })
}

fn unsupported(class: &str) -> MatData {
    MatData::Unsupported(class.to_string())
}

fn numeric(name: &str, array: &NumericArray) -> AppResult<MatData> {
    let count = element_count(&array.dim).ok_or_else(|| {
        PrepError::Mat(format!("'{name}': dimensions {:?} overflow", array.dim))
    })?;
    if count != array.value.len() {
        return Err(PrepError::Mat(format!(
            "'{name}': dimensions {:?} do not match {} elements",
            array.dim,
            array.value.len()
        )));
    }
    if array.is_complex() {
        return Ok(unsupported("complex"));
    }

    let data = match &array.value {
        MatlabType::F32(v) => MatData::Single(v.clone()),
        MatlabType::F64(v) => MatData::Double(v.clone()),
        MatlabType::I8(v) => MatData::Integer(v.iter().map(|&x| i64::from(x)).collect()),
        MatlabType::U8(v) => MatData::Integer(v.iter().map(|&x| i64::from(x)).collect()),
        MatlabType::I16(v) => MatData::Integer(v.iter().map(|&x| i64::from(x)).collect()),
        MatlabType::U16(v) => MatData::Integer(v.iter().map(|&x| i64::from(x)).collect()),
        MatlabType::I32(v) => MatData::Integer(v.iter().map(|&x| i64::from(x)).collect()),
        MatlabType::U32(v) => MatData::Integer(v.iter().map(|&x| i64::from(x)).collect()),
        MatlabType::I64(v) => MatData::Integer(v.clone()),
        MatlabType::U64(v) => match v.iter().map(|&x| i64::try_from(x)).collect::<Result<Vec<_>, _>>() {
            Ok(values) => MatData::Integer(values),
            Err(_) => unsupported("uint64"),
        },
        MatlabType::UTF8(chars) | MatlabType::UTF16(chars) => {
            MatData::Char(char_rows(&array.dim, chars))
        }
        MatlabType::BOOL(_) => unsupported("logical"),
    };
    Ok(data)
}

/// Lays `rows` out column-major, padding short rows with spaces.
fn char_column_major(rows: &[String], dims: &[usize]) -> Vec<char> {
    let width = dims.get(1).copied().unwrap_or(0);
    let padded: Vec<Vec<char>> = rows
        .iter()
        .map(|r| {
            let mut chars: Vec<char> = r.chars().collect();
            chars.resize(width, ' ');
            chars
        })
        .collect();
    (0..width)
        .flat_map(|col| padded.iter().map(move |row| row[col]))
        .collect()
}

/// Splits a column-major char matrix back into trimmed rows.
fn char_rows(dims: &[usize], chars: &[char]) -> Vec<String> {
    let rows = dims.first().copied().unwrap_or(0);
    if rows == 0 {
        return Vec::new();
    }
    let cols = chars.len() / rows;
    (0..rows)
        .map(|r| {
            let row: String = (0..cols).map(|c| chars[c * rows + r]).collect();
            row.trim_end_matches([' ', '\0']).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> MatFile {
        MatFile::new()
            .with_single_row("ecg", &[0.5, -0.25, 1.0])
            .with_single_row("pcg", &[1.0, -1.0, 0.0])
            .with_double_scalar("fs", 2000.0)
            .with_char_rows("channels", &["PCG".to_string(), "ECG".to_string()])
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a0001.mat");
        sample_file().write(&path, false).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"MATLAB 5.0 MAT-file"));
        assert_eq!(&bytes[126..128], b"IM");

        let decoded = MatFile::read(&path).unwrap();
        let ecg = decoded.get("ecg").unwrap();
        assert_eq!(ecg.dims, vec![1, 3]);
        assert_eq!(ecg.data, MatData::Single(vec![0.5, -0.25, 1.0]));
        assert_eq!(decoded.get("fs").and_then(MatVariable::scalar), Some(2000.0));
        assert_eq!(decoded, sample_file());
    }

    #[test]
    fn test_compressed_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.mat");
        let packed = dir.path().join("packed.mat");
        let signal: Vec<f32> = vec![0.25; 4096];
        let file = MatFile::new()
            .with_single_row("pcg", &signal)
            .with_double_scalar("fs", 2000.0);
        file.write(&plain, false).unwrap();
        file.write(&packed, true).unwrap();

        let plain_len = std::fs::metadata(&plain).unwrap().len();
        let packed_len = std::fs::metadata(&packed).unwrap().len();
        assert!(packed_len < plain_len);

        let decoded = MatFile::read(&packed).unwrap();
        assert_eq!(decoded.get("pcg").and_then(MatVariable::to_f64).map(|v| v.len()), Some(4096));
        assert_eq!(decoded.get("fs").and_then(MatVariable::scalar), Some(2000.0));
    }

    #[test]
    fn test_integer_class_widens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int.mat");
        MatFile::new()
            .with_int_scalar("fs", 2000)
            .write(&path, false)
            .unwrap();

        let decoded = MatFile::read(&path).unwrap();
        let fs = decoded.get("fs").unwrap();
        assert_eq!(fs.data, MatData::Integer(vec![2000]));
        assert_eq!(fs.scalar(), Some(2000.0));
        assert_eq!(fs.to_f64(), Some(vec![2000.0]));
    }

    #[test]
    fn test_char_matrix_round_trips_padded_rows() {
        let rows = vec!["AB".to_string(), "C".to_string()];
        assert_eq!(char_column_major(&rows, &[2, 2]), vec!['A', 'C', 'B', ' ']);
        assert_eq!(char_rows(&[2, 2], &['A', 'C', 'B', ' ']), rows);
        assert!(char_rows(&[0, 0], &[]).is_empty());
    }

    #[test]
    fn test_garbage_and_missing_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.mat");
        std::fs::write(&garbage, b"not a mat file").unwrap();
        assert!(MatFile::read(&garbage).is_err());

        let missing = dir.path().join("missing.mat");
        assert!(matches!(
            MatFile::read(&missing),
            Err(PrepError::MissingInput(_))
        ));
    }

    #[test]
    fn test_element_count_checks_overflow() {
        assert_eq!(element_count(&[1, 40_000]), Some(40_000));
        assert_eq!(element_count(&[]), Some(1));
        let huge = i32::MAX as usize;
        assert_eq!(element_count(&[huge, huge, huge]), None);
    }

    #[test]
    fn test_invalid_names_are_rejected_before_writing() {
        assert!(is_valid_name("fs_ecg"));
        assert!(!is_valid_name("1fs"));
        assert!(!is_valid_name("fs-ecg"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("end"));

        let dir = tempfile::tempdir().unwrap();
        let file = MatFile::new().with_double_scalar("bad name", 1.0);
        assert!(file.write(&dir.path().join("x.mat"), false).is_err());
    }

    #[test]
    fn test_to_f64_widening() {
        let file = sample_file();
        assert_eq!(
            file.get("pcg").and_then(MatVariable::to_f64),
            Some(vec![1.0, -1.0, 0.0])
        );
        assert!(file.get("channels").and_then(MatVariable::to_f64).is_none());
    }
}
