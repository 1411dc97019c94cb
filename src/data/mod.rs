//! On-disk data formats: the MAT record container and CSV label tables.

pub mod labels;
pub mod mat;

pub use labels::{ClassBalance, LabelRow, LabelTable, SegmentRow, SegmentTable};
pub use mat::{MatData, MatFile, MatVariable};
