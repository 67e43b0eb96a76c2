//! Columnar data sources and trace building for the chart bridge

pub mod sources;
pub mod trace;

use thiserror::Error;

// Re-exports
pub use sources::MemorySource;
pub use trace::{build_trace, BuildMode};

/// Errors that can occur while building traces from column data
#[derive(Error, Debug)]
pub enum DataError {
    #[error("column '{column}' has no backing array")]
    MissingColumn { column: String },

    #[error("column '{column}': template has no path segment '{segment}'")]
    MissingPathSegment { column: String, segment: String },

    #[error("column '{column}': path segment '{segment}' is not an object")]
    InvalidPathSegment { column: String, segment: String },

    #[error("column '{column}': shape {rows}x{cols} needs {expected} values, got {actual}")]
    ShapeMismatch {
        column: String,
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column '{column}' has unsupported array type {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("trace template must be a JSON object")]
    TemplateNotObject,
}
