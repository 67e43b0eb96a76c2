//! In-memory column source

use arrow::array::ArrayRef;
use indexmap::IndexMap;

use pb_core::data::{ColumnShape, ColumnSource};

/// A column entry: flat backing array plus shape metadata
struct ColumnEntry {
    array: ArrayRef,
    shape: ColumnShape,
}

/// Column source backed by in-memory Arrow arrays.
///
/// Columns are keyed by dot-path into the paired trace template and kept
/// in insertion order.
pub struct MemorySource {
    name: String,
    columns: IndexMap<String, ColumnEntry>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
        }
    }

    /// Add a 1-D column
    pub fn with_column(mut self, column: impl Into<String>, array: ArrayRef) -> Self {
        let shape = ColumnShape::OneD(array.len());
        self.columns.insert(column.into(), ColumnEntry { array, shape });
        self
    }

    /// Add a matrix-valued column stored row-major in `array`. The length
    /// check happens when the trace is built.
    pub fn with_matrix_column(
        mut self,
        column: impl Into<String>,
        array: ArrayRef,
        rows: usize,
        cols: usize,
    ) -> Self {
        let shape = ColumnShape::TwoD { rows, cols };
        self.columns.insert(column.into(), ColumnEntry { array, shape });
        self
    }
}

impl ColumnSource for MemorySource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    fn shape(&self, column: &str) -> Option<ColumnShape> {
        self.columns.get(column).map(|entry| entry.shape)
    }

    fn values(&self, column: &str) -> Option<ArrayRef> {
        self.columns.get(column).map(|entry| entry.array.clone())
    }
}
