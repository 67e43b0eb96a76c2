//! Trace builder: fills trace templates from column data

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray, UInt32Array,
};
use serde_json::Value;

use pb_core::data::{ColumnShape, ColumnSource};

use crate::DataError;

/// Whether a build produces a full trace or an incremental update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Full reconstruction of the trace
    Full,
    /// Incremental update: 1-D results for top-level fields are wrapped
    /// in a single-element sequence
    Update,
}

/// Build one concrete trace from a template and its paired column source.
///
/// Each column name is a dot-path into the cloned template. Columns with
/// a 2-D shape are reshaped row-major into `rows` slices of length `cols`
/// before assignment. Missing intermediate path segments are an error.
pub fn build_trace(
    template: &Value,
    source: &dyn ColumnSource,
    mode: BuildMode,
) -> Result<Value, DataError> {
    if !template.is_object() {
        return Err(DataError::TemplateNotObject);
    }
    let mut trace = template.clone();

    for column in source.columns() {
        let shape = source
            .shape(&column)
            .ok_or_else(|| DataError::MissingColumn { column: column.clone() })?;
        let array = source
            .values(&column)
            .ok_or_else(|| DataError::MissingColumn { column: column.clone() })?;
        let flat = array_values(array.as_ref(), &column)?;

        let mut value = match shape {
            ColumnShape::OneD(_) => Value::Array(flat),
            ColumnShape::TwoD { rows, cols } => {
                if flat.len() != rows * cols {
                    return Err(DataError::ShapeMismatch {
                        column: column.clone(),
                        rows,
                        cols,
                        expected: rows * cols,
                        actual: flat.len(),
                    });
                }
                if cols == 0 {
                    Value::Array(vec![Value::Array(Vec::new()); rows])
                } else {
                    Value::Array(
                        flat.chunks(cols)
                            .map(|row| Value::Array(row.to_vec()))
                            .collect(),
                    )
                }
            }
        };

        // Update payloads for top-level fields go through a one-element
        // wrapping sequence
        if mode == BuildMode::Update && !column.contains('.') {
            value = Value::Array(vec![value]);
        }

        assign_path(&mut trace, &column, value)?;
    }
    tracing::trace!(source = source.source_name(), "built trace from column data");

    Ok(trace)
}

/// Convert a flat Arrow array into JSON values, null slots included
pub fn array_values(array: &dyn Array, column: &str) -> Result<Vec<Value>, DataError> {
    let any = array.as_any();
    let values = if let Some(floats) = any.downcast_ref::<Float64Array>() {
        collect(floats.len(), |i| floats.is_null(i), |i| Value::from(floats.value(i)))
    } else if let Some(floats) = any.downcast_ref::<Float32Array>() {
        collect(floats.len(), |i| floats.is_null(i), |i| {
            Value::from(floats.value(i) as f64)
        })
    } else if let Some(ints) = any.downcast_ref::<Int64Array>() {
        collect(ints.len(), |i| ints.is_null(i), |i| Value::from(ints.value(i)))
    } else if let Some(ints) = any.downcast_ref::<Int32Array>() {
        collect(ints.len(), |i| ints.is_null(i), |i| Value::from(ints.value(i)))
    } else if let Some(ints) = any.downcast_ref::<UInt32Array>() {
        collect(ints.len(), |i| ints.is_null(i), |i| Value::from(ints.value(i)))
    } else if let Some(strings) = any.downcast_ref::<StringArray>() {
        collect(strings.len(), |i| strings.is_null(i), |i| {
            Value::from(strings.value(i))
        })
    } else if let Some(bools) = any.downcast_ref::<BooleanArray>() {
        collect(bools.len(), |i| bools.is_null(i), |i| Value::from(bools.value(i)))
    } else {
        return Err(DataError::UnsupportedType {
            column: column.to_string(),
            data_type: array.data_type().to_string(),
        });
    };
    Ok(values)
}

fn collect(
    len: usize,
    is_null: impl Fn(usize) -> bool,
    value_at: impl Fn(usize) -> Value,
) -> Vec<Value> {
    (0..len)
        .map(|i| if is_null(i) { Value::Null } else { value_at(i) })
        .collect()
}

/// Assign `value` at the dot-path `column` inside the trace, failing fast
/// when an intermediate segment is absent or not an object
fn assign_path(trace: &mut Value, column: &str, value: Value) -> Result<(), DataError> {
    let segments: Vec<&str> = column.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(parts) => parts,
        None => return Ok(()),
    };

    let mut node = &mut *trace;
    for segment in parents {
        let object = node
            .as_object_mut()
            .ok_or_else(|| DataError::InvalidPathSegment {
                column: column.to_string(),
                segment: segment.to_string(),
            })?;
        node = object
            .get_mut(*segment)
            .ok_or_else(|| DataError::MissingPathSegment {
                column: column.to_string(),
                segment: segment.to_string(),
            })?;
    }

    node.as_object_mut()
        .ok_or_else(|| DataError::InvalidPathSegment {
            column: column.to_string(),
            segment: (*last).to_string(),
        })?
        .insert((*last).to_string(), value);
    Ok(())
}
