//! Interaction event payload sanitization
//!
//! Raw engine payloads reference the full trace data and layout, which
//! are far too large to republish as properties. This module reduces
//! them to a flat, serialization-safe form.

use serde_json::{Map, Value};

use pb_core::{EventKind, INTERNAL_FIELD_PREFIX};

/// Reduce a raw interaction payload to its published form.
///
/// Point events (`click`/`hover`/`selected`) keep only scalar point
/// fields, pull the matching `customdata` entry down from the current
/// traces and pass `pointNumbers` through verbatim; an absent payload
/// yields `None` ("no selection"). `relayout`/`restyle` payloads are
/// already small and are shallow-copied verbatim. `range` and
/// `lassoPoints` survive for every kind. Internal marker fields never
/// reach the result.
pub fn filter_event_data(
    current_traces: &[Value],
    raw: Option<&Value>,
    kind: EventKind,
) -> Option<Value> {
    let raw = match raw {
        Some(Value::Null) | None => return None,
        Some(payload) => payload,
    };

    let mut result = Map::new();

    match kind {
        EventKind::Click | EventKind::Hover | EventKind::Selected => {
            let raw_points = raw
                .get("points")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut points = Vec::with_capacity(raw_points.len());
            for full_point in raw_points {
                points.push(Value::Object(filter_point(current_traces, full_point)));
            }
            result.insert("points".to_string(), Value::Array(points));
        }
        EventKind::Relayout | EventKind::Restyle => {
            // Verbatim shallow copy; suppression of self-triggered
            // relayouts happens before this function is called
            if let Some(fields) = raw.as_object() {
                for (key, value) in fields {
                    result.insert(key.clone(), value.clone());
                }
            }
        }
        EventKind::ClickAnnotation => {
            if let Some(fields) = raw.as_object() {
                for (key, value) in fields {
                    if key == "event" || key == "fullAnnotation" {
                        continue;
                    }
                    result.insert(key.clone(), value.clone());
                }
            }
        }
        _ => {}
    }

    if let Some(range) = raw.get("range") {
        result.insert("range".to_string(), range.clone());
    }
    if let Some(lasso) = raw.get("lassoPoints") {
        result.insert("lassoPoints".to_string(), lasso.clone());
    }

    result.retain(|key, _| !key.starts_with(INTERNAL_FIELD_PREFIX));
    Some(Value::Object(result))
}

/// Copy the scalar fields of one point record, attaching `customdata`
/// from the referenced trace when the point indexes one
fn filter_point(current_traces: &[Value], full_point: &Value) -> Map<String, Value> {
    let mut point = Map::new();
    let Some(fields) = full_point.as_object() else {
        return point;
    };

    for (key, value) in fields {
        if is_scalar(value) {
            point.insert(key.clone(), value.clone());
        }
    }

    let curve = fields.get("curveNumber").and_then(Value::as_u64);
    let index = fields.get("pointNumber").and_then(Value::as_u64);
    if let (Some(curve), Some(index)) = (curve, index) {
        let customdata = current_traces
            .get(curve as usize)
            .and_then(|trace| trace.get("customdata"))
            .and_then(Value::as_array);
        if let Some(value) = customdata.and_then(|data| data.get(index as usize)) {
            point.insert("customdata".to_string(), value.clone());
        }
    }

    // Multi-point aggregation (histogram bins) is copied verbatim
    if let Some(numbers) = fields.get("pointNumbers") {
        point.insert("pointNumbers".to_string(), numbers.clone());
    }

    point
}

fn is_scalar(value: &Value) -> bool {
    !value.is_array() && !value.is_object()
}
