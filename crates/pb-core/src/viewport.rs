//! Viewport mapping between axis-range keys and displayed ranges

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::event::UPDATE_FROM_PROPERTY;

/// Policy controlling when engine-originated viewport changes are written
/// back to the viewport property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportUpdatePolicy {
    /// Write on every change, unthrottled
    Continuous,
    /// Only commit once dragging ends
    Mouseup,
    /// Any other policy string coalesces updates through a throttle
    Throttled,
}

impl Default for ViewportUpdatePolicy {
    fn default() -> Self {
        ViewportUpdatePolicy::Mouseup
    }
}

// Unrecognized policy strings fall back to the throttled strategy
impl<'de> Deserialize<'de> for ViewportUpdatePolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let policy = String::deserialize(deserializer)?;
        Ok(match policy.as_str() {
            "continuous" => ViewportUpdatePolicy::Continuous,
            "mouseup" => ViewportUpdatePolicy::Mouseup,
            _ => ViewportUpdatePolicy::Throttled,
        })
    }
}

/// Mapping from axis-range key (`"<x|y>axis<N>.range"`) to a `[min, max]`
/// range. Iteration order is insertion order, which is the order the
/// reconciler scans when applying an external viewport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Viewport {
    ranges: IndexMap<String, [f64; 2]>,
}

impl Viewport {
    /// Create an empty viewport
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Set the range for one axis-range key
    pub fn insert(&mut self, key: impl Into<String>, range: [f64; 2]) {
        self.ranges.insert(key.into(), range);
    }

    pub fn get(&self, key: &str) -> Option<[f64; 2]> {
        self.ranges.get(key).copied()
    }

    /// Iterate keys and ranges in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &[f64; 2])> {
        self.ranges.iter()
    }

    /// Derive the displayed viewport from an engine full-layout object.
    ///
    /// Picks up every layout key whose first five characters are `xaxis`
    /// or `yaxis` and that carries a two-element numeric `range`.
    pub fn from_full_layout(layout: &Value) -> Self {
        let mut ranges = IndexMap::new();
        if let Some(object) = layout.as_object() {
            for (key, axis) in object {
                let prefix = key.get(..5);
                if prefix != Some("xaxis") && prefix != Some("yaxis") {
                    continue;
                }
                if let Some(range) = axis.get("range").and_then(as_range_pair) {
                    ranges.insert(format!("{key}.range"), range);
                }
            }
        }
        Self { ranges }
    }

    /// Look up the current range for an axis-range key inside a full
    /// layout, walking the key as a dot-path.
    pub fn range_in_layout(layout: &Value, key: &str) -> Option<[f64; 2]> {
        let mut node = layout;
        for segment in key.split('.') {
            node = node.get(segment)?;
        }
        as_range_pair(node)
    }

    /// First key whose range differs from the one the layout currently
    /// displays, in insertion order. `None` means the viewport is already
    /// applied.
    pub fn first_mismatch(&self, layout: &Value) -> Option<&str> {
        self.ranges
            .iter()
            .find(|(key, range)| Self::range_in_layout(layout, key) != Some(**range))
            .map(|(key, _)| key.as_str())
    }

    /// Build the relayout patch that applies this viewport: every range
    /// plus the internal update-from-property marker.
    pub fn to_relayout_patch(&self) -> Value {
        let mut patch = Map::new();
        for (key, [min, max]) in &self.ranges {
            patch.insert(key.clone(), serde_json::json!([min, max]));
        }
        patch.insert(UPDATE_FROM_PROPERTY.to_string(), Value::Bool(true));
        Value::Object(patch)
    }
}

fn as_range_pair(value: &Value) -> Option<[f64; 2]> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    Some([items[0].as_f64()?, items[1].as_f64()?])
}
