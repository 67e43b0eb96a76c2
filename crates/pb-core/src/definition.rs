//! Serializable plot definition

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::properties::PropertyStore;
use crate::viewport::ViewportUpdatePolicy;

/// A complete declarative plot configuration that can be stored on disk
/// and applied to a property store in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotDefinition {
    /// Trace templates, positionally paired with data sources at apply
    /// time
    #[serde(default)]
    pub data: Vec<Value>,

    /// Chart layout mapping
    #[serde(default = "empty_object")]
    pub layout: Value,

    /// Engine configuration mapping
    #[serde(default = "empty_object")]
    pub config: Value,

    #[serde(default)]
    pub viewport_update_policy: ViewportUpdatePolicy,

    /// Throttle period in milliseconds
    #[serde(default = "default_throttle")]
    pub viewport_update_throttle: u64,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_throttle() -> u64 {
    200
}

impl Default for PlotDefinition {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            layout: empty_object(),
            config: empty_object(),
            viewport_update_policy: ViewportUpdatePolicy::default(),
            viewport_update_throttle: default_throttle(),
        }
    }
}

impl PlotDefinition {
    /// Parse a definition from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply every field to the given store. The data templates go last
    /// so the render they trigger sees the final layout and config.
    pub fn apply_to(&self, store: &PropertyStore) {
        store.set_viewport_update_policy(self.viewport_update_policy);
        store.set_viewport_update_throttle(self.viewport_update_throttle);
        store.set_config(self.config.clone());
        store.set_layout(self.layout.clone());
        store.set_data(self.data.clone());
    }
}
