//! Property store implementation

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{EventOutput, PlotProperty, PropertySubscriber};
use crate::data::ColumnSource;
use crate::viewport::{Viewport, ViewportUpdatePolicy};

/// Property state stored internally
struct PropertyState {
    data: Vec<Value>,
    layout: Value,
    config: Value,
    data_sources: Vec<Arc<dyn ColumnSource>>,
    relayout_data: Option<Value>,
    restyle_data: Option<Value>,
    click_data: Option<Value>,
    hover_data: Option<Value>,
    selected_data: Option<Value>,
    clickannotation_data: Option<Value>,
    viewport: Viewport,
    viewport_update_policy: ViewportUpdatePolicy,
    viewport_update_throttle: u64,
    render_count: u64,
}

impl Default for PropertyState {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            layout: Value::Object(Map::new()),
            config: Value::Object(Map::new()),
            data_sources: Vec::new(),
            relayout_data: None,
            restyle_data: None,
            click_data: None,
            hover_data: None,
            selected_data: None,
            clickannotation_data: None,
            viewport: Viewport::new(),
            viewport_update_policy: ViewportUpdatePolicy::default(),
            viewport_update_throttle: 200,
            render_count: 0,
        }
    }
}

/// The reactive property store backing one bridge component instance.
///
/// Setters notify registered subscribers synchronously, in mutation
/// order; subscribers are held weakly and pruned once dropped.
pub struct PropertyStore {
    state: RwLock<PropertyState>,
    subscribers: RwLock<Vec<Weak<dyn PropertySubscriber>>>,
}

impl PropertyStore {
    /// Create a store with all properties at their defaults
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PropertyState::default()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Add a subscriber
    pub fn add_subscriber(&self, subscriber: Arc<dyn PropertySubscriber>) {
        let mut subscribers = self.subscribers.write();
        subscribers.push(Arc::downgrade(&subscriber));
    }

    pub fn data(&self) -> Vec<Value> {
        self.state.read().data.clone()
    }

    pub fn set_data(&self, data: Vec<Value>) {
        self.state.write().data = data;
        self.notify_subscribers(PlotProperty::Data);
    }

    pub fn layout(&self) -> Value {
        self.state.read().layout.clone()
    }

    pub fn set_layout(&self, layout: Value) {
        self.state.write().layout = layout;
        self.notify_subscribers(PlotProperty::Layout);
    }

    pub fn config(&self) -> Value {
        self.state.read().config.clone()
    }

    pub fn set_config(&self, config: Value) {
        self.state.write().config = config;
        self.notify_subscribers(PlotProperty::Config);
    }

    /// Data sources positionally paired with `data`
    pub fn data_sources(&self) -> Vec<Arc<dyn ColumnSource>> {
        self.state.read().data_sources.clone()
    }

    pub fn set_data_sources(&self, sources: Vec<Arc<dyn ColumnSource>>) {
        self.state.write().data_sources = sources;
        self.notify_subscribers(PlotProperty::DataSources);
    }

    /// Get a published event-data property
    pub fn event_data(&self, output: EventOutput) -> Option<Value> {
        let state = self.state.read();
        match output {
            EventOutput::Relayout => state.relayout_data.clone(),
            EventOutput::Restyle => state.restyle_data.clone(),
            EventOutput::Click => state.click_data.clone(),
            EventOutput::Hover => state.hover_data.clone(),
            EventOutput::Selected => state.selected_data.clone(),
            EventOutput::ClickAnnotation => state.clickannotation_data.clone(),
        }
    }

    /// Publish an event-data property (`None` signals "no selection")
    pub fn set_event_data(&self, output: EventOutput, value: Option<Value>) {
        {
            let mut state = self.state.write();
            match output {
                EventOutput::Relayout => state.relayout_data = value,
                EventOutput::Restyle => state.restyle_data = value,
                EventOutput::Click => state.click_data = value,
                EventOutput::Hover => state.hover_data = value,
                EventOutput::Selected => state.selected_data = value,
                EventOutput::ClickAnnotation => state.clickannotation_data = value,
            }
        }
        self.notify_subscribers(output.property());
    }

    pub fn viewport(&self) -> Viewport {
        self.state.read().viewport.clone()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.state.write().viewport = viewport;
        self.notify_subscribers(PlotProperty::Viewport);
    }

    pub fn viewport_update_policy(&self) -> ViewportUpdatePolicy {
        self.state.read().viewport_update_policy
    }

    pub fn set_viewport_update_policy(&self, policy: ViewportUpdatePolicy) {
        self.state.write().viewport_update_policy = policy;
        self.notify_subscribers(PlotProperty::ViewportUpdatePolicy);
    }

    /// Throttle period in milliseconds
    pub fn viewport_update_throttle(&self) -> u64 {
        self.state.read().viewport_update_throttle
    }

    pub fn set_viewport_update_throttle(&self, millis: u64) {
        self.state.write().viewport_update_throttle = millis;
        self.notify_subscribers(PlotProperty::ViewportUpdateThrottle);
    }

    pub fn render_count(&self) -> u64 {
        self.state.read().render_count
    }

    /// Bump the internal render counter to force a re-render without any
    /// other change
    pub fn bump_render_count(&self) {
        self.state.write().render_count += 1;
        self.notify_subscribers(PlotProperty::RenderCount);
    }

    /// Notify all subscribers of a property change
    fn notify_subscribers(&self, property: PlotProperty) {
        tracing::trace!(?property, "property changed");
        // Snapshot outside the lock so handlers can set properties
        let snapshot: Vec<Weak<dyn PropertySubscriber>> = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.clone()
        };

        for weak in snapshot {
            if let Some(subscriber) = weak.upgrade() {
                subscriber.on_property_change(property);
            }
        }
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<PlotProperty>>,
    }

    impl PropertySubscriber for Recorder {
        fn on_property_change(&self, property: PlotProperty) {
            self.seen.lock().push(property);
        }
    }

    #[test]
    fn setters_notify_in_mutation_order() {
        let store = PropertyStore::new();
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });
        store.add_subscriber(recorder.clone());

        store.set_layout(serde_json::json!({ "title": "t" }));
        store.set_data(vec![serde_json::json!({ "type": "scatter" })]);
        store.bump_render_count();

        assert_eq!(
            *recorder.seen.lock(),
            vec![PlotProperty::Layout, PlotProperty::Data, PlotProperty::RenderCount]
        );
        assert_eq!(store.render_count(), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let store = PropertyStore::new();
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });
        store.add_subscriber(recorder.clone());
        drop(recorder);

        // Must not panic, and the dead entry goes away
        store.set_config(serde_json::json!({}));
        assert!(store.subscribers.read().is_empty());
    }

    #[test]
    fn defaults_match_component_surface() {
        let store = PropertyStore::new();
        assert!(store.data().is_empty());
        assert!(store.viewport().is_empty());
        assert_eq!(store.viewport_update_policy(), ViewportUpdatePolicy::Mouseup);
        assert_eq!(store.viewport_update_throttle(), 200);
        assert_eq!(store.event_data(EventOutput::Click), None);
    }
}
