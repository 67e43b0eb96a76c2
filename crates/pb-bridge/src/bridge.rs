//! The bridge component: rendering, viewport reconciliation and event
//! republishing
//!
//! Reentrancy is handled with per-instance boolean flags rather than
//! locks: the runtime is callback-driven and the only suspension point
//! is the outer render call, which the `rendering` flag spans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;

use pb_core::{
    EventKind, EventOutput, PlotProperty, PropertyStore, PropertySubscriber, Viewport,
    ViewportUpdatePolicy, UPDATE_FROM_PROPERTY,
};
use pb_data::{build_trace, BuildMode};

use crate::engine::RenderEngine;
use crate::sanitize::filter_event_data;
use crate::throttle::{Deliver, Throttle};

/// How engine-derived viewports reach the viewport property
enum ViewportSetter {
    /// Guarded assignment on every call
    Immediate,
    /// Guarded assignment behind a leading+trailing throttle
    Throttled(Throttle),
}

/// Bridge component instance tying one property store to one rendering
/// engine.
pub struct PlotBridge {
    engine: Arc<dyn RenderEngine>,
    props: Arc<PropertyStore>,
    runtime: Handle,
    weak_self: Weak<PlotBridge>,

    /// Concrete traces from the last render, for event cross-referencing
    current_traces: Mutex<Vec<Value>>,

    /// Spans the asynchronous render, set before the engine call and
    /// cleared after completion handling
    rendering: AtomicBool,
    /// Set while an external viewport is being pushed to the engine
    applying_viewport: AtomicBool,
    /// Set while the setter assigns the viewport property
    setting_viewport: AtomicBool,
    /// One-shot: listeners are installed after the first successful
    /// render only
    listeners_installed: AtomicBool,

    setter: Mutex<ViewportSetter>,
}

impl PlotBridge {
    /// Create a bridge and register it for property changes
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        props: Arc<PropertyStore>,
        runtime: Handle,
    ) -> Arc<Self> {
        let bridge = Arc::new_cyclic(|weak| Self {
            engine,
            props: props.clone(),
            runtime,
            weak_self: weak.clone(),
            current_traces: Mutex::new(Vec::new()),
            rendering: AtomicBool::new(false),
            applying_viewport: AtomicBool::new(false),
            setting_viewport: AtomicBool::new(false),
            listeners_installed: AtomicBool::new(false),
            setter: Mutex::new(ViewportSetter::Immediate),
        });
        bridge.rebuild_viewport_setter();
        props.add_subscriber(bridge.clone());
        bridge
    }

    pub fn properties(&self) -> &Arc<PropertyStore> {
        &self.props
    }

    /// Build all traces and issue a full render.
    ///
    /// On completion the setter is rebuilt, the engine-displayed viewport
    /// is re-derived and published if different, and on the very first
    /// completion the interaction listeners are installed.
    pub async fn render(&self) -> anyhow::Result<()> {
        let templates = self.props.data();
        let sources = self.props.data_sources();

        let mut traces = Vec::with_capacity(templates.len());
        for (index, template) in templates.iter().enumerate() {
            let trace = match sources.get(index) {
                Some(source) => build_trace(template, source.as_ref(), BuildMode::Full)?,
                None => template.clone(),
            };
            traces.push(trace);
        }
        tracing::debug!(traces = traces.len(), "issuing full render");
        *self.current_traces.lock() = traces.clone();

        self.rendering.store(true, Ordering::SeqCst);
        let result = self
            .engine
            .render(traces, self.props.layout(), self.props.config())
            .await;
        if let Err(error) = result {
            self.rendering.store(false, Ordering::SeqCst);
            return Err(error);
        }

        self.rebuild_viewport_setter();
        self.publish_viewport_from_engine();
        if !self.listeners_installed.swap(true, Ordering::SeqCst) {
            self.install_listeners();
        }
        self.rendering.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Push the viewport property to the engine when it differs from the
    /// displayed ranges. One relayout per change, carrying the whole
    /// mapping plus the update-from-property marker.
    fn apply_viewport_from_property(&self) {
        if self.rendering.load(Ordering::SeqCst)
            || self.applying_viewport.load(Ordering::SeqCst)
            || self.setting_viewport.load(Ordering::SeqCst)
        {
            return;
        }
        let viewport = self.props.viewport();
        if viewport.is_empty() {
            return;
        }

        let layout = self.engine.full_layout();
        let Some(key) = viewport.first_mismatch(&layout) else {
            return;
        };
        tracing::debug!(key, "viewport differs from displayed ranges, relayouting");

        self.applying_viewport.store(true, Ordering::SeqCst);
        if let Err(error) = self.engine.relayout(viewport.to_relayout_patch()) {
            tracing::warn!("relayout failed: {error}");
        }
        self.applying_viewport.store(false, Ordering::SeqCst);
    }

    /// Derive the displayed viewport from the engine's full layout and
    /// publish it through the configured setter if it changed
    fn publish_viewport_from_engine(&self) {
        let derived = Viewport::from_full_layout(&self.engine.full_layout());
        if derived != self.props.viewport() {
            self.set_viewport_via_setter(derived);
        }
    }

    fn set_viewport_via_setter(&self, viewport: Viewport) {
        let setter = self.setter.lock();
        match &*setter {
            ViewportSetter::Immediate => {
                drop(setter);
                self.assign_viewport(viewport);
            }
            ViewportSetter::Throttled(throttle) => throttle.call(&self.runtime, viewport),
        }
    }

    /// The guarded assignment both setter strategies funnel through
    fn assign_viewport(&self, viewport: Viewport) {
        if self.setting_viewport.swap(true, Ordering::SeqCst) {
            return;
        }
        self.props.set_viewport(viewport);
        self.setting_viewport.store(false, Ordering::SeqCst);
    }

    /// Rebuild the setter closure from the current policy and throttle
    /// period
    fn rebuild_viewport_setter(&self) {
        let setter = match self.props.viewport_update_policy() {
            ViewportUpdatePolicy::Continuous | ViewportUpdatePolicy::Mouseup => {
                ViewportSetter::Immediate
            }
            ViewportUpdatePolicy::Throttled => {
                let weak = self.weak_self.clone();
                let deliver: Deliver = Arc::new(move |viewport| {
                    if let Some(bridge) = weak.upgrade() {
                        bridge.assign_viewport(viewport);
                    }
                });
                ViewportSetter::Throttled(Throttle::new(
                    self.props.viewport_update_throttle(),
                    deliver,
                ))
            }
        };
        *self.setter.lock() = setter;
    }

    fn current_traces(&self) -> Vec<Value> {
        self.current_traces.lock().clone()
    }

    /// Install the interaction event listeners. Called exactly once per
    /// component lifetime.
    fn install_listeners(&self) {
        let weak = self.weak_self.clone();
        self.engine.on(
            EventKind::Relayout,
            Box::new(move |payload| {
                let Some(bridge) = weak.upgrade() else { return };
                let self_triggered = payload
                    .as_ref()
                    .and_then(|p| p.get(UPDATE_FROM_PROPERTY))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if self_triggered {
                    return;
                }
                let filtered =
                    filter_event_data(&bridge.current_traces(), payload.as_ref(), EventKind::Relayout);
                bridge.props.set_event_data(EventOutput::Relayout, filtered);
                bridge.publish_viewport_from_engine();
            }),
        );

        let weak = self.weak_self.clone();
        self.engine.on(
            EventKind::Relayouting,
            Box::new(move |_payload| {
                let Some(bridge) = weak.upgrade() else { return };
                // Drag-in-progress updates only count outside mouseup
                if bridge.props.viewport_update_policy() != ViewportUpdatePolicy::Mouseup {
                    bridge.publish_viewport_from_engine();
                }
            }),
        );

        let weak = self.weak_self.clone();
        self.engine.on(
            EventKind::Restyle,
            Box::new(move |payload| {
                let Some(bridge) = weak.upgrade() else { return };
                let filtered =
                    filter_event_data(&bridge.current_traces(), payload.as_ref(), EventKind::Restyle);
                bridge.props.set_event_data(EventOutput::Restyle, filtered);
                bridge.publish_viewport_from_engine();
            }),
        );

        for (kind, output) in [
            (EventKind::Click, EventOutput::Click),
            (EventKind::Hover, EventOutput::Hover),
            (EventKind::Selected, EventOutput::Selected),
            (EventKind::ClickAnnotation, EventOutput::ClickAnnotation),
        ] {
            let weak = self.weak_self.clone();
            self.engine.on(
                kind,
                Box::new(move |payload| {
                    let Some(bridge) = weak.upgrade() else { return };
                    tracing::debug!(event = kind.name(), "publishing interaction event");
                    let filtered =
                        filter_event_data(&bridge.current_traces(), payload.as_ref(), kind);
                    bridge.props.set_event_data(output, filtered);
                }),
            );
        }

        let weak = self.weak_self.clone();
        self.engine.on(
            EventKind::Deselect,
            Box::new(move |_payload| {
                let Some(bridge) = weak.upgrade() else { return };
                bridge.props.set_event_data(EventOutput::Selected, None);
            }),
        );

        let weak = self.weak_self.clone();
        self.engine.on(
            EventKind::Unhover,
            Box::new(move |_payload| {
                let Some(bridge) = weak.upgrade() else { return };
                bridge.props.set_event_data(EventOutput::Hover, None);
            }),
        );
    }
}

impl PropertySubscriber for PlotBridge {
    fn on_property_change(&self, property: PlotProperty) {
        match property {
            PlotProperty::Data
            | PlotProperty::Layout
            | PlotProperty::Config
            | PlotProperty::DataSources
            | PlotProperty::RenderCount => {
                let Some(bridge) = self.weak_self.upgrade() else { return };
                self.runtime.spawn(async move {
                    if let Err(error) = bridge.render().await {
                        tracing::error!("render failed: {error}");
                    }
                });
            }
            PlotProperty::Viewport => {
                if !self.setting_viewport.load(Ordering::SeqCst) {
                    self.apply_viewport_from_property();
                }
            }
            PlotProperty::ViewportUpdatePolicy | PlotProperty::ViewportUpdateThrottle => {
                self.rebuild_viewport_setter();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EventHandler;
    use ahash::AHashMap;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct MockEngine {
        handlers: Mutex<AHashMap<EventKind, Vec<EventHandler>>>,
        relayout_calls: Mutex<Vec<Value>>,
        full_layout: Mutex<Value>,
        renders: AtomicUsize,
        rendered_traces: Mutex<Vec<Value>>,
    }

    impl MockEngine {
        fn new(full_layout: Value) -> Arc<Self> {
            Arc::new(Self {
                handlers: Mutex::new(AHashMap::new()),
                relayout_calls: Mutex::new(Vec::new()),
                full_layout: Mutex::new(full_layout),
                renders: AtomicUsize::new(0),
                rendered_traces: Mutex::new(Vec::new()),
            })
        }

        fn set_full_layout(&self, layout: Value) {
            *self.full_layout.lock() = layout;
        }

        fn emit(&self, kind: EventKind, payload: Option<Value>) {
            let handlers = self.handlers.lock();
            if let Some(installed) = handlers.get(&kind) {
                for handler in installed {
                    handler(payload.clone());
                }
            }
        }

        fn handler_count(&self, kind: EventKind) -> usize {
            self.handlers.lock().get(&kind).map_or(0, Vec::len)
        }
    }

    #[async_trait]
    impl RenderEngine for MockEngine {
        async fn render(
            &self,
            traces: Vec<Value>,
            _layout: Value,
            _config: Value,
        ) -> anyhow::Result<()> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            *self.rendered_traces.lock() = traces;
            Ok(())
        }

        fn relayout(&self, patch: Value) -> anyhow::Result<()> {
            self.relayout_calls.lock().push(patch);
            Ok(())
        }

        fn on(&self, kind: EventKind, handler: EventHandler) {
            self.handlers.lock().entry(kind).or_default().push(handler);
        }

        fn full_layout(&self) -> Value {
            self.full_layout.lock().clone()
        }
    }

    struct ViewportWrites {
        count: AtomicUsize,
    }

    impl PropertySubscriber for ViewportWrites {
        fn on_property_change(&self, property: PlotProperty) {
            if property == PlotProperty::Viewport {
                self.count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn watch_viewport(props: &PropertyStore) -> Arc<ViewportWrites> {
        let watcher = Arc::new(ViewportWrites { count: AtomicUsize::new(0) });
        props.add_subscriber(watcher.clone());
        watcher
    }

    fn layout_with_ranges(x: [f64; 2], y: [f64; 2]) -> Value {
        json!({
            "xaxis": { "range": [x[0], x[1]] },
            "yaxis": { "range": [y[0], y[1]] },
        })
    }

    fn new_bridge(engine: &Arc<MockEngine>) -> Arc<PlotBridge> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        PlotBridge::new(
            engine.clone(),
            Arc::new(PropertyStore::new()),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn listeners_are_installed_exactly_once() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);

        bridge.render().await.unwrap();
        bridge.render().await.unwrap();

        assert_eq!(engine.renders.load(Ordering::SeqCst), 2);
        assert_eq!(engine.handler_count(EventKind::Relayout), 1);
        assert_eq!(engine.handler_count(EventKind::Click), 1);
        assert_eq!(engine.handler_count(EventKind::Unhover), 1);
    }

    #[tokio::test]
    async fn render_publishes_the_derived_viewport() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 10.0], [-1.0, 1.0]));
        let bridge = new_bridge(&engine);

        bridge.render().await.unwrap();

        let viewport = bridge.properties().viewport();
        assert_eq!(viewport.get("xaxis.range"), Some([0.0, 10.0]));
        assert_eq!(viewport.get("yaxis.range"), Some([-1.0, 1.0]));
    }

    #[tokio::test]
    async fn equal_viewport_triggers_no_relayout() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);

        let mut viewport = Viewport::new();
        viewport.insert("xaxis.range", [0.0, 1.0]);
        viewport.insert("yaxis.range", [0.0, 1.0]);
        bridge.properties().set_viewport(viewport);

        assert!(engine.relayout_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn differing_viewport_triggers_one_full_relayout() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);

        let mut viewport = Viewport::new();
        viewport.insert("xaxis.range", [0.0, 1.0]);
        viewport.insert("yaxis.range", [5.0, 6.0]);
        bridge.properties().set_viewport(viewport);

        let calls = engine.relayout_calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["xaxis.range"], json!([0.0, 1.0]));
        assert_eq!(calls[0]["yaxis.range"], json!([5.0, 6.0]));
        assert_eq!(calls[0][UPDATE_FROM_PROPERTY], json!(true));
    }

    #[tokio::test]
    async fn self_triggered_relayout_is_suppressed() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge.render().await.unwrap();

        engine.set_full_layout(layout_with_ranges([2.0, 3.0], [0.0, 1.0]));
        engine.emit(
            EventKind::Relayout,
            Some(json!({ "xaxis.range[0]": 2.0, UPDATE_FROM_PROPERTY: true })),
        );

        // Neither the event property nor the viewport moved
        assert_eq!(bridge.properties().event_data(EventOutput::Relayout), None);
        assert_eq!(bridge.properties().viewport().get("xaxis.range"), Some([0.0, 1.0]));
    }

    #[tokio::test]
    async fn user_relayout_publishes_event_and_viewport() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge.render().await.unwrap();

        engine.set_full_layout(layout_with_ranges([2.0, 3.0], [0.0, 1.0]));
        engine.emit(EventKind::Relayout, Some(json!({ "xaxis.range[0]": 2.0 })));

        let published = bridge.properties().event_data(EventOutput::Relayout).unwrap();
        assert_eq!(published["xaxis.range[0]"], json!(2.0));
        assert_eq!(bridge.properties().viewport().get("xaxis.range"), Some([2.0, 3.0]));
        // And the write-back did not echo a relayout to the engine
        assert!(engine.relayout_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn mouseup_policy_suppresses_drag_updates() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge.render().await.unwrap();

        let writes = watch_viewport(bridge.properties());
        for step in 1..=3 {
            engine.set_full_layout(layout_with_ranges([0.0, step as f64], [0.0, 1.0]));
            engine.emit(EventKind::Relayouting, Some(json!({})));
        }
        assert_eq!(writes.count.load(Ordering::SeqCst), 0);

        engine.emit(EventKind::Relayout, Some(json!({ "xaxis.range[1]": 3.0 })));
        assert_eq!(writes.count.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.properties().viewport().get("xaxis.range"), Some([0.0, 3.0]));
    }

    #[tokio::test]
    async fn continuous_policy_commits_drag_updates() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge
            .properties()
            .set_viewport_update_policy(ViewportUpdatePolicy::Continuous);
        bridge.render().await.unwrap();

        engine.set_full_layout(layout_with_ranges([0.0, 7.0], [0.0, 1.0]));
        engine.emit(EventKind::Relayouting, Some(json!({})));
        assert_eq!(bridge.properties().viewport().get("xaxis.range"), Some([0.0, 7.0]));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_policy_coalesces_rapid_updates() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge
            .properties()
            .set_viewport_update_policy(ViewportUpdatePolicy::Throttled);
        bridge.render().await.unwrap();
        // The render completion already fired the leading edge; start the
        // drag outside that period
        tokio::time::advance(std::time::Duration::from_millis(250)).await;

        let writes = watch_viewport(bridge.properties());
        for step in 1..=5 {
            engine.set_full_layout(layout_with_ranges([0.0, 10.0 + step as f64], [0.0, 1.0]));
            engine.emit(EventKind::Relayouting, Some(json!({})));
        }
        // Leading edge only within the period
        assert_eq!(writes.count.load(Ordering::SeqCst), 1);

        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert_eq!(writes.count.load(Ordering::SeqCst), 2);
        // The trailing write carries the last coalesced value
        assert_eq!(bridge.properties().viewport().get("xaxis.range"), Some([0.0, 15.0]));
    }

    #[tokio::test]
    async fn click_event_cross_references_customdata() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge
            .properties()
            .set_data(vec![json!({ "type": "scatter", "customdata": ["a", "b", "c"] })]);
        bridge.render().await.unwrap();

        engine.emit(
            EventKind::Click,
            Some(json!({ "points": [{ "curveNumber": 0, "pointNumber": 1, "x": 4 }] })),
        );

        let click = bridge.properties().event_data(EventOutput::Click).unwrap();
        assert_eq!(click["points"][0]["customdata"], json!("b"));
    }

    #[tokio::test]
    async fn deselect_and_unhover_clear_their_properties() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);
        bridge.render().await.unwrap();

        engine.emit(EventKind::Selected, Some(json!({ "points": [{ "x": 1 }] })));
        engine.emit(EventKind::Hover, Some(json!({ "points": [{ "x": 1 }] })));
        assert!(bridge.properties().event_data(EventOutput::Selected).is_some());
        assert!(bridge.properties().event_data(EventOutput::Hover).is_some());

        engine.emit(EventKind::Deselect, None);
        engine.emit(EventKind::Unhover, None);
        assert_eq!(bridge.properties().event_data(EventOutput::Selected), None);
        assert_eq!(bridge.properties().event_data(EventOutput::Hover), None);
    }

    #[tokio::test]
    async fn render_count_bump_forces_a_render() {
        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);

        bridge.properties().bump_render_count();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        assert_eq!(engine.renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn traces_are_built_from_paired_sources() {
        use arrow::array::Float64Array;
        use pb_core::ColumnSource;
        use pb_data::MemorySource;

        let engine = MockEngine::new(layout_with_ranges([0.0, 1.0], [0.0, 1.0]));
        let bridge = new_bridge(&engine);

        let source = MemorySource::new("s")
            .with_column("y", Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0])));
        let sources: Vec<Arc<dyn ColumnSource>> = vec![Arc::new(source)];
        bridge.properties().set_data_sources(sources);
        bridge.properties().set_data(vec![json!({ "type": "scatter" })]);
        bridge.render().await.unwrap();

        let rendered = engine.rendered_traces.lock();
        assert_eq!(rendered[0]["y"], json!([1.0, 2.0, 3.0]));
    }
}
