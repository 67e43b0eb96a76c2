//! Rendering engine collaborator trait

use async_trait::async_trait;
use serde_json::Value;

use pb_core::EventKind;

/// Callback invoked when the engine emits an interaction event. The
/// payload is `None` for events that carry no data (deselect, unhover).
pub type EventHandler = Box<dyn Fn(Option<Value>) + Send + Sync>;

/// The opaque chart rendering engine.
///
/// `render` is the only suspending operation; everything else runs to
/// completion synchronously within one callback invocation.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Issue a full render of the given concrete traces
    async fn render(&self, traces: Vec<Value>, layout: Value, config: Value) -> anyhow::Result<()>;

    /// Apply a layout patch. Fire-and-forget: the engine's own re-render
    /// is not awaited.
    fn relayout(&self, patch: Value) -> anyhow::Result<()>;

    /// Subscribe a handler to an interaction event
    fn on(&self, kind: EventKind, handler: EventHandler);

    /// The engine's live full-layout state. Keys prefixed `xaxis`/`yaxis`
    /// carry the displayed `.range` per axis.
    fn full_layout(&self) -> Value;
}
