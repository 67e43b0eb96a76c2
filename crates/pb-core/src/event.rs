//! Interaction event kinds emitted by the rendering engine

/// Marker field attached to relayout patches issued from the viewport
/// property, so engine echoes of our own relayouts can be told apart from
/// user-triggered ones.
pub const UPDATE_FROM_PROPERTY: &str = "_update_from_property";

/// Prefix identifying internal fields that must never be forwarded into a
/// published event payload.
pub const INTERNAL_FIELD_PREFIX: char = '_';

/// The closed set of interaction events the bridge subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Relayout,
    /// Drag-in-progress variant of `Relayout`
    Relayouting,
    Restyle,
    Click,
    Hover,
    Selected,
    Deselect,
    Unhover,
    ClickAnnotation,
}

impl EventKind {
    /// The engine-facing event name
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Relayout => "relayout",
            EventKind::Relayouting => "relayouting",
            EventKind::Restyle => "restyle",
            EventKind::Click => "click",
            EventKind::Hover => "hover",
            EventKind::Selected => "selected",
            EventKind::Deselect => "deselect",
            EventKind::Unhover => "unhover",
            EventKind::ClickAnnotation => "clickannotation",
        }
    }

    /// Whether payloads of this kind carry a `points` sequence
    pub fn is_point_event(&self) -> bool {
        matches!(self, EventKind::Click | EventKind::Hover | EventKind::Selected)
    }
}
