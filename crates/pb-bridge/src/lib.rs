//! Bridge between a reactive property store and an interactive chart
//! rendering engine
//!
//! The bridge renders trace templates filled from columnar data, keeps
//! the `viewport` property and the engine's displayed axis ranges in sync
//! without feedback loops, and republishes sanitized interaction events
//! as properties.

pub mod bridge;
pub mod engine;
pub mod sanitize;
mod throttle;

// Re-export commonly used types
pub use bridge::PlotBridge;
pub use engine::{EventHandler, RenderEngine};
pub use sanitize::filter_event_data;
