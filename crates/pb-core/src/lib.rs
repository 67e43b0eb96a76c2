//! Core functionality for the chart bridge
//!
//! This crate provides the fundamental abstractions shared by the bridge:
//! the reactive property store, the viewport mapping, interaction event
//! kinds and the columnar data-source trait.

pub mod definition;
pub mod event;
pub mod properties;
pub mod viewport;

// Re-export commonly used types
pub use definition::PlotDefinition;
pub use event::{EventKind, INTERNAL_FIELD_PREFIX, UPDATE_FROM_PROPERTY};
pub use properties::{EventOutput, PlotProperty, PropertyStore, PropertySubscriber};
pub use viewport::{Viewport, ViewportUpdatePolicy};
pub use data::{ColumnShape, ColumnSource};

/// Columnar data abstraction consumed by the trace builder.
///
/// Implementations live in other crates; the trait is kept here so the
/// property store can hold sources without depending on them.
pub mod data {
    use arrow::array::ArrayRef;
    use serde::{Deserialize, Serialize};

    /// Shape of a column's backing array.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ColumnShape {
        /// Flat array of the given length
        OneD(usize),
        /// Matrix-valued column, stored row-major in the flat array
        TwoD { rows: usize, cols: usize },
    }

    /// Trait for columnar data sources
    pub trait ColumnSource: Send + Sync {
        /// Get the source name/identifier
        fn source_name(&self) -> &str;

        /// Column names, in declaration order. Each name is a dot-path
        /// into a trace template (e.g. `"marker.color"`).
        fn columns(&self) -> Vec<String>;

        /// Get the shape of a column
        fn shape(&self, column: &str) -> Option<ColumnShape>;

        /// Get the flat backing array of a column
        fn values(&self, column: &str) -> Option<ArrayRef>;
    }
}
