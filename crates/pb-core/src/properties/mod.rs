//! Framework-facing properties of the bridge component

mod store;
mod subscriber;

pub use store::PropertyStore;
pub use subscriber::PropertySubscriber;

/// Tags identifying which property changed, carried by change
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotProperty {
    Data,
    Layout,
    Config,
    DataSources,
    RelayoutData,
    RestyleData,
    ClickData,
    HoverData,
    SelectedData,
    ClickAnnotationData,
    Viewport,
    ViewportUpdatePolicy,
    ViewportUpdateThrottle,
    RenderCount,
}

/// The six published event-data properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOutput {
    Relayout,
    Restyle,
    Click,
    Hover,
    Selected,
    ClickAnnotation,
}

impl EventOutput {
    /// The property tag this output publishes under
    pub fn property(&self) -> PlotProperty {
        match self {
            EventOutput::Relayout => PlotProperty::RelayoutData,
            EventOutput::Restyle => PlotProperty::RestyleData,
            EventOutput::Click => PlotProperty::ClickData,
            EventOutput::Hover => PlotProperty::HoverData,
            EventOutput::Selected => PlotProperty::SelectedData,
            EventOutput::ClickAnnotation => PlotProperty::ClickAnnotationData,
        }
    }
}
