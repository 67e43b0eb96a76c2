use super::PlotProperty;

/// Trait for components that react to property changes
pub trait PropertySubscriber: Send + Sync {
    /// Called synchronously after a property was mutated
    fn on_property_change(&self, property: PlotProperty);
}
