/// A decoded event from the watched contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// `VisibilityChanged(bool visible)`
    VisibilityChanged { visible: bool },
    /// `EntityStateChanged(string entity, bool state)`
    EntityStateChanged { entity: String, state: bool },
}
