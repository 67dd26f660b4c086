//! Connectivity events consumed by the coordinator.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Reachable(ConnectionType),
    Unreachable,
}

impl NetworkEvent {
    pub fn is_wifi(&self) -> bool {
        matches!(self, NetworkEvent::Reachable(ConnectionType::Wifi))
    }
}

/// Source of connectivity transitions.
///
/// Implementations wrap the platform reachability API and emit one event per
/// state change on the broadcast channel.
pub trait NetworkObserver: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<NetworkEvent>;

    fn start(&self) {}

    fn stop(&self) {}
}
