mod endpoints;
mod observer;

pub use endpoints::{BatchEndpoint, BatchResponse, BoxFuture, DecideEndpoint, DecideRequest};
pub use observer::{ConnectionType, NetworkEvent, NetworkObserver};
