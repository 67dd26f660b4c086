//! TrackKit Core
//!
//! The durable event-delivery pipeline and feature-flag cache behind the
//! TrackKit product-analytics SDK.
//!
//! Captured events land in a crash-safe on-disk FIFO and are drained in
//! batches by an [`Uploader`] that backs off on transient failures and pauses
//! while the network is unavailable. Remotely computed feature flags are held
//! in a [`FlagCache`] that refreshes through a single-flight decide call and
//! merges partial server results over the last known state.
//!
//! Transport, reachability monitoring, and the public capture API live in
//! the embedding SDK; this crate consumes them through the
//! [`BatchEndpoint`], [`DecideEndpoint`], and [`NetworkObserver`] seams.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackkit::{
//!     BatchEndpoint, BatchResponse, BoxFuture, CapturedEvent, KeyValueStore,
//!     PersistentQueue, Uploader, UploaderConfig,
//! };
//!
//! struct HttpBatch;
//!
//! impl BatchEndpoint for HttpBatch {
//!     fn send_batch(&self, events: Vec<CapturedEvent>) -> BoxFuture<BatchResponse> {
//!         Box::pin(async move {
//!             // Hand `events` to the transport layer here.
//!             let _ = events;
//!             BatchResponse::from_status(200)
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> trackkit::Result<()> {
//!     let store = Arc::new(KeyValueStore::new("/var/lib/trackkit")?);
//!     let config = UploaderConfig::default();
//!     config.validate()?;
//!
//!     let queue = Arc::new(PersistentQueue::new(
//!         store.queue_dir(),
//!         config.max_queue_depth,
//!     )?);
//!     let uploader = Arc::new(Uploader::new(config, queue, Arc::new(HttpBatch)));
//!
//!     uploader.start();
//!     uploader.capture(CapturedEvent::new("app_opened", "user-1"));
//!     uploader.flush().await;
//!     uploader.stop();
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod core;
pub mod error;
pub mod key_value;
pub mod net;
pub mod queue;
pub mod types;

// Re-exports from core module
pub use crate::core::{
    Coordinator, DataMode, FlagCache, LoadOutcome, Uploader, UploaderConfig,
    UploaderConfigBuilder, DEFAULT_FLUSH_AT, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_MAX_QUEUE_DEPTH, DEFAULT_MAX_RETRY_DELAY, DEFAULT_RETRY_DELAY,
};

// Re-exports from error module
pub use error::{ErrorCode, Result, TrackKitError};

// Re-exports from storage modules
pub use key_value::{KeyValueStore, StorageKey};
pub use queue::{PersistentQueue, DEFAULT_MAX_DEPTH};

// Re-exports from net module
pub use net::{
    BatchEndpoint, BatchResponse, BoxFuture, ConnectionType, DecideEndpoint, DecideRequest,
    NetworkEvent, NetworkObserver,
};

// Re-exports from types module
pub use types::{CapturedEvent, FlagValue};
