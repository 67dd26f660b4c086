//! Wires connectivity transitions into the uploader.
//!
//! The coordinator owns the observer subscription task and drives the
//! uploader timer lifecycle; the gating policy itself is a pure function of
//! the event and the configured data mode.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::core::config::DataMode;
use crate::core::uploader::Uploader;
use crate::net::{ConnectionType, NetworkEvent, NetworkObserver};

pub struct Coordinator {
    uploader: Arc<Uploader>,
    observer: Arc<dyn NetworkObserver>,
    subscription: Mutex<Option<mpsc::Sender<()>>>,
}

impl Coordinator {
    pub fn new(uploader: Arc<Uploader>, observer: Arc<dyn NetworkObserver>) -> Self {
        Self {
            uploader,
            observer,
            subscription: Mutex::new(None),
        }
    }

    /// Start the observer, the uploader timer, and the relay task.
    ///
    /// Idempotent; a second call while running is a no-op.
    pub fn start(&self) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        {
            let mut subscription = self.subscription.lock();
            if subscription.is_some() {
                return;
            }
            *subscription = Some(shutdown_tx);
        }

        self.observer.start();
        self.uploader.start();

        let uploader = Arc::clone(&self.uploader);
        let mut events = self.observer.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("network relay shutting down");
                        break;
                    }
                    event = events.recv() => {
                        match event {
                            Ok(event) => Self::apply(&uploader, event),
                            Err(broadcast::error::RecvError::Lagged(missed)) => {
                                tracing::warn!(missed, "network events lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });
    }

    fn apply(uploader: &Uploader, event: NetworkEvent) {
        match event {
            NetworkEvent::Reachable(connection) => {
                let wifi_only = uploader.config().data_mode == DataMode::Wifi;
                uploader.set_paused(wifi_only && connection != ConnectionType::Wifi);
                if connection == ConnectionType::Wifi {
                    uploader.request_flush();
                }
            }
            NetworkEvent::Unreachable => uploader.set_paused(true),
        }
    }

    /// Stop the relay task, the uploader timer, and the observer.
    pub fn stop(&self) {
        if let Some(tx) = self.subscription.lock().take() {
            let _ = tx.try_send(());
        }
        self.uploader.stop();
        self.observer.stop();
    }
}
