//! Batching uploader draining the persistent queue to the batch endpoint.
//!
//! Flushes are driven three ways: a periodic timer, the queue depth crossing
//! `flush_at` on capture, and explicit triggers from the coordinator. All of
//! them funnel into one spawned select loop, so flush bodies run serially; a
//! single-flight guard additionally protects direct `flush()` callers.
//!
//! A batch that fails with a transport error or a redirect stays in the
//! queue and pushes the next attempt out by `min(retry_count * retry_delay,
//! max_retry_delay)`. Any other status pops the batch: the server has seen
//! it and will not accept it again.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::core::config::UploaderConfig;
use crate::net::BatchEndpoint;
use crate::queue::PersistentQueue;
use crate::types::CapturedEvent;

struct PauseState {
    paused: bool,
    paused_until: Option<Instant>,
}

struct TimerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

pub struct Uploader {
    inner: Arc<UploaderInner>,
    /// Timer install/tear-down guard.
    timer: Mutex<Option<TimerHandle>>,
}

struct UploaderInner {
    config: UploaderConfig,
    queue: Arc<PersistentQueue>,
    endpoint: Arc<dyn BatchEndpoint>,
    is_flushing: Mutex<bool>,
    pause: Mutex<PauseState>,
    retry_count: AtomicU32,
    flush_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl Uploader {
    pub fn new(
        config: UploaderConfig,
        queue: Arc<PersistentQueue>,
        endpoint: Arc<dyn BatchEndpoint>,
    ) -> Self {
        Self {
            inner: Arc::new(UploaderInner {
                config,
                queue,
                endpoint,
                is_flushing: Mutex::new(false),
                pause: Mutex::new(PauseState {
                    paused: false,
                    paused_until: None,
                }),
                retry_count: AtomicU32::new(0),
                flush_tx: Mutex::new(None),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.inner.config
    }

    /// Start the periodic flush timer.
    ///
    /// Idempotent; a second call while running is a no-op.
    pub fn start(&self) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (flush_tx, mut flush_rx) = mpsc::channel::<()>(8);

        {
            let mut timer = self.timer.lock();
            if timer.is_some() {
                return;
            }
            *timer = Some(TimerHandle { shutdown_tx });
        }
        *self.inner.flush_tx.lock() = Some(flush_tx);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let period = inner.config.flush_interval;
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("uploader timer shutting down");
                        break;
                    }
                    requested = flush_rx.recv() => {
                        match requested {
                            Some(()) => inner.flush().await,
                            // Sender gone: the uploader was stopped.
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        inner.flush().await;
                    }
                }
            }
        });

        tracing::debug!(interval = ?self.inner.config.flush_interval, "uploader started");
    }

    /// Tear down the timer. No further scheduled flushes occur; an in-flight
    /// flush completes and its result is applied.
    pub fn stop(&self) {
        let handle = self.timer.lock().take();
        if let Some(handle) = handle {
            let _ = handle.shutdown_tx.try_send(());
        }
        *self.inner.flush_tx.lock() = None;
        tracing::debug!("uploader stopped");
    }

    /// Admit an event into the delivery pipeline.
    ///
    /// The event is serialized and appended to the durable queue; an event
    /// that fails to serialize is logged and dropped, never queued. Crossing
    /// the `flush_at` depth schedules an immediate flush.
    pub fn capture(&self, event: CapturedEvent) {
        let bytes = match serde_json::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(event = %event.event, "dropping event that failed to serialize: {}", e);
                return;
            }
        };

        self.inner.queue.add(&bytes);

        if self.inner.queue.depth() >= self.inner.config.flush_at {
            self.request_flush();
        }
    }

    /// Schedule a flush on the timer task without waiting for it.
    ///
    /// A no-op when the uploader is not started.
    pub fn request_flush(&self) {
        if let Some(tx) = self.inner.flush_tx.lock().as_ref() {
            let _ = tx.try_send(());
        }
    }

    /// Attempt to send one batch now.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Gate uploads on network state. Clearing the pause does not clear a
    /// pending back-off deadline.
    pub fn set_paused(&self, paused: bool) {
        let mut pause = self.inner.pause.lock();
        if pause.paused != paused {
            tracing::debug!(paused, "uploader pause state changed");
        }
        pause.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.pause.lock().paused
    }

    /// Back-off deadline from the last retryable failure, if still pending.
    pub fn paused_until(&self) -> Option<Instant> {
        self.inner.pause.lock().paused_until
    }

    /// Consecutive retryable failures since the last final outcome.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    pub fn can_flush(&self) -> bool {
        self.inner.can_flush()
    }
}

impl UploaderInner {
    fn can_flush(&self) -> bool {
        if *self.is_flushing.lock() {
            return false;
        }
        self.pause_allows_flush()
    }

    fn pause_allows_flush(&self) -> bool {
        let pause = self.pause.lock();
        if pause.paused {
            return false;
        }
        if let Some(until) = pause.paused_until {
            if until > Instant::now() {
                return false;
            }
        }
        true
    }

    /// Claim the single-flight slot, or report that this flush should be
    /// skipped.
    fn begin_flush(&self) -> bool {
        if !self.pause_allows_flush() {
            return false;
        }
        let mut flushing = self.is_flushing.lock();
        if *flushing {
            return false;
        }
        *flushing = true;
        true
    }

    async fn flush(&self) {
        if !self.begin_flush() {
            tracing::debug!("flush skipped");
            return;
        }
        self.run_batch().await;
        *self.is_flushing.lock() = false;
    }

    async fn run_batch(&self) {
        let records = self.queue.peek(self.config.max_batch_size);
        if records.is_empty() {
            return;
        }

        let mut events = Vec::with_capacity(records.len());
        let mut undecodable: Vec<usize> = Vec::new();
        for (index, bytes) in records.iter().enumerate() {
            match serde_json::from_slice::<CapturedEvent>(bytes) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(index, "dropping undecodable record: {}", e);
                    undecodable.push(index);
                }
            }
        }

        // Descending so each removal cannot shift the remaining targets.
        for index in undecodable.into_iter().rev() {
            self.queue.delete(index);
        }

        if events.is_empty() {
            return;
        }

        // The surviving events occupy the first batch_len queue positions.
        let batch_len = events.len();
        tracing::debug!(batch_len, "sending batch");

        let response = self.endpoint.send_batch(events).await;
        let status = response.status();

        if response.is_retryable() {
            let retries = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = (self.config.retry_delay * retries).min(self.config.max_retry_delay);
            {
                let mut pause = self.pause.lock();
                pause.paused_until = Some(Instant::now() + delay);
            }
            tracing::warn!(status, retries, "batch upload failed, retrying in {:?}", delay);
        } else {
            self.queue.pop(batch_len);
            self.retry_count.store(0, Ordering::SeqCst);
            if response.is_success() {
                tracing::debug!(status, batch_len, "batch accepted");
            } else {
                tracing::warn!(
                    status,
                    batch_len,
                    "batch rejected with non-retryable status, records dropped"
                );
            }
        }
    }
}
