use std::time::Duration;

use crate::error::{ErrorCode, Result, TrackKitError};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FLUSH_AT: usize = 20;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 1000;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Which connections uploads are allowed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataMode {
    /// Upload on any connection.
    #[default]
    Any,
    /// Upload only while on wifi.
    Wifi,
}

/// Configuration for the batching uploader.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Periodic flush cadence. Default: 30 seconds
    pub flush_interval: Duration,

    /// Queue depth that triggers an immediate flush on capture. Default: 20
    pub flush_at: usize,

    /// Upper bound on records peeked per flush. Default: 50
    pub max_batch_size: usize,

    /// Queue capacity; the oldest record is evicted beyond it. Default: 1000
    pub max_queue_depth: usize,

    /// Connection gating for uploads. Default: any connection
    pub data_mode: DataMode,

    /// Base back-off delay after a retryable failure. Default: 5 seconds
    pub retry_delay: Duration,

    /// Cap on the back-off delay. Default: 30 seconds
    pub max_retry_delay: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_at: DEFAULT_FLUSH_AT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            data_mode: DataMode::Any,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

impl UploaderConfig {
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(TrackKitError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "Flush interval must be positive",
            ));
        }

        if self.flush_at == 0 || self.max_batch_size == 0 || self.max_queue_depth == 0 {
            return Err(TrackKitError::config_error(
                ErrorCode::ConfigInvalidBatchSize,
                "Flush threshold, batch size and queue depth must be positive",
            ));
        }

        if self.retry_delay.is_zero() {
            return Err(TrackKitError::config_error(
                ErrorCode::ConfigInvalidRetryDelay,
                "Retry delay must be positive",
            ));
        }

        if self.max_retry_delay < self.retry_delay {
            return Err(TrackKitError::config_error(
                ErrorCode::ConfigInvalidRetryDelay,
                "Maximum retry delay must not be below the base delay",
            ));
        }

        Ok(())
    }
}

/// Builder for UploaderConfig.
#[derive(Debug, Default)]
pub struct UploaderConfigBuilder {
    flush_interval: Option<Duration>,
    flush_at: Option<usize>,
    max_batch_size: Option<usize>,
    max_queue_depth: Option<usize>,
    data_mode: Option<DataMode>,
    retry_delay: Option<Duration>,
    max_retry_delay: Option<Duration>,
}

impl UploaderConfigBuilder {
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn flush_at(mut self, depth: usize) -> Self {
        self.flush_at = Some(depth);
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    pub fn max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = Some(depth);
        self
    }

    pub fn data_mode(mut self, mode: DataMode) -> Self {
        self.data_mode = Some(mode);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = Some(delay);
        self
    }

    pub fn build(self) -> UploaderConfig {
        UploaderConfig {
            flush_interval: self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            flush_at: self.flush_at.unwrap_or(DEFAULT_FLUSH_AT),
            max_batch_size: self.max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            max_queue_depth: self.max_queue_depth.unwrap_or(DEFAULT_MAX_QUEUE_DEPTH),
            data_mode: self.data_mode.unwrap_or_default(),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            max_retry_delay: self.max_retry_delay.unwrap_or(DEFAULT_MAX_RETRY_DELAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UploaderConfig::default();
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.flush_at, 20);
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.max_queue_depth, 1000);
        assert_eq!(config.data_mode, DataMode::Any);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.max_retry_delay, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = UploaderConfig::builder()
            .flush_interval(Duration::from_secs(10))
            .flush_at(5)
            .max_batch_size(25)
            .max_queue_depth(500)
            .data_mode(DataMode::Wifi)
            .retry_delay(Duration::from_secs(2))
            .max_retry_delay(Duration::from_secs(60))
            .build();

        assert_eq!(config.flush_interval, Duration::from_secs(10));
        assert_eq!(config.flush_at, 5);
        assert_eq!(config.max_batch_size, 25);
        assert_eq!(config.max_queue_depth, 500);
        assert_eq!(config.data_mode, DataMode::Wifi);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.max_retry_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = UploaderConfig::builder()
            .flush_interval(Duration::ZERO)
            .build();
        let error = config.validate().unwrap_err();
        assert_eq!(error.code, ErrorCode::ConfigInvalidInterval);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = UploaderConfig::builder().max_batch_size(0).build();
        let error = config.validate().unwrap_err();
        assert_eq!(error.code, ErrorCode::ConfigInvalidBatchSize);
    }

    #[test]
    fn test_validate_rejects_inverted_retry_delays() {
        let config = UploaderConfig::builder()
            .retry_delay(Duration::from_secs(10))
            .max_retry_delay(Duration::from_secs(5))
            .build();
        let error = config.validate().unwrap_err();
        assert_eq!(error.code, ErrorCode::ConfigInvalidRetryDelay);
    }
}
