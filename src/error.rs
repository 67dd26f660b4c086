use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Network errors
    NetworkError,
    NetworkTimeout,

    // Decide protocol errors
    DecideMalformed,

    // Storage errors
    StorageCreateError,
    StorageReadError,
    StorageWriteError,
    RecordCorrupt,

    // Event errors
    EventSerialization,

    // Configuration errors
    ConfigInvalidInterval,
    ConfigInvalidBatchSize,
    ConfigInvalidRetryDelay,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::NetworkTimeout => "NETWORK_TIMEOUT",
            ErrorCode::DecideMalformed => "DECIDE_MALFORMED",
            ErrorCode::StorageCreateError => "STORAGE_CREATE_ERROR",
            ErrorCode::StorageReadError => "STORAGE_READ_ERROR",
            ErrorCode::StorageWriteError => "STORAGE_WRITE_ERROR",
            ErrorCode::RecordCorrupt => "RECORD_CORRUPT",
            ErrorCode::EventSerialization => "EVENT_SERIALIZATION",
            ErrorCode::ConfigInvalidInterval => "CONFIG_INVALID_INTERVAL",
            ErrorCode::ConfigInvalidBatchSize => "CONFIG_INVALID_BATCH_SIZE",
            ErrorCode::ConfigInvalidRetryDelay => "CONFIG_INVALID_RETRY_DELAY",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::NetworkTimeout
                | ErrorCode::StorageReadError
                | ErrorCode::StorageWriteError
                | ErrorCode::RecordCorrupt
        )
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct TrackKitError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TrackKitError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn network_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConfigInvalidInterval
                | ErrorCode::ConfigInvalidBatchSize
                | ErrorCode::ConfigInvalidRetryDelay
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, TrackKitError>;
