mod config;
mod coordinator;
mod flag_cache;
mod uploader;

pub use config::{
    DataMode, UploaderConfig, UploaderConfigBuilder, DEFAULT_FLUSH_AT, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_QUEUE_DEPTH, DEFAULT_MAX_RETRY_DELAY,
    DEFAULT_RETRY_DELAY,
};
pub use coordinator::Coordinator;
pub use flag_cache::{FlagCache, LoadOutcome};
pub use uploader::Uploader;
