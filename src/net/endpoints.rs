//! Transport seams consumed by the delivery pipeline and the flag cache.
//!
//! The core never talks HTTP itself; the embedding SDK supplies these
//! endpoints and maps its transport errors into the shapes below.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::CapturedEvent;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Outcome of one batch upload.
///
/// A transport-level failure (no HTTP exchange happened) is an absent status
/// code and reads as -1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchResponse {
    pub status_code: Option<i32>,
}

impl BatchResponse {
    pub fn from_status(status: i32) -> Self {
        Self {
            status_code: Some(status),
        }
    }

    pub fn transport_failure() -> Self {
        Self { status_code: None }
    }

    pub fn status(&self) -> i32 {
        self.status_code.unwrap_or(-1)
    }

    /// Transport failures and redirects are worth retrying; everything else
    /// is final for the batch.
    pub fn is_retryable(&self) -> bool {
        let status = self.status();
        status == -1 || (300..=399).contains(&status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }
}

/// Identity handed to the decide endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecideRequest {
    pub distinct_id: String,
    pub anonymous_id: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub groups: HashMap<String, String>,
}

impl DecideRequest {
    pub fn new(distinct_id: impl Into<String>, anonymous_id: impl Into<String>) -> Self {
        Self {
            distinct_id: distinct_id.into(),
            anonymous_id: anonymous_id.into(),
            groups: HashMap::new(),
        }
    }

    pub fn group(mut self, group_type: impl Into<String>, key: impl Into<String>) -> Self {
        self.groups.insert(group_type.into(), key.into());
        self
    }
}

/// Accepts one batch of events and reports how the server answered.
pub trait BatchEndpoint: Send + Sync {
    fn send_batch(&self, events: Vec<CapturedEvent>) -> BoxFuture<BatchResponse>;
}

/// Computes feature flags for an identity.
///
/// Returns the raw response body; the flag cache validates the shape and
/// treats transport errors and malformed bodies as load failures.
pub trait DecideEndpoint: Send + Sync {
    fn decide(&self, request: DecideRequest) -> BoxFuture<Result<serde_json::Value>>;
}
