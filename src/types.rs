use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A remotely evaluated feature-flag value.
///
/// The decide endpoint returns scalars for plain toggles and strings for
/// multivariate flags; payloads can carry arbitrary JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    String(String),
    Number(f64),
    Json(serde_json::Value),
    Null,
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FlagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            FlagValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FlagValue::Null)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::String(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::String(value.to_string())
    }
}

impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        FlagValue::Number(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Number(value as f64)
    }
}

impl From<serde_json::Value> for FlagValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => FlagValue::Bool(b),
            serde_json::Value::String(s) => FlagValue::String(s),
            serde_json::Value::Number(n) => FlagValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::Null => FlagValue::Null,
            other => FlagValue::Json(other),
        }
    }
}

/// An analytics event as it travels through the delivery pipeline.
///
/// Events are serialized to JSON at admission and re-read from queue records
/// at flush time; a record that no longer decodes is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedEvent {
    pub uuid: String,

    /// Event name (e.g. "screen_viewed", "purchase").
    pub event: String,

    pub distinct_id: String,

    /// RFC 3339 admission timestamp.
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, serde_json::Value>,
}

impl CapturedEvent {
    pub fn new(event: impl Into<String>, distinct_id: impl Into<String>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            event: event.into(),
            distinct_id: distinct_id.into(),
            timestamp: Utc::now().to_rfc3339(),
            properties: HashMap::new(),
        }
    }

    /// Add a single property.
    pub fn property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replace the property map.
    pub fn properties(mut self, properties: HashMap<String, serde_json::Value>) -> Self {
        self.properties = properties;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_value_accessors() {
        assert_eq!(FlagValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FlagValue::String("variant-a".into()).as_str(), Some("variant-a"));
        assert_eq!(FlagValue::Number(3.5).as_number(), Some(3.5));
        assert!(FlagValue::Null.is_null());
        assert!(FlagValue::Bool(true).as_str().is_none());
    }

    #[test]
    fn test_flag_value_from_json() {
        assert_eq!(FlagValue::from(serde_json::json!(true)), FlagValue::Bool(true));
        assert_eq!(
            FlagValue::from(serde_json::json!("control")),
            FlagValue::String("control".into())
        );
        assert_eq!(FlagValue::from(serde_json::json!(2)), FlagValue::Number(2.0));
        assert!(matches!(
            FlagValue::from(serde_json::json!([1, 2, 3])),
            FlagValue::Json(_)
        ));
        assert!(FlagValue::from(serde_json::Value::Null).is_null());
    }

    #[test]
    fn test_event_round_trip() {
        let event = CapturedEvent::new("purchase", "user-1")
            .property("amount", serde_json::json!(99.99))
            .property("currency", serde_json::json!("USD"));

        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: CapturedEvent = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.event, "purchase");
        assert_eq!(decoded.distinct_id, "user-1");
        assert_eq!(decoded.uuid, event.uuid);
        assert_eq!(decoded.properties.len(), 2);
    }

    #[test]
    fn test_event_without_properties_omits_field() {
        let event = CapturedEvent::new("app_opened", "user-1");
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("properties"));
    }
}
