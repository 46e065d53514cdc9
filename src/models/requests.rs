//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value to store
/// - `ttl`: Optional TTL in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /incr/:key and POST /decr/:key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CounterRequest {
    /// Amount to add or subtract (default: 1)
    #[serde(default)]
    pub amount: Option<i64>,
}

impl CounterRequest {
    pub fn amount(&self) -> i64 {
        self.amount.unwrap_or(1)
    }
}

/// Request body for POST /delete_matched
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteMatchedRequest {
    /// Glob pattern (`*`, `?`, `\` escapes)
    pub pattern: String,
}

/// Request body for POST /prune
#[derive(Debug, Clone, Deserialize)]
pub struct PruneRequest {
    /// Used-bytes ceiling to prune down to
    pub target_size: u64,
    /// Optional time budget in milliseconds
    #[serde(default)]
    pub max_time_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": "hello"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, json!("hello"));
        assert!(req.ttl.is_none());
    }

    #[test]
    fn test_set_request_structured_value_with_ttl() {
        let json = r#"{"key": "test", "value": {"n": 1}, "ttl": 60}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value, json!({ "n": 1 }));
        assert_eq!(req.ttl, Some(60));
    }

    #[test]
    fn test_validate_empty_key() {
        let req = SetRequest {
            key: "".to_string(),
            value: json!("test"),
            ttl: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_counter_request_default_amount() {
        let req: CounterRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.amount(), 1);

        let req: CounterRequest = serde_json::from_str(r#"{"amount": -4}"#).unwrap();
        assert_eq!(req.amount(), -4);
    }

    #[test]
    fn test_prune_request() {
        let req: PruneRequest = serde_json::from_str(r#"{"target_size": 1024}"#).unwrap();
        assert_eq!(req.target_size, 1024);
        assert!(req.max_time_ms.is_none());
    }
}
