//! Response types exchanged with API clients.
//!
//! These types are serialised as JSON with camelCase keys, matching what the
//! web client expects.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// Standard error body returned on any 4xx or 5xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// Human-readable description of the failure.
    pub error: String,
    /// Identifier of the request that failed, also sent as `x-request-id`.
    pub request_id: String,
    /// Diagnostic trace. Never present in production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorEnvelope {
    /// Construct an [`ErrorEnvelope`] without a diagnostic trace.
    pub fn new(error: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            request_id: request_id.into(),
            stack: None,
        }
    }

    /// Attach a diagnostic trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves traffic.
    pub status: String,
    /// Short human-readable status line.
    pub message: String,
    /// Configured environment name (e.g. `"production"`).
    pub environment: String,
    /// Server version.
    pub version: String,
    /// RFC 3339 timestamp, strictly increasing within one process.
    pub timestamp: String,
    /// The request's `Origin` header, if any.
    pub origin: Option<String>,
    /// Resolved origin allow-list for the configured environment.
    pub allowed_origins: Vec<String>,
}

// ---------------------------------------------------------------------------
// CORS self-test
// ---------------------------------------------------------------------------

/// Response body for `GET /api/cors-test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsTestResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Short human-readable status line.
    pub message: String,
    /// The request's `Origin` header or a placeholder.
    pub origin: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_omits_missing_stack() {
        let e = ErrorEnvelope::new("nope", "req-1");
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value, json!({"error": "nope", "requestId": "req-1"}));
    }

    #[test]
    fn envelope_includes_stack_when_set() {
        let e = ErrorEnvelope::new("nope", "req-1").with_stack("nope\ncaused by: x");
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value["stack"], "nope\ncaused by: x");
    }

    #[test]
    fn health_response_uses_camel_case() {
        let h = HealthResponse {
            status: "ok".into(),
            message: "Server is running".into(),
            environment: "development".into(),
            version: "0.1.0".into(),
            timestamp: "2026-01-01T00:00:00.000000Z".into(),
            origin: None,
            allowed_origins: vec!["http://localhost:5173".into()],
        };
        let value = serde_json::to_value(&h).unwrap();
        assert_eq!(value["allowedOrigins"][0], "http://localhost:5173");
        assert!(value["origin"].is_null());
    }
}
