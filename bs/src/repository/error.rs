//! Remote store error types

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Errors returned by a record store
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        /// Parsed JSON error body, when the store sent one
        body: Option<Value>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RepositoryError {
    /// API error from a status and an optional JSON body
    pub fn api(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self::Api { status, message, body }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => is_retryable_status(*status),
            Self::Network(_) => true,
            Self::Timeout(_) => true,
            Self::InvalidResponse(_) | Self::Json(_) | Self::Other(_) => false,
        }
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Human-readable message for the run summary
    ///
    /// Prefers the structured error body: its `message`, then its `payload`,
    /// then the whole body. Falls back to the error's own text.
    pub fn remote_message(&self) -> String {
        if let Self::Api { body: Some(body), .. } = self {
            if let Some(message) = body.get("message").and_then(Value::as_str).filter(|m| !m.trim().is_empty()) {
                return message.to_string();
            }
            if let Some(payload) = body.get("payload").filter(|p| !p.is_null()) {
                return match payload {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
            return match body {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
        self.to_string()
    }
}

/// Check if an HTTP status code is retryable
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_retryable() {
        assert!(
            RepositoryError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );
        assert!(RepositoryError::api(503, None).is_retryable());
        assert!(RepositoryError::api(408, None).is_retryable());
        assert!(!RepositoryError::api(400, None).is_retryable());
        assert!(!RepositoryError::api(404, None).is_retryable());
        assert!(RepositoryError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!RepositoryError::InvalidResponse("Bad JSON".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let err = RepositoryError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(RepositoryError::api(500, None).retry_after(), None);
    }

    #[test]
    fn test_remote_message_prefers_body_message() {
        let err = RepositoryError::api(
            400,
            Some(json!({"code": "ERROR_CODE_INPUT_ERROR", "message": "Duplicate record detected.", "payload": {"field": "email"}})),
        );
        assert_eq!(err.remote_message(), "Duplicate record detected.");
    }

    #[test]
    fn test_remote_message_falls_back_to_payload_then_body() {
        let err = RepositoryError::api(400, Some(json!({"payload": {"field": "email"}})));
        assert_eq!(err.remote_message(), r#"{"field":"email"}"#);

        let err = RepositoryError::api(500, Some(json!({"error": "boom"})));
        assert_eq!(err.remote_message(), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_remote_message_generic_text() {
        let err = RepositoryError::Other("connection reset".to_string());
        assert_eq!(err.remote_message(), "connection reset");
        assert_eq!(RepositoryError::api(502, None).remote_message(), "API error 502: request failed with status 502");
    }
}
