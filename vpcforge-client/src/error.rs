//! Error types for the VPCForge client

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;
use vpcforge_core::domain::job::JobStatus;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the VPCForge client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Job did not reach a terminal status in time
    #[error("job {job_id} still {status} after {waited:?}")]
    WaitTimedOut {
        job_id: Uuid,
        status: JobStatus,
        waited: Duration,
    },
}

impl ClientError {
    /// Create an API error from status code and response body
    ///
    /// Bodies of the form `{"error": "..."}` are reduced to their message.
    pub fn api_error(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);

        Self::ApiError { status, message }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if (400..500).contains(status))
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_extracts_message() {
        let err = ClientError::api_error(400, r#"{"error":"Required field missing: 'cidr'"}"#);
        match &err {
            ClientError::ApiError { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Required field missing: 'cidr'");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_api_error_keeps_plain_body() {
        let err = ClientError::api_error(502, "Bad Gateway");
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_not_found() {
        assert!(ClientError::api_error(404, r#"{"error":"Job not found"}"#).is_not_found());
        assert!(!ClientError::api_error(400, "nope").is_not_found());
    }
}
