//! Error types for the sync core.
//!
//! Gateway failures are classified into a fixed taxonomy; every variant maps
//! to a stable code string that rides along in emitted `Error` states. Nothing
//! in this core is fatal to the process: all gateway errors are caught at the
//! orchestration boundary and converted into typed states.

use thiserror::Error;

use crate::types::ErrorInfo;

/// Failure taxonomy for remote gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Invoice not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    DataFormat(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("{0}")]
    Unknown(String),
}

impl GatewayError {
    /// Stable error code string surfaced to the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::PermissionDenied(_) => "PERMISSION_DENIED",
            GatewayError::Network(_) => "NETWORK_ERROR",
            GatewayError::DataFormat(_) => "DATA_FORMAT_ERROR",
            GatewayError::Server { .. } => "SERVER_ERROR",
            GatewayError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Returns true for failures worth retrying at the transport layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_) | GatewayError::Server { .. }
        )
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            message: self.to_string(),
            code: self.code().to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            GatewayError::Network(err.to_string())
        } else if err.is_decode() {
            GatewayError::DataFormat(err.to_string())
        } else {
            GatewayError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::DataFormat(err.to_string())
    }
}

/// Errors surfaced by `CoreHandle` itself (not by remote operations).
#[derive(Debug, Error)]
pub enum CoreError {
    /// The actor's mailbox is gone; the core task has shut down.
    #[error("sync core is no longer running")]
    CoreShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(GatewayError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            GatewayError::PermissionDenied("x".into()).code(),
            "PERMISSION_DENIED"
        );
        assert_eq!(GatewayError::Network("x".into()).code(), "NETWORK_ERROR");
        assert_eq!(
            GatewayError::DataFormat("x".into()).code(),
            "DATA_FORMAT_ERROR"
        );
        assert_eq!(
            GatewayError::Server {
                status: 500,
                message: "x".into()
            }
            .code(),
            "SERVER_ERROR"
        );
        assert_eq!(GatewayError::Unknown("x".into()).code(), "UNKNOWN_ERROR");
    }

    #[test]
    fn retryability_matches_taxonomy() {
        assert!(GatewayError::Network("t".into()).is_retryable());
        assert!(GatewayError::Server {
            status: 503,
            message: "t".into()
        }
        .is_retryable());
        assert!(!GatewayError::NotFound("t".into()).is_retryable());
        assert!(!GatewayError::PermissionDenied("t".into()).is_retryable());
    }
}
