// crates/network/src/error.rs
//! Error types for calls to the remote service

use harbor_resilience::ResilienceError;
use std::time::Duration;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur talking to the remote service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never produced an HTTP answer, or the answer was unreadable
    #[error("Transport error: {0}")]
    Transport(String),

    /// An attempt exceeded the per-call timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP 429
    #[error("Rate limited by remote: {message}")]
    RateLimited { message: String },

    /// HTTP 5xx
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Any other rejection: 4xx besides 401/429, or an envelope with
    /// `success: false`
    #[error("Request rejected with {status}: {message}")]
    ClientError { status: u16, message: String },

    /// HTTP 401; the credential has to be renewed
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Local misconfiguration (bad base URL and the like)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Returns true if the error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_)
                | GatewayError::Timeout(_)
                | GatewayError::RateLimited { .. }
                | GatewayError::ServerError { .. }
        )
    }

    /// Returns true if the credential must be renewed before retrying
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, GatewayError::Unauthorized { .. })
    }

    /// Returns true if the remote reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::ClientError { status: 404, .. })
    }

    /// Returns the HTTP status behind this error, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::RateLimited { .. } => Some(429),
            GatewayError::Unauthorized { .. } => Some(401),
            GatewayError::ServerError { status, .. } | GatewayError::ClientError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Maps an HTTP status outside 2xx to its error class
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => GatewayError::Unauthorized { message },
            429 => GatewayError::RateLimited { message },
            500..=599 => GatewayError::ServerError { status, message },
            _ => GatewayError::ClientError { status, message },
        }
    }
}

impl From<ResilienceError> for GatewayError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Timeout(duration) => GatewayError::Timeout(duration),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            GatewayError::Configuration(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GatewayError::from_status(401, "expired"),
            GatewayError::Unauthorized { .. }
        ));
        assert!(matches!(
            GatewayError::from_status(429, "slow down"),
            GatewayError::RateLimited { .. }
        ));
        assert!(matches!(
            GatewayError::from_status(503, "down"),
            GatewayError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            GatewayError::from_status(422, "bad email"),
            GatewayError::ClientError { status: 422, .. }
        ));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(GatewayError::Transport("reset".to_string()).is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(GatewayError::from_status(429, "").is_retryable());
        assert!(GatewayError::from_status(500, "").is_retryable());

        assert!(!GatewayError::from_status(400, "").is_retryable());
        assert!(!GatewayError::from_status(404, "").is_retryable());
        assert!(!GatewayError::from_status(409, "").is_retryable());
        assert!(!GatewayError::from_status(401, "").is_retryable());
        assert!(!GatewayError::Configuration("bad url".to_string()).is_retryable());
    }

    #[test]
    fn test_reauthentication_signal() {
        assert!(GatewayError::from_status(401, "").requires_reauthentication());
        assert!(!GatewayError::from_status(403, "").requires_reauthentication());
    }

    #[test]
    fn test_not_found_and_status() {
        let err = GatewayError::from_status(404, "gone");
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert_eq!(GatewayError::Transport("x".to_string()).status(), None);
    }

    #[test]
    fn test_timeout_from_resilience() {
        let err: GatewayError = ResilienceError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(err, GatewayError::Timeout(Duration::from_secs(30)));
        assert!(err.to_string().contains("timed out"));
    }
}
