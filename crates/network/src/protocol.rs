// crates/network/src/protocol.rs
//! Wire format of the remote resource API

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope wrapping every single-resource answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// Whether the remote accepted the request
    pub success: bool,
    /// Resource data echoed back, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error detail when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ApiEnvelope {
    /// Parses a response body; an empty body counts as a bare success
    pub fn parse(body: &str) -> GatewayResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self {
                success: true,
                data: None,
                error: None,
            });
        }
        serde_json::from_str(body)
            .map_err(|e| GatewayError::Transport(format!("malformed response body: {}", e)))
    }

    /// Error detail rendered as text
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|err| match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Returns the data of a successful envelope, or the rejection as a
    /// `ClientError` carrying `status`
    pub fn into_data(self, status: u16) -> GatewayResult<Option<Value>> {
        if self.success {
            Ok(self.data)
        } else {
            let message = self
                .error_message()
                .unwrap_or_else(|| "request rejected".to_string());
            Err(GatewayError::ClientError { status, message })
        }
    }
}

/// Body of `POST /resource/batch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Create bodies, each carrying its `id`
    pub items: Vec<Value>,
}

/// Answer to a batch push
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// True when every item was accepted
    pub success: bool,
    /// Accepted item count
    #[serde(default)]
    pub synced: usize,
    /// Rejected item count
    #[serde(default)]
    pub failed: usize,
    /// Per-item rejections
    #[serde(default)]
    pub errors: Vec<BatchItemError>,
}

impl BatchResponse {
    /// Returns the rejection recorded for `id`, if any
    pub fn error_for(&self, id: &str) -> Option<&BatchItemError> {
        self.errors.iter().find(|e| e.id == id)
    }
}

/// One rejected batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Record id of the rejected item
    pub id: String,
    /// Why it was rejected
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success_envelope() {
        let env = ApiEnvelope::parse(r#"{"success":true,"data":{"id":"r1"}}"#).unwrap();
        assert_eq!(env.clone().into_data(201).unwrap(), Some(json!({"id": "r1"})));
    }

    #[test]
    fn test_empty_body_is_success() {
        let env = ApiEnvelope::parse("  ").unwrap();
        assert!(env.success);
        assert_eq!(env.into_data(204).unwrap(), None);
    }

    #[test]
    fn test_rejected_envelope_is_client_error() {
        let env = ApiEnvelope::parse(r#"{"success":false,"error":"duplicate email"}"#).unwrap();
        assert_eq!(
            env.into_data(200).unwrap_err(),
            GatewayError::ClientError {
                status: 200,
                message: "duplicate email".to_string()
            }
        );
    }

    #[test]
    fn test_structured_error_rendered() {
        let env = ApiEnvelope::parse(r#"{"success":false,"error":{"code":7}}"#).unwrap();
        assert_eq!(env.error_message().as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn test_malformed_body_is_transport_error() {
        let err = ApiEnvelope::parse("<html>oops</html>").unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn test_batch_response_defaults() {
        let resp: BatchResponse = serde_json::from_str(
            r#"{"success":false,"synced":1,"errors":[{"id":"b","error":"invalid"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.failed, 0);
        assert_eq!(resp.error_for("b").map(|e| e.error.as_str()), Some("invalid"));
        assert!(resp.error_for("a").is_none());
    }
}
