// crates/network/src/gateway.rs
//! Remote gateway: per-attempt timeout, bounded retry and status mapping

use crate::credentials::CredentialProvider;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::ApiEnvelope;
use crate::transport::{ApiRequest, RawResponse, Transport};
use harbor_resilience::{retry_async, RetryPolicy, Timeout};
use std::sync::Arc;
use std::time::Duration;

/// Longest slice of an unparseable error body kept in messages
const MAX_ERROR_BODY: usize = 200;

/// Executes requests against the remote with retries and timeouts
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    retry_policy: RetryPolicy,
    timeout: Timeout,
}

impl Gateway {
    /// Creates a gateway with the default policy: 3 attempts, 1s/2s backoff,
    /// 30s per attempt
    pub fn new(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            transport,
            credentials,
            retry_policy: RetryPolicy::default(),
            timeout: Timeout::default(),
        }
    }

    /// Sets the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Timeout::new(timeout);
        self
    }

    /// Returns the retry policy in use
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Sends a request, retrying transient failures
    ///
    /// Transport errors, timeouts, 429 and 5xx are retried with backoff;
    /// anything else comes back after the first attempt. A 401 is never
    /// retried.
    pub async fn execute(&self, request: &ApiRequest) -> GatewayResult<RawResponse> {
        let result = retry_async(&self.retry_policy, GatewayError::is_retryable, || {
            self.attempt(request)
        })
        .await;

        match &result {
            Err(e) if e.requires_reauthentication() => {
                log::warn!(
                    "{} {} rejected credentials; re-authentication required",
                    request.method,
                    request.path()
                );
            }
            Err(e) => log::debug!("{} {} failed: {}", request.method, request.path(), e),
            Ok(response) => log::debug!(
                "{} {} -> {}",
                request.method,
                request.path(),
                response.status
            ),
        }

        result
    }

    async fn attempt(&self, request: &ApiRequest) -> GatewayResult<RawResponse> {
        let token = self.credentials.bearer_token().await;
        let response = self
            .timeout
            .execute(self.transport.send(request, token.as_deref()))
            .await??;

        if response.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::from_status(
                response.status,
                error_message(&response),
            ))
        }
    }
}

/// Best human-readable reason carried by a failed response
fn error_message(response: &RawResponse) -> String {
    if let Some(message) = ApiEnvelope::parse(&response.body)
        .ok()
        .and_then(|env| env.error_message())
    {
        return message;
    }

    let body = response.body.trim();
    if !body.is_empty() {
        return body.chars().take(MAX_ERROR_BODY).collect();
    }

    reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}
