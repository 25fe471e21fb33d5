// crates/network/src/resource.rs
//! Typed operations on the remote resource collection

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::protocol::{ApiEnvelope, BatchRequest, BatchResponse};
use crate::transport::ApiRequest;
use async_trait::async_trait;
use harbor_core::RecordId;
use reqwest::Method;
use serde_json::{json, Value};

/// Default collection segment
pub const DEFAULT_RESOURCE_PATH: &str = "resource";

/// Remote operations the sync orchestrator issues
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// `POST /resource`; returns the data the remote echoed back
    async fn create(&self, id: &RecordId, payload: &Value) -> GatewayResult<Option<Value>>;

    /// `PUT /resource/{id}`
    async fn update(&self, id: &RecordId, payload: &Value) -> GatewayResult<Option<Value>>;

    /// `DELETE /resource/{id}`; deleting something the remote never had
    /// succeeds
    async fn delete(&self, id: &RecordId) -> GatewayResult<()>;

    /// `GET /resource/{id}`; `None` when the remote has no such resource
    async fn fetch(&self, id: &RecordId) -> GatewayResult<Option<Value>>;

    /// `POST /resource/batch` with create bodies
    async fn push_batch(&self, items: &[(RecordId, Value)]) -> GatewayResult<BatchResponse>;
}

/// Builds the body of a create: object payloads get the `id` merged in,
/// anything else is wrapped as `{id, data}`
pub fn create_body(id: &RecordId, payload: &Value) -> Value {
    match payload {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            fields.insert("id".to_string(), Value::String(id.to_string()));
            Value::Object(fields)
        }
        other => json!({ "id": id.as_str(), "data": other }),
    }
}

/// [`ResourceApi`] over HTTP through a [`Gateway`]
#[derive(Clone)]
pub struct HttpResourceApi {
    gateway: Gateway,
    resource: String,
}

impl HttpResourceApi {
    /// Creates an API for the default `/resource` collection
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            resource: DEFAULT_RESOURCE_PATH.to_string(),
        }
    }

    /// Targets another collection segment
    pub fn with_resource_path(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    fn collection(&self, method: Method) -> ApiRequest {
        ApiRequest::new(method, [self.resource.as_str()])
    }

    fn member(&self, method: Method, id: &RecordId) -> ApiRequest {
        ApiRequest::new(method, [self.resource.as_str(), id.as_str()])
    }

    async fn send_enveloped(&self, request: ApiRequest) -> GatewayResult<Option<Value>> {
        let response = self.gateway.execute(&request).await?;
        ApiEnvelope::parse(&response.body)?.into_data(response.status)
    }
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn create(&self, id: &RecordId, payload: &Value) -> GatewayResult<Option<Value>> {
        let request = self
            .collection(Method::POST)
            .with_body(create_body(id, payload));
        self.send_enveloped(request).await
    }

    async fn update(&self, id: &RecordId, payload: &Value) -> GatewayResult<Option<Value>> {
        let request = self.member(Method::PUT, id).with_body(payload.clone());
        self.send_enveloped(request).await
    }

    async fn delete(&self, id: &RecordId) -> GatewayResult<()> {
        match self.send_enveloped(self.member(Method::DELETE, id)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                log::debug!("Remote has no {}; treating delete as done", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, id: &RecordId) -> GatewayResult<Option<Value>> {
        match self.send_enveloped(self.member(Method::GET, id)).await {
            Ok(data) => Ok(data),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn push_batch(&self, items: &[(RecordId, Value)]) -> GatewayResult<BatchResponse> {
        let body = BatchRequest {
            items: items
                .iter()
                .map(|(id, payload)| create_body(id, payload))
                .collect(),
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| GatewayError::Configuration(format!("unencodable batch: {}", e)))?;

        let request =
            ApiRequest::new(Method::POST, [self.resource.as_str(), "batch"]).with_body(body);
        let response = self.gateway.execute(&request).await?;

        let batch: BatchResponse = serde_json::from_str(&response.body).map_err(|e| {
            GatewayError::Transport(format!("malformed batch response: {}", e))
        })?;

        if !batch.success && batch.errors.is_empty() {
            return Err(GatewayError::ClientError {
                status: response.status,
                message: "batch rejected without item errors".to_string(),
            });
        }

        Ok(batch)
    }
}
