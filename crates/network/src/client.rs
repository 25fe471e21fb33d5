// crates/network/src/client.rs
//! reqwest-backed transport

use crate::error::{GatewayError, GatewayResult};
use crate::transport::{ApiRequest, RawResponse, Transport};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Url};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("Harbor/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// HTTP transport talking to one remote service
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: ReqwestClient,
    base_url: Url,
}

impl HttpClient {
    /// Creates a client with custom configuration
    pub fn with_config(config: ClientConfig) -> GatewayResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::Configuration(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Configuration(format!(
                "'{}' cannot be used as a base URL",
                config.base_url
            )));
        }

        let inner = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { inner, base_url })
    }

    /// Returns the configured base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves request segments against the base URL, escaping each one
    pub fn url_for(&self, request: &ApiRequest) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Configuration("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> GatewayResult<RawResponse> {
        let url = self.url_for(request)?;

        let mut builder = self.inner.request(request.method.clone(), url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}
