// crates/network/src/lib.rs
//! Remote side of the offline cache: HTTP transport, the retrying gateway,
//! the resource API and connectivity tracking

mod client;
mod connectivity;
mod credentials;
mod error;
mod gateway;
mod protocol;
mod resource;
mod transport;

pub use client::{ClientConfig, HttpClient};
pub use connectivity::{
    Connectivity, ConnectivityChecker, ConnectivityEvent, ConnectivityMonitor, LivenessProbe,
};
pub use credentials::{CredentialProvider, SharedCredentials, StaticCredentials};
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use protocol::{ApiEnvelope, BatchItemError, BatchRequest, BatchResponse};
pub use resource::{create_body, HttpResourceApi, ResourceApi, DEFAULT_RESOURCE_PATH};
pub use transport::{ApiRequest, RawResponse, Transport};
