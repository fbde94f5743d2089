//! Transport: the remote API seam, the HTTP client behind it, wire types.

pub mod http_client;
pub mod protocol;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tether_core::errors::{RemoteError, TetherResult};
use tether_core::models::Payload;

pub use http_client::{HttpClient, HttpClientConfig};
pub use protocol::{PullResponse, PushRequest, RegisterDeviceRequest};

/// Remote answer to a pushed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PushAck {
    Accepted,
    /// The remote holds a newer version. `remote` carries it when supplied.
    Conflict { remote: Option<Payload> },
}

/// The remote source of truth.
///
/// Implementations map transport failures onto [`RemoteError`]; the engine
/// decides what is retried.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn register_device(&self, request: &RegisterDeviceRequest) -> TetherResult<()>;

    async fn heartbeat(&self, device_id: &str) -> TetherResult<()>;

    /// Changes since `since` (everything when `None`), scoped to the device.
    async fn pull_changes(
        &self,
        device_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> TetherResult<PullResponse>;

    async fn push_operation(&self, request: &PushRequest) -> TetherResult<PushAck>;
}

/// Bound a remote call. Elapsing is a transient [`RemoteError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> TetherResult<T>
where
    F: Future<Output = TetherResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout {
            after_ms: limit.as_millis() as u64,
        }
        .into()),
    }
}
