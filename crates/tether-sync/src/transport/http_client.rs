//! HTTP client for the remote API: bearer auth, gzip, per-request timeout.
//!
//! No retry loop here. A failed push stays in the Operation Log and is
//! retried by a later cycle under its retry budget.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;

use tether_core::config::SyncConfig;
use tether_core::errors::{RemoteError, TetherError, TetherResult};
use tether_core::models::payload_from_value;
use tether_core::time::format_timestamp;

use super::protocol::{
    Envelope, HeartbeatRequest, PullResponse, PushConflictBody, PushRequest,
    RegisterDeviceRequest,
};
use super::{PushAck, RemoteApi};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the remote API, without a trailing slash.
    pub base_url: String,
    /// Whole-request timeout, connect included.
    pub timeout: Duration,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub bearer_token: Option<String>,
}

impl HttpClientConfig {
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.request_timeout_ms),
            bearer_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        }
    }
}

fn net_err(reason: String) -> TetherError {
    RemoteError::Network { reason }.into()
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    config: HttpClientConfig,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> TetherResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(|e| net_err(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.bearer_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn post_json<T: Serialize>(&self, path: &str, payload: T) -> RequestBuilder {
        let body = Envelope::new(payload, Utc::now());
        self.authorize(self.client.post(self.url(path)).json(&body))
    }

    async fn send(&self, req: RequestBuilder) -> TetherResult<Response> {
        req.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout {
                    after_ms: self.config.timeout.as_millis() as u64,
                }
                .into()
            } else {
                net_err(e.to_string())
            }
        })
    }
}

/// Map a non-success status onto the error taxonomy.
async fn check_status(resp: Response) -> TetherResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let reason = resp.text().await.unwrap_or_default();
    Err(status_error(status, reason).into())
}

fn status_error(status: StatusCode, reason: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth { reason },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            RemoteError::Rejected {
                status: status.as_u16(),
                reason,
            }
        }
        _ => RemoteError::Network {
            reason: format!("HTTP {status}: {reason}"),
        },
    }
}

#[async_trait]
impl RemoteApi for HttpClient {
    async fn register_device(&self, request: &RegisterDeviceRequest) -> TetherResult<()> {
        let resp = self
            .send(self.post_json("/devices/register", request))
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn heartbeat(&self, device_id: &str) -> TetherResult<()> {
        let body = HeartbeatRequest {
            device_id: device_id.to_string(),
        };
        let resp = self
            .send(self.post_json("/devices/heartbeat", &body))
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn pull_changes(
        &self,
        device_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> TetherResult<PullResponse> {
        let mut query = vec![("deviceId", device_id.to_string())];
        if let Some(ts) = since {
            query.push(("since", format_timestamp(&ts)));
        }
        let req = self.authorize(self.client.get(self.url("/sync/changes")).query(&query));
        let resp = check_status(self.send(req).await?).await?;
        resp.json::<PullResponse>().await.map_err(|e| {
            RemoteError::Protocol {
                reason: format!("pull response: {e}"),
            }
            .into()
        })
    }

    async fn push_operation(&self, request: &PushRequest) -> TetherResult<PushAck> {
        let req = self
            .post_json("/sync/push", request)
            .header(IDEMPOTENCY_HEADER, &request.operation_id);
        let resp = self.send(req).await?;

        if resp.status() == StatusCode::CONFLICT {
            // A 409 without a readable body is still a conflict.
            let body: PushConflictBody = resp.json().await.unwrap_or_default();
            return Ok(conflict_ack(request, body));
        }

        check_status(resp).await?;
        Ok(PushAck::Accepted)
    }
}

/// Build the conflict answer for a 409. A remote version that is not a JSON
/// object is dropped; the pull surfaces the conflict instead.
fn conflict_ack(request: &PushRequest, body: PushConflictBody) -> PushAck {
    let remote = body.remote.and_then(|value| {
        payload_from_value(&request.collection, &request.document_id, value)
            .map_err(|e| {
                tracing::warn!(
                    operation_id = %request.operation_id,
                    error = %e,
                    "unusable remote version in conflict response"
                );
            })
            .ok()
    });
    PushAck::Conflict { remote }
}
