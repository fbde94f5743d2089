//! Device Registry: stable per-install identity and remote liveness.

use std::sync::Arc;
use std::time::Duration;

use tether_core::config::DeviceConfig;
use tether_core::errors::TetherResult;
use tether_storage::SyncMetadata;

use crate::transport::{with_timeout, RegisterDeviceRequest, RemoteApi};

/// Registers this device with the remote once and sends heartbeats.
pub struct DeviceRegistry {
    metadata: Arc<SyncMetadata>,
    remote: Arc<dyn RemoteApi>,
    device: DeviceConfig,
    user_id: Option<String>,
    timeout: Duration,
}

impl DeviceRegistry {
    pub fn new(
        metadata: Arc<SyncMetadata>,
        remote: Arc<dyn RemoteApi>,
        device: DeviceConfig,
        user_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            metadata,
            remote,
            device,
            user_id,
            timeout,
        }
    }

    /// Persisted device id, generated on first use.
    pub fn device_id(&self) -> TetherResult<String> {
        self.metadata.get_or_create_device_id()
    }

    pub fn is_registered(&self) -> TetherResult<bool> {
        self.metadata.is_registered()
    }

    /// Register with the remote unless an earlier run already did.
    pub async fn ensure_registered(&self) -> TetherResult<String> {
        let device_id = self.device_id()?;
        if self.metadata.is_registered()? {
            return Ok(device_id);
        }
        let request = RegisterDeviceRequest {
            device_id: device_id.clone(),
            platform: self.device.platform.clone(),
            app_version: self.device.app_version.clone(),
            user_id: self.user_id.clone(),
        };
        with_timeout(self.timeout, self.remote.register_device(&request)).await?;
        self.metadata.set_registered()?;
        tracing::info!(device_id = %device_id, "device registered");
        Ok(device_id)
    }

    /// Cycle step 1: registration if still outstanding, then a heartbeat.
    pub async fn refresh_liveness(&self) -> TetherResult<String> {
        let device_id = self.ensure_registered().await?;
        with_timeout(self.timeout, self.remote.heartbeat(&device_id)).await?;
        Ok(device_id)
    }
}
