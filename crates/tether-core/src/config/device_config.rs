use serde::{Deserialize, Serialize};

/// Values reported when the device registers with the remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub platform: String,
    pub app_version: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
