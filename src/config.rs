//! Per-controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handshake::transport::LinkOptions;
use crate::handshake::Credentials;
use crate::profile::{CompiledProfile, DeviceProfile, ProfileError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid device profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("host must not be empty")]
    EmptyHost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub host: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub login: Option<String>,
    /// Absent password disables the handshake.
    pub password: Option<String>,
    pub settle_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub connect_timeout_ms: u64,
    pub name_table_file: String,
    pub profile: DeviceProfile,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            tcp_port: 3000,
            udp_port: 3001,
            login: None,
            password: None,
            settle_ms: 1000,
            reconnect_backoff_ms: 500,
            connect_timeout_ms: 3000,
            name_table_file: "names.xml".to_string(),
            profile: DeviceProfile::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<CompiledProfile, ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(self.profile.compile()?)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let password = self.password.as_ref()?;
        Some(Credentials::new(
            self.login.clone().unwrap_or_default(),
            password.clone(),
        ))
    }

    pub fn tcp_peer(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }

    pub fn udp_peer(&self) -> String {
        format!("{}:{}", self.host, self.udp_port)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reconnect_backoff: Duration::from_millis(self.reconnect_backoff_ms),
        }
    }
}
