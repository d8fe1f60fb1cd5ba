//! Bridge configuration.
//!
//! Loaded from a Home Assistant add-on style JSON options file. Every key
//! is optional; a missing file yields pure defaults so the bridge can run
//! against a local broker with no configuration at all.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Configuration for the bridge process.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// MQTT broker address.
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,

    /// MQTT broker port.
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    /// Username for broker authentication; credentials are only applied
    /// when this is non-empty.
    #[serde(default)]
    pub mqtt_user: String,

    /// Password for broker authentication.
    #[serde(default)]
    pub mqtt_password: String,

    /// Log every decoded heartbeat and outbound keepalive.
    #[serde(default)]
    pub heartbeat_logging: bool,

    /// Log every accepted control write.
    #[serde(default)]
    pub control_logging: bool,

    /// Seconds without telemetry before a device is presumed offline.
    #[serde(default = "default_offline_timeout")]
    pub offline_timeout_secs: u64,

    /// Seconds between retained-discovery republish passes.
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    /// Seconds between keepalive pings to each device.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
}

fn default_mqtt_host() -> String {
    "core-mosquitto".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_offline_timeout() -> u64 {
    300
}
fn default_discovery_interval() -> u64 {
    300
}
fn default_keepalive_interval() -> u64 {
    30
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_user: String::new(),
            mqtt_password: String::new(),
            heartbeat_logging: false,
            control_logging: false,
            offline_timeout_secs: default_offline_timeout(),
            discovery_interval_secs: default_discovery_interval(),
            keepalive_interval_secs: default_keepalive_interval(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON options file. A missing file is not
    /// an error; it yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("no options file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse options file {}", path.display()))
    }

    pub fn full_broker_addr(&self) -> String {
        format!("{}:{}", self.mqtt_host, self.mqtt_port)
    }

    pub fn with_broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.mqtt_host = host.into();
        self.mqtt_port = port;
        self
    }

    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.mqtt_user = user.into();
        self.mqtt_password = password.into();
        self
    }
}
