//! Configuration structures.
//!
//! Configuration is loaded from an optional JSON file; every section falls
//! back to its defaults when omitted. The server binary layers CLI/env
//! overrides on top.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{Error, Result};

/// Largest payload expressible in the 16-bit frame length field.
pub const MAX_FRAME_PAYLOAD: u32 = u16::MAX as u32;

/// Global host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// RPC transport configuration.
    #[serde(default)]
    pub ipc: IpcConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the transport cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.ipc.max_frame_bytes == 0 || self.ipc.max_frame_bytes > MAX_FRAME_PAYLOAD {
            return Err(Error::config(format!(
                "ipc.max_frame_bytes must be within 1..={}, got {}",
                MAX_FRAME_PAYLOAD, self.ipc.max_frame_bytes
            )));
        }
        if self.ipc.max_connections == 0 {
            return Err(Error::config("ipc.max_connections must be at least 1"));
        }
        if self.server.listen_addr.trim().is_empty() {
            return Err(Error::config("server.listen_addr must not be empty"));
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP bind address, `host:port`.
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "localhost:5555".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// RPC transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Maximum accepted frame payload size in bytes.
    pub max_frame_bytes: u32,

    /// Maximum concurrent TCP connections. Connections beyond this limit
    /// are rejected.
    pub max_connections: usize,

    /// Drop connections that stay silent for this long. `None` waits forever.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,

    /// Per-frame write timeout. Slow consumers are dropped.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Client-side bound on waiting for a reply.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_PAYLOAD,
            max_connections: 64,
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(5),
        }
    }
}
