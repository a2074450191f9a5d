//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default size of the per-worker transfer buffer (1 MiB).
pub const DEFAULT_BUFFER_BYTES: usize = 1024 * 1024;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address and port).
    pub listener: ListenerConfig,

    /// The fixed target every inbound connection is paired with.
    pub target: TargetConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Transfer engine settings.
    pub transfer: TransferConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IPv4 bind address (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Bind port. Port 0 asks the OS for an ephemeral port.
    pub bind_port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 0,
        }
    }
}

/// Target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// IPv4 address of the target.
    pub address: String,

    /// Target port.
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

/// Timeout configuration. Every wait in the relay has one of these ceilings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Accept polling interval in milliseconds.
    pub accept_ms: u64,

    /// Read-readiness polling interval in milliseconds.
    pub wait_ms: u64,

    /// Outbound connect timeout in milliseconds.
    pub connect_ms: u64,

    /// Hard limit for transmitting one buffer, in milliseconds.
    pub send_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            accept_ms: 5_000,
            wait_ms: 5_000,
            connect_ms: 5_000,
            send_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn accept(&self) -> Duration {
        Duration::from_millis(self.accept_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn send(&self) -> Duration {
        Duration::from_millis(self.send_ms)
    }
}

/// Transfer engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum block moved per read, allocated once per worker.
    pub buffer_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: DEFAULT_BUFFER_BYTES,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Append log lines to this file. A daemonized relay without one logs
    /// to `tcp-relay.log` in the temp directory.
    pub log_file: Option<PathBuf>,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "tcp_relay=info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: None,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
