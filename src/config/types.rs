use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::DEFAULT_MAX_FRAME_BYTES;

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

/// Socket and framing settings shared by host and producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Socket path; a per-process path in the runtime dir when unset.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    /// Largest accepted frame payload in bytes (default: 16 MiB).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Time to wait for a service response (default: 10 000 ms).
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Disk cache for fetched fonts and icons; in-memory only when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Timeout for one resource download in seconds (default: 30).
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u32,
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_timeout_seconds() -> u32 {
    30
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
        }
    }
}

impl TransportConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(default_socket_path)
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ResourceConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.fetch_timeout_seconds))
    }
}

/// `viewsync-{pid}.sock` in the user runtime dir, or the temp dir.
pub fn default_socket_path() -> PathBuf {
    let dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
    dir.join(format!("viewsync-{}.sock", std::process::id()))
}
