//! Backend configuration shapes.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Configuration for a stdio-transport backend: a child process speaking
/// newline-delimited JSON-RPC on its stdin/stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioBackendConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub inherit_env: bool,
}

/// Configuration for an sse-transport backend: the supervisor hosts an HTTP
/// server at `bind_addr` fronting the backend's tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseBackendConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum BackendTransportConfig {
    Stdio(StdioBackendConfig),
    Sse(SseBackendConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: BackendTransportConfig,
}

/// Supervisor-wide tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub max_restart_attempts: u32,
    #[serde(with = "duration_secs")]
    pub restart_backoff: Duration,
    #[serde(with = "duration_secs")]
    pub health_interval: Duration,
    #[serde(with = "duration_secs")]
    pub introspection_delay: Duration,
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restart_attempts: 3,
            restart_backoff: Duration::from_secs(5),
            health_interval: Duration::from_secs(30),
            introspection_delay: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Duration, s: S) -> Result<S::Ok, S::Error> {
        v.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
