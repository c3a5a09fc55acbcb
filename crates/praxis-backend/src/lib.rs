// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The backend supervisor: spawns and restarts stdio and sse backends, and
//! answers the MCP router's lookups.

pub mod config;
pub mod error;
pub mod sse;
pub mod stdio;
pub mod supervisor;

pub use config::{
    BackendConfig, BackendTransportConfig, SseBackendConfig, StdioBackendConfig, SupervisorConfig,
};
pub use error::BackendError;
pub use sse::{SseServer, SseToolRegistry};
pub use stdio::StdioChild;
pub use supervisor::BackendSupervisor;

#[cfg(test)]
mod tests {
    use super::*;
    use praxis_mcp::BackendLookup;
    use std::time::Duration;

    #[tokio::test]
    async fn stdio_backend_becomes_running_after_introspection() {
        let mut config = SupervisorConfig::default();
        config.introspection_delay = Duration::from_millis(10);
        let supervisor = BackendSupervisor::new(config);
        supervisor
            .register(
                BackendConfig {
                    name: "echo".into(),
                    transport: BackendTransportConfig::Stdio(StdioBackendConfig {
                        command: "cat".into(),
                        args: Vec::new(),
                        env: Default::default(),
                        working_dir: None,
                        inherit_env: true,
                    }),
                },
                None,
            )
            .await
            .expect("register");

        // `cat` never produces a JSON-RPC shaped response, so introspection
        // will fail its parse and the descriptor's tool list stays empty —
        // but the status still advances past `starting`.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(supervisor.backend_names(), vec!["echo".to_string()]);
        supervisor.shutdown().await;
    }
}
