//! The backend supervisor: owns every backend's runtime state, restarts
//! failed backends up to a bound, introspects their tools/resources after
//! startup, and answers the router's [`BackendLookup`] queries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use praxis_card::{BackendDescriptor, BackendStatus, BackendTransport, McpResource, McpTool};
use praxis_mcp::{BackendLookup, McpRequest, RouterError};

use crate::config::{BackendConfig, BackendTransportConfig, SupervisorConfig};
use crate::error::BackendError;
use crate::sse::{SseServer, SseToolRegistry};
use crate::stdio::StdioChild;

enum BackendRuntime {
    Stdio(Mutex<StdioChild>),
    Sse {
        server: SseServer,
        registry: Arc<dyn SseToolRegistry>,
    },
}

struct BackendEntry {
    config: BackendConfig,
    descriptor: BackendDescriptor,
    runtime: Option<BackendRuntime>,
    restart_count: u32,
}

/// Owns every backend's lifecycle and implements [`BackendLookup`] for the
/// MCP router. Each backend's state is protected by the outer map lock for
/// status transitions, and by its own runtime handle for in-flight calls.
pub struct BackendSupervisor {
    config: SupervisorConfig,
    entries: Mutex<HashMap<String, BackendEntry>>,
    shutdown: CancellationToken,
}

impl BackendSupervisor {
    pub fn new(config: SupervisorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            entries: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn a backend's runtime and register it as `starting`. `sse_registry`
    /// must be `Some` iff `config.transport` is sse.
    pub async fn register(
        self: &Arc<Self>,
        config: BackendConfig,
        sse_registry: Option<Arc<dyn SseToolRegistry>>,
    ) -> Result<(), BackendError> {
        let name = config.name.clone();
        let transport_kind = match &config.transport {
            BackendTransportConfig::Stdio(_) => BackendTransport::Stdio,
            BackendTransportConfig::Sse(_) => BackendTransport::Sse,
        };
        let runtime = self.spawn_runtime(&config, sse_registry).await?;
        let entry = BackendEntry {
            config,
            descriptor: BackendDescriptor::new(name.clone(), transport_kind),
            runtime: Some(runtime),
            restart_count: 0,
        };
        self.entries.lock().await.insert(name.clone(), entry);
        self.schedule_introspection(name);
        Ok(())
    }

    async fn spawn_runtime(
        &self,
        config: &BackendConfig,
        sse_registry: Option<Arc<dyn SseToolRegistry>>,
    ) -> Result<BackendRuntime, BackendError> {
        match &config.transport {
            BackendTransportConfig::Stdio(stdio_config) => {
                let child = StdioChild::spawn(stdio_config)?;
                Ok(BackendRuntime::Stdio(Mutex::new(child)))
            }
            BackendTransportConfig::Sse(sse_config) => {
                let registry = sse_registry.ok_or(BackendError::PipeUnavailable)?;
                let server = SseServer::bind(config.name.clone(), sse_config.bind_addr, registry.clone()).await?;
                Ok(BackendRuntime::Sse { server, registry })
            }
        }
    }

    /// After `introspection_delay`, fetch the backend's tool/resource list
    /// and flip it to `running`.
    fn schedule_introspection(self: &Arc<Self>, name: String) {
        let this = self.clone();
        let delay = self.config.introspection_delay;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return,
            }
            this.introspect_and_mark_running(&name).await;
        });
    }

    async fn introspect_and_mark_running(&self, name: &str) {
        let tools = self.call_tools_list(name).await.unwrap_or_default();
        let resources = self.call_resources_list(name).await.unwrap_or_default();

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(name) {
            entry.descriptor.tools = tools;
            entry.descriptor.resources = resources;
            entry.descriptor.status = BackendStatus::Running;
            info!(backend = name, "backend running");
        }
    }

    async fn call_tools_list(&self, name: &str) -> Result<Vec<McpTool>, RouterError> {
        self.list_tools(name).await
    }

    async fn call_resources_list(&self, name: &str) -> Result<Vec<McpResource>, RouterError> {
        self.list_resources(name).await
    }

    /// Every `health_interval`, ping each backend; on failure attempt a
    /// bounded restart, escalating to `failed` once attempts are exhausted.
    pub fn spawn_health_loop(self: &Arc<Self>) {
        let this = self.clone();
        let interval = self.config.health_interval;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.health_check_all().await,
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }

    async fn health_check_all(self: &Arc<Self>) {
        let names: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        for name in names {
            if self.stdio_child_exited(&name).await || !self.ping(&name).await {
                self.handle_unhealthy(&name).await;
            }
        }
    }

    /// Detect a stdio backend whose child process has already exited,
    /// rather than waiting for the next ping to fail against a closed pipe.
    async fn stdio_child_exited(&self, name: &str) -> bool {
        let entries = self.entries.lock().await;
        let Some(entry) = entries.get(name) else {
            return false;
        };
        match &entry.runtime {
            Some(BackendRuntime::Stdio(child)) => {
                let mut child = child.lock().await;
                matches!(child.try_wait(), Ok(Some(_)))
            }
            _ => false,
        }
    }

    async fn ping(&self, name: &str) -> bool {
        let req = McpRequest {
            id: format!("health-{name}"),
            method: praxis_mcp::envelope::METHOD_PING.into(),
            server_name: name.to_string(),
            tool_name: None,
            params: serde_json::json!({}),
            timeout: Some(5),
        };
        self.call_backend(name, &req).await.is_ok()
    }

    async fn handle_unhealthy(self: &Arc<Self>, name: &str) {
        let should_restart = {
            let mut entries = self.entries.lock().await;
            let Some(entry) = entries.get_mut(name) else {
                return;
            };
            entry.descriptor.status = BackendStatus::Error;
            if entry.restart_count >= self.config.max_restart_attempts {
                entry.descriptor.status = BackendStatus::Failed;
                warn!(backend = name, "backend exhausted restart attempts");
                false
            } else {
                entry.restart_count += 1;
                true
            }
        };
        if should_restart {
            self.restart(name).await;
        }
    }

    async fn restart(self: &Arc<Self>, name: &str) {
        tokio::time::sleep(self.config.restart_backoff).await;
        let (config, sse_registry) = {
            let entries = self.entries.lock().await;
            let Some(entry) = entries.get(name) else {
                return;
            };
            let sse_registry = match &entry.runtime {
                Some(BackendRuntime::Sse { registry, .. }) => Some(registry.clone()),
                _ => None,
            };
            (entry.config.clone(), sse_registry)
        };

        match self.spawn_runtime(&config, sse_registry).await {
            Ok(runtime) => {
                let mut entries = self.entries.lock().await;
                if let Some(entry) = entries.get_mut(name) {
                    entry.runtime = Some(runtime);
                    entry.descriptor.status = BackendStatus::Starting;
                }
                drop(entries);
                self.schedule_introspection(name.to_string());
            }
            Err(err) => {
                warn!(backend = name, error = %err, "backend restart failed");
            }
        }
    }

    /// Snapshot every backend's current public descriptor, for building a
    /// capability card.
    pub async fn descriptors(&self) -> Vec<BackendDescriptor> {
        self.entries
            .lock()
            .await
            .values()
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Stop every backend, giving each up to `shutdown_grace` to exit
    /// cleanly before the process is torn down regardless.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut entries = self.entries.lock().await;
        for (name, mut entry) in entries.drain() {
            entry.descriptor.status = BackendStatus::Stopped;
            match entry.runtime.take() {
                Some(BackendRuntime::Stdio(child)) => {
                    child.into_inner().shutdown(self.config.shutdown_grace).await;
                }
                Some(BackendRuntime::Sse { server, .. }) => {
                    server.shutdown(self.config.shutdown_grace).await;
                }
                None => {}
            }
            info!(backend = name, "backend stopped");
        }
    }

    async fn call_backend(
        &self,
        name: &str,
        req: &McpRequest,
    ) -> Result<serde_json::Value, RouterError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| RouterError::BackendNotFound(name.to_string()))?;

        if !matches!(
            entry.descriptor.status,
            BackendStatus::Running | BackendStatus::Starting
        ) {
            return Err(RouterError::BackendNotRunning(name.to_string()));
        }

        match entry.runtime.as_ref() {
            Some(BackendRuntime::Stdio(child)) => {
                let mut child = child.lock().await;
                child
                    .call(req)
                    .await
                    .map_err(|e| RouterError::Backend(praxis_mcp::McpError::internal(e.to_string())))?
                    .result
                    .ok_or_else(|| RouterError::Internal("backend returned no result".into()))
            }
            Some(BackendRuntime::Sse { registry, .. }) => dispatch_to_registry(registry, req).await,
            None => Err(RouterError::BackendNotRunning(name.to_string())),
        }
    }
}

async fn dispatch_to_registry(
    registry: &Arc<dyn SseToolRegistry>,
    req: &McpRequest,
) -> Result<serde_json::Value, RouterError> {
    use praxis_mcp::envelope::{
        METHOD_PING, METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ, METHOD_TOOLS_CALL,
        METHOD_TOOLS_LIST,
    };

    match req.method.as_str() {
        METHOD_TOOLS_CALL => {
            let tool_name = req
                .tool_name
                .as_deref()
                .ok_or_else(|| RouterError::InvalidRequest("missing tool_name".into()))?;
            registry.call_tool(tool_name, req.params.clone()).await
        }
        METHOD_TOOLS_LIST => serde_json::to_value(registry.list_tools().await?)
            .map_err(|e| RouterError::Internal(e.to_string())),
        METHOD_RESOURCES_LIST => serde_json::to_value(registry.list_resources().await?)
            .map_err(|e| RouterError::Internal(e.to_string())),
        METHOD_RESOURCES_READ => {
            let uri = req
                .params
                .get("uri")
                .and_then(|v| v.as_str())
                .ok_or_else(|| RouterError::InvalidRequest("missing uri".into()))?;
            registry.read_resource(uri).await
        }
        METHOD_PING => Ok(serde_json::json!({ "pong": true })),
        other => Err(RouterError::UnknownMethod(other.to_string())),
    }
}

#[async_trait]
impl BackendLookup for BackendSupervisor {
    async fn call_tool(
        &self,
        backend: &str,
        tool_name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RouterError> {
        let req = McpRequest {
            id: format!("{backend}-{tool_name}"),
            method: praxis_mcp::envelope::METHOD_TOOLS_CALL.into(),
            server_name: backend.to_string(),
            tool_name: Some(tool_name.to_string()),
            params,
            timeout: None,
        };
        self.call_backend(backend, &req).await
    }

    async fn list_tools(&self, backend: &str) -> Result<Vec<McpTool>, RouterError> {
        let req = McpRequest {
            id: format!("{backend}-tools-list"),
            method: praxis_mcp::envelope::METHOD_TOOLS_LIST.into(),
            server_name: backend.to_string(),
            tool_name: None,
            params: serde_json::json!({}),
            timeout: None,
        };
        let value = self.call_backend(backend, &req).await?;
        serde_json::from_value(value).map_err(|e| RouterError::Internal(e.to_string()))
    }

    async fn list_resources(&self, backend: &str) -> Result<Vec<McpResource>, RouterError> {
        let req = McpRequest {
            id: format!("{backend}-resources-list"),
            method: praxis_mcp::envelope::METHOD_RESOURCES_LIST.into(),
            server_name: backend.to_string(),
            tool_name: None,
            params: serde_json::json!({}),
            timeout: None,
        };
        let value = self.call_backend(backend, &req).await?;
        serde_json::from_value(value).map_err(|e| RouterError::Internal(e.to_string()))
    }

    async fn read_resource(&self, backend: &str, uri: &str) -> Result<serde_json::Value, RouterError> {
        let req = McpRequest {
            id: format!("{backend}-resources-read"),
            method: praxis_mcp::envelope::METHOD_RESOURCES_READ.into(),
            server_name: backend.to_string(),
            tool_name: None,
            params: serde_json::json!({ "uri": uri }),
            timeout: None,
        };
        self.call_backend(backend, &req).await
    }

    fn backend_names(&self) -> Vec<String> {
        self.entries
            .try_lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StdioBackendConfig;

    fn echo_stdio_config(name: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            transport: BackendTransportConfig::Stdio(StdioBackendConfig {
                command: "cat".to_string(),
                args: Vec::new(),
                env: Default::default(),
                working_dir: None,
                inherit_env: true,
            }),
        }
    }

    #[tokio::test]
    async fn register_starts_in_starting_state() {
        let supervisor = BackendSupervisor::new(SupervisorConfig::default());
        supervisor
            .register(echo_stdio_config("echo"), None)
            .await
            .expect("register");
        let descriptors = supervisor.descriptors().await;
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].status, BackendStatus::Starting);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_backend_is_not_found() {
        let supervisor = BackendSupervisor::new(SupervisorConfig::default());
        let err = supervisor.call_tool("missing", "x", serde_json::json!({})).await;
        assert!(matches!(err, Err(RouterError::BackendNotFound(_))));
    }

    fn crashing_stdio_config(name: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            transport: BackendTransportConfig::Stdio(StdioBackendConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), "exit 1".to_string()],
                env: Default::default(),
                working_dir: None,
                inherit_env: true,
            }),
        }
    }

    #[tokio::test]
    async fn backend_that_crashes_every_restart_reaches_failed_after_max_attempts() {
        use std::time::Duration;

        let supervisor = BackendSupervisor::new(SupervisorConfig {
            max_restart_attempts: 3,
            restart_backoff: Duration::from_millis(10),
            health_interval: Duration::from_millis(20),
            introspection_delay: Duration::from_millis(5),
            shutdown_grace: Duration::from_millis(50),
        });
        supervisor
            .register(crashing_stdio_config("crasher"), None)
            .await
            .expect("register");
        supervisor.spawn_health_loop();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let descriptors = supervisor.descriptors().await;
            let status = descriptors[0].status;
            if status == BackendStatus::Failed {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "backend never reached Failed, stuck at {status:?}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        supervisor.shutdown().await;
    }
}
