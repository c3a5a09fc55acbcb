//! The MCP request router: validates, rate-limits, dispatches, and times out
//! requests against backends reachable through a [`BackendLookup`].

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use praxis_card::{McpResource, McpTool};

use crate::envelope::{
    McpRequest, McpResponse, METHOD_INITIALIZE, METHOD_PING, METHOD_RESOURCES_LIST,
    METHOD_RESOURCES_READ, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, TARGET_ALL,
};
use crate::error::{McpError, RouterError};

/// The seam between the router and whatever owns backend state (the
/// supervisor). The router never touches backend internals directly — this
/// breaks the cyclic reference between router and supervisor.
#[async_trait]
pub trait BackendLookup: Send + Sync {
    async fn call_tool(
        &self,
        backend: &str,
        tool_name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RouterError>;

    async fn list_tools(&self, backend: &str) -> Result<Vec<McpTool>, RouterError>;

    async fn list_resources(&self, backend: &str) -> Result<Vec<McpResource>, RouterError>;

    async fn read_resource(&self, backend: &str, uri: &str) -> Result<serde_json::Value, RouterError>;

    /// Names of every backend currently registered (used for `target = "all"`).
    fn backend_names(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub max_concurrent_requests: usize,
    pub default_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 32,
            default_timeout_secs: crate::envelope::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouterMetrics {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub last_request_at: Option<DateTime<Utc>>,
}

pub struct McpRouter {
    config: RouterConfig,
    backends: std::sync::Arc<dyn BackendLookup>,
    active: StdMutex<HashMap<String, CancellationToken>>,
    metrics: StdMutex<RouterMetrics>,
    /// Root of every in-flight request's cancellation token. Cancelling it
    /// (on node shutdown) cancels every dispatch still in flight, not just
    /// those bound by their own request timeout.
    shutdown: CancellationToken,
}

impl McpRouter {
    pub fn new(backends: std::sync::Arc<dyn BackendLookup>, config: RouterConfig, shutdown: CancellationToken) -> Self {
        Self {
            config,
            backends,
            active: StdMutex::new(HashMap::new()),
            metrics: StdMutex::new(RouterMetrics::default()),
            shutdown,
        }
    }

    pub fn metrics(&self) -> RouterMetrics {
        self.metrics.lock().expect("router metrics lock poisoned").clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().expect("router active lock poisoned").len()
    }

    /// Process one MCP request end to end, per §4.4 of the wire spec.
    pub async fn process_request(&self, req: McpRequest) -> McpResponse {
        let id = req.id.clone();

        // Step 1 + 2: rate limit and register are atomic under one lock.
        let token = self.shutdown.child_token();
        {
            let mut active = self.active.lock().expect("router active lock poisoned");
            if active.len() >= self.config.max_concurrent_requests {
                let err = RouterError::RateLimited {
                    active: active.len(),
                    max: self.config.max_concurrent_requests,
                };
                self.record(false);
                return McpResponse::err(id, err.into());
            }
            active.insert(id.clone(), token.clone());
        }

        let result = self.process_validated(req, &token).await;

        // Step 5: deregister.
        self.active
            .lock()
            .expect("router active lock poisoned")
            .remove(&id);

        match result {
            Ok(value) => {
                self.record(true);
                McpResponse::ok(id, value)
            }
            Err(err) => {
                self.record(false);
                McpResponse::err(id, err.into())
            }
        }
    }

    async fn process_validated(
        &self,
        req: McpRequest,
        token: &CancellationToken,
    ) -> Result<serde_json::Value, RouterError> {
        // Step 3: validate.
        req.validate().map_err(RouterError::Backend)?;

        let deadline = Duration::from_secs(if req.timeout.is_some() {
            req.timeout_secs()
        } else {
            self.config.default_timeout_secs
        });

        // Step 4: dispatch, bounded by the request's own deadline.
        let dispatch = self.dispatch(&req);
        tokio::select! {
            result = tokio::time::timeout(deadline, dispatch) => {
                result.map_err(|_| RouterError::Timeout)?
            }
            _ = token.cancelled() => Err(RouterError::Timeout),
        }
    }

    async fn dispatch(&self, req: &McpRequest) -> Result<serde_json::Value, RouterError> {
        match req.method.as_str() {
            METHOD_TOOLS_CALL => {
                let tool_name = req
                    .tool_name
                    .as_deref()
                    .ok_or_else(|| RouterError::InvalidRequest("missing tool_name".into()))?;
                self.backends
                    .call_tool(&req.server_name, tool_name, req.params.clone())
                    .await
            }
            METHOD_TOOLS_LIST => {
                let mut tools = Vec::new();
                for name in self.target_backends(&req.server_name) {
                    tools.extend(self.backends.list_tools(&name).await?);
                }
                serde_json::to_value(tools).map_err(|e| RouterError::Internal(e.to_string()))
            }
            METHOD_RESOURCES_LIST => {
                let mut resources = Vec::new();
                for name in self.target_backends(&req.server_name) {
                    resources.extend(self.backends.list_resources(&name).await?);
                }
                serde_json::to_value(resources).map_err(|e| RouterError::Internal(e.to_string()))
            }
            METHOD_RESOURCES_READ => {
                let uri = req
                    .params
                    .get("uri")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| RouterError::InvalidRequest("missing uri".into()))?;
                self.backends.read_resource(&req.server_name, uri).await
            }
            METHOD_PING => Ok(serde_json::json!({
                "pong": true,
                "timestamp": Utc::now().to_rfc3339(),
                "server": req.server_name,
            })),
            METHOD_INITIALIZE => Ok(serde_json::json!({
                "protocolVersion": "1.0.0",
                "capabilities": { "tools": true, "resources": true },
            })),
            other => Err(RouterError::UnknownMethod(other.to_string())),
        }
    }

    /// Resolve `target = "all"` into every registered backend name, or a
    /// single-element list otherwise.
    fn target_backends(&self, target: &str) -> Vec<String> {
        if target == TARGET_ALL {
            self.backends.backend_names()
        } else {
            vec![target.to_string()]
        }
    }

    fn record(&self, success: bool) {
        let mut metrics = self.metrics.lock().expect("router metrics lock poisoned");
        metrics.total += 1;
        if success {
            metrics.success += 1;
        } else {
            metrics.failure += 1;
        }
        metrics.last_request_at = Some(Utc::now());
    }
}
