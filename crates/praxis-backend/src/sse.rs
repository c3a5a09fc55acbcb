//! sse transport: the supervisor hosts an HTTP server in-process, fronting a
//! backend's own tool registry. `GET /sse` streams a single `initialized`
//! event followed by keepalives; `POST /message` carries JSON-RPC requests;
//! `GET /health` is a plain liveness probe.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;

use praxis_mcp::{McpRequest, McpResponse, RouterError};

/// JSON-RPC messages have no legitimate reason to approach this size; reject
/// anything larger before it reaches serde.
const MAX_MESSAGE_BODY_BYTES: usize = 1024 * 1024;

/// A single sse backend's own tool/resource surface. The supervisor never
/// implements this itself — the owning process registers one per sse
/// backend at construction time.
#[async_trait]
pub trait SseToolRegistry: Send + Sync {
    async fn call_tool(
        &self,
        tool_name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RouterError>;

    async fn list_tools(&self) -> Result<Vec<praxis_card::McpTool>, RouterError>;

    async fn list_resources(&self) -> Result<Vec<praxis_card::McpResource>, RouterError>;

    async fn read_resource(&self, uri: &str) -> Result<serde_json::Value, RouterError>;
}

#[derive(Clone)]
struct SseState {
    name: String,
    registry: Arc<dyn SseToolRegistry>,
}

fn router(name: String, registry: Arc<dyn SseToolRegistry>) -> Router {
    Router::new()
        .route("/sse", get(sse_stream))
        .route(
            "/message",
            post(handle_message).layer(RequestBodyLimitLayer::new(MAX_MESSAGE_BODY_BYTES)),
        )
        .route("/health", get(health))
        .with_state(SseState { name, registry })
}

async fn sse_stream(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let tools = state.registry.list_tools().await.unwrap_or_default();
    let resources = state.registry.list_resources().await.unwrap_or_default();
    let payload = serde_json::json!({
        "server": state.name,
        "tools": tools,
        "resources": resources,
    })
    .to_string();
    let initial = stream::once(async move { Ok(Event::default().event("initialized").data(payload)) });
    Sse::new(initial).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn handle_message(
    State(state): State<SseState>,
    Json(req): Json<McpRequest>,
) -> impl IntoResponse {
    let id = req.id.clone();
    let result = dispatch(&state.registry, &req).await;
    let resp = match result {
        Ok(value) => McpResponse::ok(id, value),
        Err(err) => McpResponse::err(id, err.into()),
    };
    Json(resp)
}

async fn dispatch(
    registry: &Arc<dyn SseToolRegistry>,
    req: &McpRequest,
) -> Result<serde_json::Value, RouterError> {
    use praxis_mcp::envelope::{
        METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    };

    match req.method.as_str() {
        METHOD_TOOLS_CALL => {
            let tool_name = req
                .tool_name
                .as_deref()
                .ok_or_else(|| RouterError::InvalidRequest("missing tool_name".into()))?;
            registry.call_tool(tool_name, req.params.clone()).await
        }
        METHOD_TOOLS_LIST => {
            let tools = registry.list_tools().await?;
            serde_json::to_value(tools).map_err(|e| RouterError::Internal(e.to_string()))
        }
        METHOD_RESOURCES_LIST => {
            let resources = registry.list_resources().await?;
            serde_json::to_value(resources).map_err(|e| RouterError::Internal(e.to_string()))
        }
        METHOD_RESOURCES_READ => {
            let uri = req
                .params
                .get("uri")
                .and_then(|v| v.as_str())
                .ok_or_else(|| RouterError::InvalidRequest("missing uri".into()))?;
            registry.read_resource(uri).await
        }
        other => Err(RouterError::UnknownMethod(other.to_string())),
    }
}

async fn health(State(state): State<SseState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "server": state.name }))
}

/// A running sse-transport HTTP server for one backend.
pub struct SseServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl SseServer {
    pub async fn bind(
        name: String,
        addr: SocketAddr,
        registry: Arc<dyn SseToolRegistry>,
    ) -> Result<Self, crate::error::BackendError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(crate::error::BackendError::Spawn)?;
        let local_addr = listener.local_addr().map_err(crate::error::BackendError::Spawn)?;
        let shutdown = CancellationToken::new();
        let app = router(name, registry);
        let shutdown_signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app.into_make_service());
            let _ = serve
                .with_graceful_shutdown(async move { shutdown_signal.cancelled().await })
                .await;
        });
        Ok(Self {
            local_addr,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(self, grace: Duration) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(grace, self.handle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct EchoRegistry;

    #[async_trait]
    impl SseToolRegistry for EchoRegistry {
        async fn call_tool(
            &self,
            tool_name: &str,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, RouterError> {
            Ok(serde_json::json!({ "tool": tool_name }))
        }

        async fn list_tools(&self) -> Result<Vec<praxis_card::McpTool>, RouterError> {
            Ok(Vec::new())
        }

        async fn list_resources(&self) -> Result<Vec<praxis_card::McpResource>, RouterError> {
            Ok(Vec::new())
        }

        async fn read_resource(&self, uri: &str) -> Result<serde_json::Value, RouterError> {
            Ok(serde_json::json!({ "uri": uri }))
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy_and_server_name() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = SseServer::bind("echo".to_string(), addr, Arc::new(EchoRegistry))
            .await
            .unwrap();

        let body: serde_json::Value = reqwest::get(format!("http://{}/health", server.local_addr()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["server"], "echo");

        server.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn sse_stream_opens_with_backend_name_tools_and_resources() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = SseServer::bind("echo".to_string(), addr, Arc::new(EchoRegistry))
            .await
            .unwrap();

        let mut chunks = reqwest::get(format!("http://{}/sse", server.local_addr()))
            .await
            .unwrap()
            .bytes_stream();
        let first = chunks.next().await.unwrap().unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.contains("initialized"));
        assert!(text.contains("\"server\":\"echo\""));
        assert!(text.contains("\"tools\""));
        assert!(text.contains("\"resources\""));

        server.shutdown(Duration::from_millis(100)).await;
    }
}
