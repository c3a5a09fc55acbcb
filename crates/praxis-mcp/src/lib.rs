// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The MCP JSON-RPC envelope and request router.

pub mod envelope;
pub mod error;
pub mod router;

pub use envelope::{McpRequest, McpResponse};
pub use error::{code, McpError, RouterError};
pub use router::{BackendLookup, McpRouter, RouterConfig, RouterMetrics};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use praxis_card::{McpResource, McpTool};
    use std::sync::Arc;
    use std::time::Duration;

    struct MockBackends;

    #[async_trait]
    impl BackendLookup for MockBackends {
        async fn call_tool(
            &self,
            backend: &str,
            tool_name: &str,
            _params: serde_json::Value,
        ) -> Result<serde_json::Value, RouterError> {
            if backend != "fs" {
                return Err(RouterError::BackendNotFound(backend.to_string()));
            }
            if tool_name == "hang" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(serde_json::json!({ "ok": true, "tool": tool_name }))
        }

        async fn list_tools(&self, backend: &str) -> Result<Vec<McpTool>, RouterError> {
            Ok(vec![McpTool {
                name: format!("{backend}-tool"),
                description: String::new(),
                input_schema: None,
                output_schema: None,
            }])
        }

        async fn list_resources(&self, _backend: &str) -> Result<Vec<McpResource>, RouterError> {
            Ok(Vec::new())
        }

        async fn read_resource(
            &self,
            _backend: &str,
            uri: &str,
        ) -> Result<serde_json::Value, RouterError> {
            Ok(serde_json::json!({ "uri": uri, "content": "" }))
        }

        fn backend_names(&self) -> Vec<String> {
            vec!["fs".to_string(), "net".to_string()]
        }
    }

    fn router_with_limit(max: usize) -> McpRouter {
        McpRouter::new(
            Arc::new(MockBackends),
            RouterConfig {
                max_concurrent_requests: max,
                default_timeout_secs: 1,
            },
            tokio_util::sync::CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn tools_call_dispatches_to_backend() {
        let router = router_with_limit(8);
        let req = McpRequest {
            id: "r1".into(),
            method: envelope::METHOD_TOOLS_CALL.into(),
            server_name: "fs".into(),
            tool_name: Some("read_file".into()),
            params: serde_json::json!({"path": "/tmp/x"}),
            timeout: None,
        };
        let resp = router.process_request(req).await;
        assert_eq!(resp.id, "r1");
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let router = router_with_limit(8);
        let req = McpRequest {
            id: "m1".into(),
            method: "tools/fly".into(),
            server_name: "fs".into(),
            tool_name: None,
            params: serde_json::json!({}),
            timeout: None,
        };
        let resp = router.process_request(req).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, code::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_list_all_aggregates_across_backends() {
        let router = router_with_limit(8);
        let req = McpRequest {
            id: "t1".into(),
            method: envelope::METHOD_TOOLS_LIST.into(),
            server_name: "all".into(),
            tool_name: None,
            params: serde_json::json!({}),
            timeout: None,
        };
        let resp = router.process_request(req).await;
        let result = resp.result.unwrap();
        assert_eq!(result.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let router = router_with_limit(8);
        let req = McpRequest {
            id: "h1".into(),
            method: envelope::METHOD_TOOLS_CALL.into(),
            server_name: "fs".into(),
            tool_name: Some("hang".into()),
            params: serde_json::json!({}),
            timeout: Some(0),
        };
        let resp = tokio::time::timeout(Duration::from_millis(200), router.process_request(req))
            .await
            .expect("router must honor its own deadline");
        let err = resp.error.unwrap();
        assert_eq!(err.code, code::TIMEOUT);
    }

    #[tokio::test]
    async fn nplus1_overlapping_request_is_rate_limited() {
        let router = Arc::new(router_with_limit(4));
        let hold = |id: &str| {
            let router = router.clone();
            let id = id.to_string();
            tokio::spawn(async move {
                router
                    .process_request(McpRequest {
                        id,
                        method: envelope::METHOD_TOOLS_CALL.into(),
                        server_name: "fs".into(),
                        tool_name: Some("hang".into()),
                        params: serde_json::json!({}),
                        timeout: Some(5),
                    })
                    .await
            })
        };
        let handles: Vec<_> = (0..4).map(|i| hold(&format!("r{i}"))).collect();
        // Give the four holders time to register before the fifth arrives.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fifth = router
            .process_request(McpRequest {
                id: "r5".into(),
                method: envelope::METHOD_TOOLS_CALL.into(),
                server_name: "fs".into(),
                tool_name: Some("read_file".into()),
                params: serde_json::json!({}),
                timeout: None,
            })
            .await;
        assert_eq!(fifth.error.unwrap().code, code::SERVER_ERROR);
        for h in handles {
            h.abort();
        }
    }

    #[tokio::test]
    async fn cancelling_root_token_terminates_in_flight_request() {
        let root = tokio_util::sync::CancellationToken::new();
        let router = Arc::new(McpRouter::new(
            Arc::new(MockBackends),
            RouterConfig {
                max_concurrent_requests: 8,
                default_timeout_secs: 1,
            },
            root.clone(),
        ));
        let handle = tokio::spawn({
            let router = router.clone();
            async move {
                router
                    .process_request(McpRequest {
                        id: "h1".into(),
                        method: envelope::METHOD_TOOLS_CALL.into(),
                        server_name: "fs".into(),
                        tool_name: Some("hang".into()),
                        params: serde_json::json!({}),
                        timeout: Some(30),
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        root.cancel();
        let resp = tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("cancelling the root token must unblock the dispatch well before its own 30s timeout")
            .unwrap();
        assert_eq!(resp.error.unwrap().code, code::TIMEOUT);
    }
}
