//! The MCP JSON-RPC envelope exchanged both locally and over `/mcp/bridge/1.0.0`.

use serde::{Deserialize, Serialize};

use crate::error::McpError;

/// Methods understood by the router.
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_RESOURCES_LIST: &str = "resources/list";
pub const METHOD_RESOURCES_READ: &str = "resources/read";
pub const METHOD_PING: &str = "ping";
pub const METHOD_INITIALIZE: &str = "initialize";

/// A backend target meaning "every backend" for aggregate list queries.
pub const TARGET_ALL: &str = "all";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub id: String,
    pub method: String,
    pub server_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl McpRequest {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Validate the structural invariants from the data model: non-empty
    /// id, known method, non-empty backend unless the method is a
    /// meta-query, and `tool_name` present iff `method == tools/call`.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.id.is_empty() {
            return Err(McpError::invalid_request("request id must not be empty"));
        }
        let known = matches!(
            self.method.as_str(),
            METHOD_TOOLS_CALL
                | METHOD_TOOLS_LIST
                | METHOD_RESOURCES_LIST
                | METHOD_RESOURCES_READ
                | METHOD_PING
                | METHOD_INITIALIZE
        );
        if !known {
            return Err(McpError::method_not_found(&self.method));
        }
        let is_meta_query = matches!(self.method.as_str(), METHOD_PING | METHOD_INITIALIZE);
        if self.server_name.is_empty() && !is_meta_query {
            return Err(McpError::invalid_request(
                "server_name must not be empty unless method is a meta-query",
            ));
        }
        if self.method == METHOD_TOOLS_CALL && self.tool_name.is_none() {
            return Err(McpError::invalid_params(
                "tool_name is required when method = tools/call",
            ));
        }
        if self.method == METHOD_RESOURCES_READ
            && self.params.get("uri").and_then(|v| v.as_str()).is_none()
        {
            return Err(McpError::invalid_params(
                "uri parameter is required for resources/read",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: McpError) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}
