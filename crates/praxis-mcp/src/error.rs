// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC-compatible error codes, extended per §4.4 of the wire spec.
pub mod code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const SERVER_ERROR: i64 = -32000;
    pub const TIMEOUT: i64 = -32001;
    pub const NOT_FOUND: i64 = -32002;
    pub const PERMISSION: i64 = -32003;
}

/// The wire error shape carried in an [`crate::envelope::McpResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn rate_limited(active: usize, max: usize) -> Self {
        Self::new(
            code::SERVER_ERROR,
            format!("too many concurrent requests ({active}/{max})"),
        )
        .with_data(serde_json::json!({ "active": active, "max": max }))
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(code::INVALID_REQUEST, reason.into())
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(code::INVALID_PARAMS, reason.into())
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(code::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(code::NOT_FOUND, reason.into())
    }

    pub fn timeout() -> Self {
        Self::new(code::TIMEOUT, "request timed out")
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(code::INTERNAL_ERROR, reason.into())
    }

    pub fn server_error(reason: impl Into<String>) -> Self {
        Self::new(code::SERVER_ERROR, reason.into())
    }
}

/// Router-internal errors — not the wire shape, but convertible to one at
/// the boundary (the single place the taxonomy is flattened, per the
/// propagation policy).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("too many concurrent requests ({active}/{max})")]
    RateLimited { active: usize, max: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("backend not found: {0}")]
    BackendNotFound(String),

    #[error("backend {0} is not running")]
    BackendNotRunning(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend returned an error: {0}")]
    Backend(McpError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RouterError> for McpError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::RateLimited { active, max } => McpError::rate_limited(active, max),
            RouterError::InvalidRequest(r) => McpError::invalid_request(r),
            RouterError::UnknownMethod(m) => McpError::method_not_found(&m),
            RouterError::BackendNotFound(b) => McpError::not_found(format!("backend not found: {b}")),
            RouterError::BackendNotRunning(b) => {
                McpError::not_found(format!("backend not running: {b}"))
            }
            RouterError::Timeout => McpError::timeout(),
            RouterError::Backend(e) => e,
            RouterError::Internal(r) => McpError::internal(r),
        }
    }
}
