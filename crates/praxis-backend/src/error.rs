// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend {0} not found")]
    NotFound(String),

    #[error("backend {0} is not running")]
    NotRunning(String),

    #[error("spawning child process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("child process stdio pipe unavailable")]
    PipeUnavailable,

    #[error("child process exited before responding")]
    ChildExited,

    #[error("malformed JSON-RPC frame: {0}")]
    MalformedFrame(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("backend {0} reached the terminal failed state")]
    Failed(String),
}
