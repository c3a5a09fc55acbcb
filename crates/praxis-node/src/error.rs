// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("card error: {0}")]
    Card(#[from] praxis_card::CardError),

    #[error("backend error: {0}")]
    Backend(#[from] praxis_backend::BackendError),

    #[error("p2p error: {0}")]
    P2p(#[from] praxis_p2p::P2pError),

    #[error("shutdown timed out waiting for {0}")]
    ShutdownTimeout(&'static str),
}
