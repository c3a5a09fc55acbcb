// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DidError {
    #[error("unsupported DID method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid DID string: {0}")]
    InvalidDid(String),

    #[error("DID document request returned HTTP {0}")]
    HttpNonOk(u16),

    #[error("fetching DID document: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("decoding DID document failed: {0}")]
    DecodeFailed(String),

    #[error("did:webvh content hash mismatch")]
    HashMismatch,
}
