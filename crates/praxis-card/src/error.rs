// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("canonicalize failed: {0}")]
    CanonicalizeFailed(#[from] praxis_canon::CanonError),

    #[error("jws error: {0}")]
    Jws(#[from] praxis_canon::JwsError),

    #[error("resolving DID: {0}")]
    DidResolve(#[from] praxis_did::DidError),

    #[error("verification method for fragment {0:?} not found in DID document")]
    VerificationMethodNotFound(String),

    #[error("verification method has no usable Ed25519 key")]
    KeyFormatUnsupported,

    #[error("card has no did configured to sign with")]
    NoSigningIdentity,

    #[error("serializing card: {0}")]
    Serde(#[from] serde_json::Error),
}
