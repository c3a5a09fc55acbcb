// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonError {
    #[error("canonicalize failed: {0}")]
    CanonicalizeFailed(String),
}

#[derive(Debug, Error)]
pub enum JwsError {
    #[error("canonicalize failed: {0}")]
    CanonicalizeFailed(#[from] CanonError),

    #[error("protected header is invalid: {0}")]
    HeaderInvalid(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlg(String),

    #[error("kid header is missing or malformed")]
    KidMissing,

    #[error("key format is not supported: {0}")]
    KeyFormatUnsupported(String),

    #[error("signature is invalid")]
    SignatureInvalid,
}
