// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `did:web` and `did:webvh` resolution with an in-memory TTL cache.

pub mod document;
pub mod error;
pub mod resolver;

pub use document::{DidDocument, Service, VerificationMethod};
pub use error::DidError;
pub use resolver::{did_web_to_url, CacheStats, DidResolver, DidResolverConfig};
