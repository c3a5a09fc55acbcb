// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Capability card model: identity, skills, backends, and signatures.

pub mod error;
pub mod model;
pub mod sign;

pub use error::CardError;
pub use model::{
    BackendDescriptor, BackendStatus, BackendTransport, CapabilityCard, CardCapabilities,
    McpResource, McpTool, OnChainRegistration, Skill,
};
pub use sign::{sign_card, verify_card};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn sign_card_populates_signatures_and_identity() {
        let key = SigningKey::generate(&mut OsRng);
        let mut card = CapabilityCard::builder("agent-a", "1.0");
        card.upsert_backend(BackendDescriptor::new("fs", BackendTransport::Stdio));

        sign_card(&mut card, &key, "did:web:example.com", None, "key-1").unwrap();

        assert_eq!(card.did.as_deref(), Some("did:web:example.com"));
        assert_eq!(card.signatures.len(), 1);
        let header = card.signatures[0].decode_header().unwrap();
        assert_eq!(header.kid, "did:web:example.com#key-1");
    }
}
