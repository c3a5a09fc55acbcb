//! Signing and verification of capability cards.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{SigningKey, VerifyingKey};
use praxis_canon::{signing_payload, verify as jws_verify};
use praxis_did::{DidResolver, VerificationMethod};

use crate::error::CardError;
use crate::model::CapabilityCard;

const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Sign `card` in place: sets `did`/`didDocUri`, clears existing signatures,
/// computes the canonical payload, and appends a fresh detached JWS.
pub fn sign_card(
    card: &mut CapabilityCard,
    key: &SigningKey,
    did: impl Into<String>,
    did_doc_uri: Option<String>,
    key_fragment: &str,
) -> Result<(), CardError> {
    let did = did.into();
    card.did = Some(did.clone());
    card.did_doc_uri = did_doc_uri;
    card.signatures.clear();

    let payload = signing_payload(&serde_json::to_value(&*card)?)?;
    let kid = format!("{did}#{key_fragment}");
    let jws = praxis_canon::sign(&payload, key, kid, card.version.clone())?;
    card.signatures.push(jws);
    Ok(())
}

/// Verify every signature on `card`, resolving keys through `resolver`.
/// Fails fast on the first invalid or unresolvable signature.
pub async fn verify_card(card: &CapabilityCard, resolver: &DidResolver) -> Result<(), CardError> {
    let mut unsigned = card.clone();
    unsigned.signatures.clear();
    let payload = signing_payload(&serde_json::to_value(&unsigned)?)?;

    for jws in &card.signatures {
        let header = jws.decode_header()?;
        let (did, fragment) = header.parse_kid()?;

        let document = resolver.resolve(did).await?;
        let vm = document
            .find_verification_method(fragment)
            .ok_or_else(|| CardError::VerificationMethodNotFound(fragment.to_string()))?;

        let verifying_key = extract_ed25519_key(vm)?;
        jws_verify(jws, &payload, &verifying_key)?;
    }
    Ok(())
}

fn extract_ed25519_key(vm: &VerificationMethod) -> Result<VerifyingKey, CardError> {
    if let Some(multibase_key) = &vm.public_key_multibase {
        let (_, bytes) =
            multibase::decode(multibase_key).map_err(|_| CardError::KeyFormatUnsupported)?;
        let raw = bytes
            .strip_prefix(ED25519_MULTICODEC.as_slice())
            .unwrap_or(&bytes);
        let key_bytes: [u8; 32] = raw.try_into().map_err(|_| CardError::KeyFormatUnsupported)?;
        return VerifyingKey::from_bytes(&key_bytes).map_err(|_| CardError::KeyFormatUnsupported);
    }

    if let Some(jwk) = &vm.public_key_jwk {
        let x = jwk
            .get("x")
            .and_then(|v| v.as_str())
            .ok_or(CardError::KeyFormatUnsupported)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(x)
            .map_err(|_| CardError::KeyFormatUnsupported)?;
        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| CardError::KeyFormatUnsupported)?;
        return VerifyingKey::from_bytes(&key_bytes).map_err(|_| CardError::KeyFormatUnsupported);
    }

    Err(CardError::KeyFormatUnsupported)
}
