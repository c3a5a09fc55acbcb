//! Detached JWS signing and verification over canonical JSON.
//!
//! The protected header is `{alg, kid, typ, ts, cardVersion}`; the signing
//! input is `base64url(header) || "." || base64url(payload)` where `payload`
//! is the canonical encoding of the signed document with `signatures`
//! omitted. Ed25519 (`alg: "EdDSA"`) is the only supported algorithm.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canon::canonicalize;
use crate::error::JwsError;

pub const ALG_EDDSA: &str = "EdDSA";
pub const TYP_AGENT_CARD: &str = "application/prxs-agent-card+jws";

/// The protected header of a detached JWS, as specified in the card-signing
/// flow. `ts` is RFC 3339 UTC; `card_version` mirrors the card's own
/// version field at signing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedHeader {
    pub alg: String,
    pub kid: String,
    pub typ: String,
    pub ts: String,
    #[serde(rename = "cardVersion")]
    pub card_version: String,
}

impl ProtectedHeader {
    pub fn new(kid: impl Into<String>, card_version: impl Into<String>) -> Self {
        Self {
            alg: ALG_EDDSA.to_string(),
            kid: kid.into(),
            typ: TYP_AGENT_CARD.to_string(),
            ts: Utc::now().to_rfc3339(),
            card_version: card_version.into(),
        }
    }

    /// Split `did#fragment` into its two halves.
    pub fn parse_kid(&self) -> Result<(&str, &str), JwsError> {
        self.kid
            .split_once('#')
            .filter(|(did, frag)| !did.is_empty() && !frag.is_empty())
            .ok_or(JwsError::KidMissing)
    }
}

/// A detached JWS: the protected header and signature, both base64url.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachedJws {
    pub protected: String,
    pub signature: String,
}

impl DetachedJws {
    pub fn decode_header(&self) -> Result<ProtectedHeader, JwsError> {
        let raw = URL_SAFE_NO_PAD
            .decode(&self.protected)
            .map_err(|e| JwsError::HeaderInvalid(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| JwsError::HeaderInvalid(e.to_string()))
    }
}

/// Sign `payload` (already canonicalized) with `key`, producing a detached
/// JWS whose protected header carries `kid` and `card_version`.
pub fn sign(
    payload: &[u8],
    key: &SigningKey,
    kid: impl Into<String>,
    card_version: impl Into<String>,
) -> Result<DetachedJws, JwsError> {
    let header = ProtectedHeader::new(kid, card_version);
    let header_bytes =
        serde_json::to_vec(&header).map_err(|e| JwsError::HeaderInvalid(e.to_string()))?;
    let header_b64 = URL_SAFE_NO_PAD.encode(header_bytes);
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig: Signature = key.sign(signing_input.as_bytes());

    Ok(DetachedJws {
        protected: header_b64,
        signature: URL_SAFE_NO_PAD.encode(sig.to_bytes()),
    })
}

/// Verify a detached JWS over `payload` using `verifying_key`. Requires the
/// header's `alg` to be `EdDSA`.
pub fn verify(
    jws: &DetachedJws,
    payload: &[u8],
    verifying_key: &VerifyingKey,
) -> Result<(), JwsError> {
    let header = jws.decode_header()?;
    if header.alg != ALG_EDDSA {
        return Err(JwsError::UnsupportedAlg(header.alg));
    }

    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{}.{}", jws.protected, payload_b64);

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(&jws.signature)
        .map_err(|_| JwsError::SignatureInvalid)?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| JwsError::SignatureInvalid)?;
    let sig = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(signing_input.as_bytes(), &sig)
        .map_err(|_| JwsError::SignatureInvalid)
}

/// Canonicalize `value` with the `signatures` field omitted (or absent),
/// returning the bytes that are the actual signing/verification payload.
pub fn signing_payload(value: &Value) -> Result<Vec<u8>, JwsError> {
    let mut clone = value.clone();
    if let Value::Object(map) = &mut clone {
        map.remove("signatures");
    }
    canonicalize(&clone).map_err(JwsError::CanonicalizeFailed)
}
