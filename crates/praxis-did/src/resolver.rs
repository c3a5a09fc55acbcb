//! Multi-method DID resolver: `did:web` and `did:webvh`, with an in-memory
//! TTL cache keyed by the full DID string.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use praxis_canon::canonicalize;
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::document::DidDocument;
use crate::error::DidError;

const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CachedEntry {
    document: DidDocument,
    raw: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

pub struct DidResolverConfig {
    pub cache_ttl: Duration,
    pub allow_insecure_http: bool,
}

impl Default for DidResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            allow_insecure_http: false,
        }
    }
}

/// Resolves `did:web` and `did:webvh` DIDs to documents, with an in-memory
/// TTL cache.
pub struct DidResolver {
    config: DidResolverConfig,
    cache: RwLock<HashMap<String, CachedEntry>>,
    http: reqwest::Client,
}

impl DidResolver {
    pub fn new() -> Self {
        Self::with_config(DidResolverConfig::default())
    }

    pub fn with_config(config: DidResolverConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
            http: reqwest::Client::new(),
        }
    }

    /// Resolve any supported DID, consulting the cache first.
    pub async fn resolve(&self, did: &str) -> Result<DidDocument, DidError> {
        if let Some(doc) = self.get_cached(did).await {
            return Ok(doc);
        }

        let (document, raw) = if did.starts_with("did:webvh:") {
            self.resolve_did_webvh(did).await?
        } else if did.starts_with("did:web:") {
            self.resolve_did_web(did).await?
        } else {
            let method = did.split(':').nth(1).unwrap_or("").to_string();
            return Err(DidError::UnsupportedMethod(method));
        };

        self.cache_document(did, document.clone(), raw).await;
        Ok(document)
    }

    async fn get_cached(&self, did: &str) -> Option<DidDocument> {
        let cache = self.cache.read().await;
        let entry = cache.get(did)?;
        if entry.expires_at > Instant::now() {
            Some(entry.document.clone())
        } else {
            None
        }
    }

    async fn cache_document(&self, did: &str, document: DidDocument, raw: Vec<u8>) {
        let mut cache = self.cache.write().await;
        cache.retain(|_, e| e.expires_at > Instant::now());
        cache.insert(
            did.to_string(),
            CachedEntry {
                document,
                raw,
                expires_at: Instant::now() + self.config.cache_ttl,
            },
        );
    }

    pub async fn invalidate(&self, did: &str) {
        self.cache.write().await.remove(did);
    }

    pub async fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let now = Instant::now();
        let (valid, expired) = cache
            .values()
            .fold((0, 0), |(v, e), entry| {
                if entry.expires_at > now {
                    (v + 1, e)
                } else {
                    (v, e + 1)
                }
            });
        CacheStats {
            entries: cache.len(),
            valid_entries: valid,
            expired_entries: expired,
        }
    }

    async fn resolve_did_web(&self, did: &str) -> Result<(DidDocument, Vec<u8>), DidError> {
        let url = did_web_to_url(did, self.config.allow_insecure_http)?;
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/did+json, application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DidError::HttpNonOk(resp.status().as_u16()));
        }
        let raw = resp.bytes().await?.to_vec();
        let document: DidDocument =
            serde_json::from_slice(&raw).map_err(|e| DidError::DecodeFailed(e.to_string()))?;
        Ok((document, raw))
    }

    async fn resolve_did_webvh(&self, did: &str) -> Result<(DidDocument, Vec<u8>), DidError> {
        let rest = did
            .strip_prefix("did:webvh:")
            .ok_or_else(|| DidError::InvalidDid(did.to_string()))?;
        let (base_segments, digest_part) = rest
            .rsplit_once(':')
            .ok_or_else(|| DidError::InvalidDid(did.to_string()))?;
        let (algo, encoded_digest) = digest_part
            .split_once('-')
            .ok_or_else(|| DidError::InvalidDid(did.to_string()))?;

        let base_did = format!("did:web:{base_segments}");
        let (document, raw) = self.resolve_did_web(&base_did).await?;

        let parsed: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| DidError::DecodeFailed(e.to_string()))?;
        let canon = canonicalize(&parsed).map_err(|e| DidError::DecodeFailed(e.to_string()))?;

        let computed: Vec<u8> = match algo {
            "sha256" => Sha256::digest(&canon).to_vec(),
            "sha3-256" => Sha3_256::digest(&canon).to_vec(),
            other => return Err(DidError::InvalidDid(format!("unknown hash algo {other}"))),
        };

        let expected = decode_digest(encoded_digest)?;
        if computed.ct_eq(&expected).unwrap_u8() != 1 {
            return Err(DidError::HashMismatch);
        }

        Ok((document, raw))
    }
}

impl Default for DidResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// `did:web:<host>[:<seg>…]` → `https://<host>/.well-known/did.json` or
/// `https://<host>/<seg>/…/did.json`. Percent-decodes `%3A` in any segment.
pub fn did_web_to_url(did: &str, allow_insecure_http: bool) -> Result<String, DidError> {
    let rest = did
        .strip_prefix("did:web:")
        .ok_or_else(|| DidError::InvalidDid(did.to_string()))?;
    if rest.is_empty() {
        return Err(DidError::InvalidDid(did.to_string()));
    }

    let parts: Vec<String> = rest
        .split(':')
        .map(|seg| seg.replace("%3A", ":").replace("%3a", ":"))
        .collect();

    let scheme = if allow_insecure_http { "http" } else { "https" };
    let host = &parts[0];
    if parts.len() == 1 {
        Ok(format!("{scheme}://{host}/.well-known/did.json"))
    } else {
        let path = parts[1..].join("/");
        Ok(format!("{scheme}://{host}/{path}/did.json"))
    }
}

/// Decode a digest trying, in order: multibase, unpadded base32, base64url,
/// base64.
fn decode_digest(encoded: &str) -> Result<Vec<u8>, DidError> {
    if let Ok((_, bytes)) = multibase::decode(encoded) {
        return Ok(bytes);
    }
    if let Ok(bytes) = data_encoding::BASE32_NOPAD.decode(encoded.to_ascii_uppercase().as_bytes())
    {
        return Ok(bytes);
    }
    use base64::{engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD}, Engine};
    if let Ok(bytes) = URL_SAFE_NO_PAD.decode(encoded) {
        return Ok(bytes);
    }
    if let Ok(bytes) = STANDARD.decode(encoded) {
        return Ok(bytes);
    }
    Err(DidError::DecodeFailed(format!(
        "could not decode digest {encoded:?} as multibase/base32/base64url/base64"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_web_to_url_simple() {
        let url = did_web_to_url("did:web:example.com", false).unwrap();
        assert_eq!(url, "https://example.com/.well-known/did.json");
    }

    #[test]
    fn did_web_to_url_with_path() {
        let url = did_web_to_url("did:web:example.com:users:alice", false).unwrap();
        assert_eq!(url, "https://example.com/users/alice/did.json");
    }

    #[test]
    fn did_web_to_url_decodes_percent_colon() {
        let url = did_web_to_url("did:web:example.com%3A8443:users:alice", false).unwrap();
        assert_eq!(url, "https://example.com:8443/users/alice/did.json");
    }

    #[test]
    fn did_web_to_url_rejects_empty() {
        assert!(did_web_to_url("did:web:", false).is_err());
    }

    #[test]
    fn decode_digest_base32() {
        let digest = Sha256::digest(b"hello");
        let encoded = data_encoding::BASE32_NOPAD.encode(&digest).to_ascii_lowercase();
        let decoded = decode_digest(&encoded).unwrap();
        assert_eq!(decoded, digest.to_vec());
    }

    #[test]
    fn decode_digest_base64url() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let digest = Sha256::digest(b"hello");
        let encoded = URL_SAFE_NO_PAD.encode(digest);
        let decoded = decode_digest(&encoded).unwrap();
        assert_eq!(decoded, digest.to_vec());
    }
}
