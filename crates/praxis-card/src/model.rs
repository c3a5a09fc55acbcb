//! The capability card data model: an agent's signed public self-description.

use serde::{Deserialize, Serialize};

use praxis_canon::DetachedJws;

/// A single capability an agent's backends expose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "inputMode", default)]
    pub input_mode: Vec<String>,
    #[serde(rename = "outputMode", default)]
    pub output_mode: Vec<String>,
}

impl Skill {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            input_mode: Vec::new(),
            output_mode: Vec::new(),
        }
    }
}

/// The wire transport a backend is reachable over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendTransport {
    Stdio,
    Sse,
    Libp2p,
}

/// A tool exposed by a backend. Schemas are opaque JSON — the router never
/// validates them, only forwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(rename = "outputSchema", default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

/// A resource exposed by a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpResource {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The `starting → running → {error, stopped}` state machine, with bounded
/// restart from `error` back to `starting` before going terminal `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackendStatus {
    Starting,
    Running,
    Error,
    Stopped,
    Failed,
}

/// A backend's public description as advertised in a capability card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub name: String,
    pub transport: BackendTransport,
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(default)]
    pub resources: Vec<McpResource>,
    pub status: BackendStatus,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, transport: BackendTransport) -> Self {
        Self {
            name: name.into(),
            transport,
            tools: Vec::new(),
            resources: Vec::new(),
            status: BackendStatus::Starting,
        }
    }
}

/// Streaming/push/history capability flags advertised by a card.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardCapabilities {
    pub streaming: bool,
    pub push: bool,
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
}

/// An on-chain identity binding: `agentId` on a CAIP-10 chain, signed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnChainRegistration {
    #[serde(rename = "agentId")]
    pub agent_id: u64,
    #[serde(rename = "agentAddress")]
    pub agent_address: String,
    pub signature: String,
}

/// The public self-description of an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityCard {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    #[serde(default)]
    pub skills: Vec<Skill>,

    #[serde(default)]
    pub backends: Vec<BackendDescriptor>,

    #[serde(default)]
    pub capabilities: CardCapabilities,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,

    #[serde(rename = "didDocUri", default, skip_serializing_if = "Option::is_none")]
    pub did_doc_uri: Option<String>,

    #[serde(default)]
    pub signatures: Vec<DetachedJws>,

    #[serde(default)]
    pub registrations: Vec<OnChainRegistration>,
}

impl CapabilityCard {
    pub fn builder(name: impl Into<String>, protocol_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            description: String::new(),
            protocol_version: protocol_version.into(),
            skills: Vec::new(),
            backends: Vec::new(),
            capabilities: CardCapabilities::default(),
            did: None,
            did_doc_uri: None,
            signatures: Vec::new(),
            registrations: Vec::new(),
        }
    }

    /// Increment `version` and clear existing signatures — called whenever
    /// the backend list (or any signed field) changes.
    pub fn bump_version(&mut self) {
        self.version = bump_semver(&self.version);
        self.signatures.clear();
    }

    pub fn upsert_backend(&mut self, descriptor: BackendDescriptor) {
        if let Some(existing) = self.backends.iter_mut().find(|b| b.name == descriptor.name) {
            *existing = descriptor;
        } else {
            self.backends.push(descriptor);
        }
        self.bump_version();
    }
}

fn bump_semver(version: &str) -> String {
    let mut parts: Vec<u64> = version
        .split('.')
        .map(|p| p.parse().unwrap_or(0))
        .collect();
    parts.resize(3, 0);
    parts[2] += 1;
    format!("{}.{}.{}", parts[0], parts[1], parts[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_version_increments_patch() {
        let mut card = CapabilityCard::builder("agent", "1.0");
        card.version = "1.2.3".to_string();
        card.signatures.push(DetachedJws {
            protected: "x".into(),
            signature: "y".into(),
        });
        card.bump_version();
        assert_eq!(card.version, "1.2.4");
        assert!(card.signatures.is_empty());
    }

    #[test]
    fn upsert_backend_replaces_by_name() {
        let mut card = CapabilityCard::builder("agent", "1.0");
        card.upsert_backend(BackendDescriptor::new("fs", BackendTransport::Stdio));
        let mut updated = BackendDescriptor::new("fs", BackendTransport::Stdio);
        updated.status = BackendStatus::Running;
        card.upsert_backend(updated);
        assert_eq!(card.backends.len(), 1);
        assert_eq!(card.backends[0].status, BackendStatus::Running);
    }
}
