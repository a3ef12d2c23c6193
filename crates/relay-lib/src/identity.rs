// ============================
// crates/relay-lib/src/identity.rs
// ============================
//! Read-only seam to the external account subsystem.

use async_trait::async_trait;
use dashmap::DashMap;
use pairlink_common::ParticipantId;

/// Display attributes supplied by the account subsystem for a registered
/// participant. The premium flag is informational only and never gates
/// matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub gender: String,
    pub interest_tags: Vec<String>,
    pub premium: bool,
}

/// Identity lookup consumed by the core. Absence of an identity never
/// blocks matching; anonymous participants match on client-declared
/// criteria alone.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_identity(&self, id: ParticipantId) -> Option<Identity>;
}

/// Provider for fully anonymous deployments.
pub struct NullIdentity;

#[async_trait]
impl IdentityProvider for NullIdentity {
    async fn get_identity(&self, _id: ParticipantId) -> Option<Identity> {
        None
    }
}

/// In-memory provider, used by tests and single-node deployments where the
/// account service pushes identities at connection time.
#[derive(Default)]
pub struct StaticIdentity {
    entries: DashMap<ParticipantId, Identity>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ParticipantId, identity: Identity) {
        self.entries.insert(id, identity);
    }

    pub fn remove(&self, id: ParticipantId) {
        self.entries.remove(&id);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn get_identity(&self, id: ParticipantId) -> Option<Identity> {
        self.entries.get(&id).map(|e| e.clone())
    }
}
