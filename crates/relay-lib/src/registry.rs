// ============================
// crates/relay-lib/src/registry.rs
// ============================
//! Session Registry: owns every live participant and its outbound channel.
//!
//! The registry is an explicit instance held by `AppState`; it starts empty
//! and drains as connections close. It owns no matching logic. Removal of a
//! participant that may still be matched goes through
//! `lifecycle::handle_closed`, which withdraws the pool entry and tears the
//! match down before calling [`SessionRegistry::remove`].

use crate::error::RelayError;
use crate::metrics::OUTBOX_DROPPED;
use dashmap::DashMap;
use metrics::counter;
use pairlink_common::{Criteria, ParticipantId, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// One live, matchable connection.
#[derive(Clone)]
pub struct Participant {
    pub id: ParticipantId,
    /// Criteria from the most recent declare, reused for auto-requeue.
    pub last_criteria: Option<Criteria>,
    /// Informational only; supplied by the identity collaborator.
    pub premium: bool,
    outbox: mpsc::Sender<ServerMessage>,
}

impl Participant {
    pub fn name(&self) -> &str {
        self.last_criteria.as_ref().map_or("", |c| c.name.as_str())
    }

    /// Whether this participant opted into automatic re-queueing.
    pub fn continuous(&self) -> bool {
        self.last_criteria.as_ref().is_some_and(|c| c.continuous)
    }
}

/// Registry of live connections.
#[derive(Default)]
pub struct SessionRegistry {
    participants: DashMap<ParticipantId, Participant>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and hand back its identifier.
    pub fn register(&self, outbox: mpsc::Sender<ServerMessage>) -> ParticipantId {
        let id = Uuid::new_v4();
        self.participants.insert(
            id,
            Participant {
                id,
                last_criteria: None,
                premium: false,
                outbox,
            },
        );
        debug!(participant = %id, "participant registered");
        id
    }

    pub fn lookup(&self, id: ParticipantId) -> Result<Participant, RelayError> {
        self.participants
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| RelayError::NotFound(format!("participant {id}")))
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Record the most recent declaration for a participant.
    pub fn update_profile(
        &self,
        id: ParticipantId,
        criteria: Criteria,
        premium: bool,
    ) -> Result<(), RelayError> {
        let mut entry = self
            .participants
            .get_mut(&id)
            .ok_or_else(|| RelayError::NotFound(format!("participant {id}")))?;
        entry.last_criteria = Some(criteria);
        entry.premium = premium;
        Ok(())
    }

    /// Remove a connection. Lookups for the id fail with `NotFound` from
    /// this point on.
    pub fn remove(&self, id: ParticipantId) -> Option<Participant> {
        let removed = self.participants.remove(&id).map(|(_, p)| p);
        if removed.is_some() {
            debug!(participant = %id, "participant removed");
        }
        removed
    }

    /// Push a message to a participant without blocking. A full or closed
    /// outbox drops the frame for that participant only.
    pub fn send_to(&self, id: ParticipantId, msg: ServerMessage) -> Result<(), RelayError> {
        let participant = self
            .participants
            .get(&id)
            .ok_or_else(|| RelayError::NotFound(format!("participant {id}")))?;

        if let Err(err) = participant.outbox.try_send(msg) {
            counter!(OUTBOX_DROPPED).increment(1);
            warn!(participant = %id, %err, "outbox full or closed, frame dropped");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
