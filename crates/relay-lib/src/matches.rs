// ============================
// crates/relay-lib/src/matches.rs
// ============================
//! Match table and per-match state machine.
//!
//! A match record moves `PendingOffer -> InCall -> Ended`; both states can
//! also drop straight to `Ended`. `Ended` is terminal and teardown is
//! idempotent, so concurrent teardown from both sides settles on exactly
//! one winner. Records are created only from the matchmaker task, which
//! keeps the one-live-match-per-participant invariant structural.

use crate::metrics::{MATCH_CREATED, MATCH_ENDED};
use dashmap::DashMap;
use metrics::counter;
use pairlink_common::{MatchId, ParticipantId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const DEFAULT_BUFFER_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    PendingOffer,
    InCall,
    Ended,
}

/// Ordered candidates held for one direction until the receiving side has
/// applied its remote description. Owned by the match record; discarded on
/// teardown.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    items: Vec<serde_json::Value>,
}

impl CandidateBuffer {
    pub fn push(&mut self, candidate: serde_json::Value, limit: usize) -> bool {
        if self.items.len() >= limit {
            return false;
        }
        self.items.push(candidate);
        true
    }

    pub fn drain(&mut self) -> Vec<serde_json::Value> {
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One established pairing.
pub struct MatchRecord {
    pub id: MatchId,
    pub state: MatchState,
    /// Who sent the most recent offer; answers from the same side are glare.
    pub last_offer_from: Option<ParticipantId>,
    sides: [ParticipantId; 2],
    /// Whether each side has applied its remote description.
    applied: [bool; 2],
    /// Candidates awaiting each side, indexed like `sides`.
    inbound: [CandidateBuffer; 2],
    buffer_limit: usize,
}

impl MatchRecord {
    fn new(id: MatchId, a: ParticipantId, b: ParticipantId, buffer_limit: usize) -> Self {
        Self {
            id,
            state: MatchState::PendingOffer,
            last_offer_from: None,
            sides: [a, b],
            applied: [false, false],
            inbound: [CandidateBuffer::default(), CandidateBuffer::default()],
            buffer_limit,
        }
    }

    fn side_of(&self, id: ParticipantId) -> Option<usize> {
        self.sides.iter().position(|&side| side == id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.side_of(id).is_some()
    }

    pub fn counterpart_of(&self, id: ParticipantId) -> Option<ParticipantId> {
        self.side_of(id).map(|side| self.sides[1 - side])
    }

    /// Whether `id` has applied its remote description and can receive
    /// candidates directly.
    pub fn applied_for(&self, id: ParticipantId) -> bool {
        self.side_of(id).is_some_and(|side| self.applied[side])
    }

    /// Queue a candidate for `target` until it signals description-applied.
    pub fn buffer_for(&mut self, target: ParticipantId, candidate: serde_json::Value) {
        let Some(side) = self.side_of(target) else {
            return;
        };
        if !self.inbound[side].push(candidate, self.buffer_limit) {
            warn!(match_id = %self.id, participant = %target, "candidate buffer full, candidate dropped");
        }
    }

    /// Mark `id` as description-applied and return the candidates queued
    /// for it, in arrival order.
    pub fn mark_applied(&mut self, id: ParticipantId) -> Vec<serde_json::Value> {
        let Some(side) = self.side_of(id) else {
            return Vec::new();
        };
        self.applied[side] = true;
        self.inbound[side].drain()
    }

    /// Transition to `Ended`. Returns false when the record was already
    /// ended, so a second teardown is a no-op.
    pub fn end(&mut self) -> bool {
        if self.state == MatchState::Ended {
            return false;
        }
        self.state = MatchState::Ended;
        self.last_offer_from = None;
        for buffer in &mut self.inbound {
            buffer.drain();
        }
        true
    }
}

/// Outcome of a successful teardown.
pub struct EndedMatch {
    pub match_id: MatchId,
    pub counterpart: ParticipantId,
}

/// Shared table of live matches plus a participant index.
pub struct MatchTable {
    records: DashMap<MatchId, Arc<Mutex<MatchRecord>>>,
    by_participant: DashMap<ParticipantId, MatchId>,
    buffer_limit: usize,
}

impl Default for MatchTable {
    fn default() -> Self {
        Self::with_buffer_limit(DEFAULT_BUFFER_LIMIT)
    }
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_limit(buffer_limit: usize) -> Self {
        Self {
            records: DashMap::new(),
            by_participant: DashMap::new(),
            buffer_limit,
        }
    }

    /// Create a match for two participants. Callers (the matchmaker task)
    /// must have checked that neither side is in a live match.
    pub fn create(&self, a: ParticipantId, b: ParticipantId) -> MatchId {
        let id = Uuid::new_v4();
        let record = Arc::new(Mutex::new(MatchRecord::new(id, a, b, self.buffer_limit)));
        self.records.insert(id, record);
        self.by_participant.insert(a, id);
        self.by_participant.insert(b, id);
        counter!(MATCH_CREATED).increment(1);
        id
    }

    pub fn match_of(&self, id: ParticipantId) -> Option<MatchId> {
        self.by_participant.get(&id).map(|entry| *entry)
    }

    pub fn is_live(&self, id: ParticipantId) -> bool {
        self.by_participant.contains_key(&id)
    }

    /// Resolve the live match containing `id`.
    pub fn live_match_of(
        &self,
        id: ParticipantId,
    ) -> Option<(MatchId, Arc<Mutex<MatchRecord>>)> {
        let match_id = self.match_of(id)?;
        let record = self.records.get(&match_id).map(|r| r.clone())?;
        Some((match_id, record))
    }

    /// Tear down the live match containing `id`, if any. Idempotent: the
    /// losing side of a concurrent teardown gets `None` and must not emit
    /// notifications.
    pub fn end_for(&self, id: ParticipantId) -> Option<EndedMatch> {
        let (match_id, record) = self.live_match_of(id)?;

        let counterpart = {
            let mut record = record.lock();
            if !record.end() {
                return None;
            }
            record.counterpart_of(id)?
        };

        self.by_participant.remove(&id);
        self.by_participant.remove(&counterpart);
        self.records.remove(&match_id);
        counter!(MATCH_ENDED).increment(1);

        Some(EndedMatch {
            match_id,
            counterpart,
        })
    }

    pub fn live_count(&self) -> usize {
        self.records.len()
    }
}
