// ============================
// crates/relay-lib/src/pool.rs
// ============================
//! Waiting pool and matcher, serialized through one actor task.
//!
//! Every pool mutation (insert, search, remove) runs inside the single
//! matchmaker loop, so the compare-and-remove that pairs two entries is
//! atomic by construction: no two declarations can select the same
//! counterpart, and a participant with a live match is refused entry.

use crate::error::RelayError;
use crate::matches::MatchTable;
use crate::metrics::POOL_WAITING;
use crate::registry::SessionRegistry;
use metrics::gauge;
use pairlink_common::{Criteria, MatchId, Mode, ParticipantId, ServerMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A participant's pending search criteria.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    pub id: ParticipantId,
    pub criteria: Criteria,
    /// Arrival order, kept across in-place re-declares.
    seq: u64,
}

/// Result of a declaration, for callers that need it; match notifications
/// are pushed to both sides regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareOutcome {
    Waiting,
    Matched {
        match_id: MatchId,
        counterpart: ParticipantId,
    },
}

/// Message sent *into* the actor
pub enum PoolCmd {
    Declare {
        id: ParticipantId,
        criteria: Criteria,
        resp_tx: mpsc::UnboundedSender<Result<DeclareOutcome, RelayError>>,
    },
    Withdraw {
        id: ParticipantId,
    },
    Depth {
        mode: Option<Mode>,
        resp_tx: mpsc::UnboundedSender<usize>,
    },
}

/// Handle that other components keep: the actor's command channel.
#[derive(Clone)]
pub struct MatchmakerHandle {
    cmd_tx: mpsc::UnboundedSender<PoolCmd>,
}

impl MatchmakerHandle {
    /// Insert or replace the caller's waiting entry; pairs immediately when
    /// a compatible entry is already waiting. Returns as soon as the actor
    /// has processed the command.
    pub async fn declare(
        &self,
        id: ParticipantId,
        criteria: Criteria,
    ) -> Result<DeclareOutcome, RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();

        self.cmd_tx.send(PoolCmd::Declare {
            id,
            criteria,
            resp_tx,
        })?;

        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("matchmaker stopped".to_string()))?
    }

    /// Remove the participant's waiting entry, if any. Fire-and-forget.
    pub fn withdraw(&self, id: ParticipantId) {
        let _ = self.cmd_tx.send(PoolCmd::Withdraw { id });
    }

    /// Number of waiting entries, optionally restricted to one mode.
    pub async fn depth(&self, mode: Option<Mode>) -> Result<usize, RelayError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();

        self.cmd_tx.send(PoolCmd::Depth { mode, resp_tx })?;

        resp_rx
            .recv()
            .await
            .ok_or_else(|| RelayError::Internal("matchmaker stopped".to_string()))
    }
}

/// Two entries pair up when their mode is identical and either both
/// declared no interests or the interest sets intersect.
pub fn compatible(a: &Criteria, b: &Criteria) -> bool {
    if a.mode != b.mode {
        return false;
    }
    if a.interests.is_empty() && b.interests.is_empty() {
        return true;
    }
    a.interests.iter().any(|tag| b.interests.contains(tag))
}

struct Matchmaker {
    registry: Arc<SessionRegistry>,
    matches: Arc<MatchTable>,
    queues: HashMap<Mode, VecDeque<WaitingEntry>>,
    modes: HashMap<ParticipantId, Mode>,
    next_seq: u64,
}

impl Matchmaker {
    fn new(registry: Arc<SessionRegistry>, matches: Arc<MatchTable>) -> Self {
        Self {
            registry,
            matches,
            queues: HashMap::new(),
            modes: HashMap::new(),
            next_seq: 0,
        }
    }

    fn depth(&self, mode: Option<Mode>) -> usize {
        match mode {
            Some(mode) => self.queues.get(&mode).map_or(0, VecDeque::len),
            None => self.queues.values().map(VecDeque::len).sum(),
        }
    }

    fn remove_entry(&mut self, id: ParticipantId) -> Option<WaitingEntry> {
        let mode = self.modes.remove(&id)?;
        let queue = self.queues.get_mut(&mode)?;
        let pos = queue.iter().position(|entry| entry.id == id)?;
        queue.remove(pos)
    }

    fn handle_declare(
        &mut self,
        id: ParticipantId,
        criteria: Criteria,
    ) -> Result<DeclareOutcome, RelayError> {
        if self.matches.is_live(id) {
            return Err(RelayError::InvalidState(
                "already in a live match, skip or disconnect first".to_string(),
            ));
        }

        // Re-declare replaces the existing entry. Within the same mode the
        // original queue position is kept; waiting time is not reset by a
        // criteria tweak.
        let seq = match self.modes.get(&id) {
            Some(mode) if *mode == criteria.mode => {
                let entry = self.remove_entry(id).expect("indexed entry must exist");
                entry.seq
            },
            Some(_) => {
                self.remove_entry(id);
                self.fresh_seq()
            },
            None => self.fresh_seq(),
        };

        let mode = criteria.mode;
        let queue = self.queues.entry(mode).or_default();

        // Earliest-waiting compatible entry wins.
        let found = queue
            .iter()
            .position(|entry| compatible(&entry.criteria, &criteria));

        match found {
            Some(pos) => {
                let counterpart = queue.remove(pos).expect("position is in bounds");
                self.modes.remove(&counterpart.id);

                let match_id = self.matches.create(id, counterpart.id);
                info!(%match_id, a = %id, b = %counterpart.id, %mode, "match created");

                // Both sides learn only the counterpart identifier.
                let _ = self.registry.send_to(
                    id,
                    ServerMessage::Matched {
                        counterpart_id: counterpart.id,
                    },
                );
                let _ = self
                    .registry
                    .send_to(counterpart.id, ServerMessage::Matched { counterpart_id: id });

                Ok(DeclareOutcome::Matched {
                    match_id,
                    counterpart: counterpart.id,
                })
            },
            None => {
                let pos = queue
                    .iter()
                    .position(|entry| entry.seq > seq)
                    .unwrap_or(queue.len());
                queue.insert(pos, WaitingEntry { id, criteria, seq });
                self.modes.insert(id, mode);
                debug!(participant = %id, %mode, "waiting for a counterpart");
                Ok(DeclareOutcome::Waiting)
            },
        }
    }

    fn fresh_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PoolCmd>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                PoolCmd::Declare {
                    id,
                    criteria,
                    resp_tx,
                } => {
                    let result = self.handle_declare(id, criteria);
                    let _ = resp_tx.send(result);
                },
                PoolCmd::Withdraw { id } => {
                    if self.remove_entry(id).is_some() {
                        debug!(participant = %id, "waiting entry withdrawn");
                    }
                },
                PoolCmd::Depth { mode, resp_tx } => {
                    let _ = resp_tx.send(self.depth(mode));
                },
            }
            gauge!(POOL_WAITING).set(self.depth(None) as f64);
        }
    }
}

/// Spawn the matchmaker actor and return its handle.
pub fn spawn_matchmaker(
    registry: Arc<SessionRegistry>,
    matches: Arc<MatchTable>,
) -> MatchmakerHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let actor = Matchmaker::new(registry, matches);

    tokio::spawn(actor.run(cmd_rx));

    MatchmakerHandle { cmd_tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    struct Harness {
        registry: Arc<SessionRegistry>,
        matches: Arc<MatchTable>,
        pool: MatchmakerHandle,
    }

    fn setup() -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let matches = Arc::new(MatchTable::new());
        let pool = spawn_matchmaker(registry.clone(), matches.clone());
        Harness {
            registry,
            matches,
            pool,
        }
    }

    impl Harness {
        fn participant(&self) -> (ParticipantId, Receiver<ServerMessage>) {
            let (tx, rx) = mpsc::channel(16);
            (self.registry.register(tx), rx)
        }
    }

    fn criteria(mode: Mode, interests: &[&str]) -> Criteria {
        Criteria {
            gender: String::new(),
            interests: interests.iter().map(|s| (*s).to_string()).collect(),
            name: String::new(),
            mode,
            continuous: false,
        }
    }

    #[test]
    fn test_compatibility_rule() {
        let video_empty = criteria(Mode::Video, &[]);
        let text_empty = criteria(Mode::Text, &[]);
        let video_music = criteria(Mode::Video, &["music"]);
        let video_chess = criteria(Mode::Video, &["chess"]);
        let video_both = criteria(Mode::Video, &["music", "chess"]);

        assert!(compatible(&video_empty, &video_empty));
        assert!(!compatible(&video_empty, &text_empty));
        assert!(compatible(&video_music, &video_both));
        assert!(!compatible(&video_music, &video_chess));
        // empty set never intersects a non-empty one
        assert!(!compatible(&video_empty, &video_music));
    }

    #[tokio::test]
    async fn test_two_compatible_declarations_match() {
        let h = setup();
        let (a, mut a_rx) = h.participant();
        let (b, mut b_rx) = h.participant();

        let first = h.pool.declare(a, criteria(Mode::Video, &[])).await.unwrap();
        assert_eq!(first, DeclareOutcome::Waiting);

        let second = h.pool.declare(b, criteria(Mode::Video, &[])).await.unwrap();
        assert!(matches!(
            second,
            DeclareOutcome::Matched { counterpart, .. } if counterpart == a
        ));

        assert_eq!(
            a_rx.recv().await.unwrap(),
            ServerMessage::Matched { counterpart_id: b }
        );
        assert_eq!(
            b_rx.recv().await.unwrap(),
            ServerMessage::Matched { counterpart_id: a }
        );
        assert_eq!(h.pool.depth(None).await.unwrap(), 0);
        assert_eq!(h.matches.live_count(), 1);
    }

    #[tokio::test]
    async fn test_fifo_within_compatibility_class() {
        let h = setup();
        let (a, _a_rx) = h.participant();
        let (b, _b_rx) = h.participant();
        let (c, _c_rx) = h.participant();

        // a and b wait on disjoint tags; c intersects both, a is earliest
        h.pool.declare(a, criteria(Mode::Video, &["music"])).await.unwrap();
        h.pool.declare(b, criteria(Mode::Video, &["chess"])).await.unwrap();

        let outcome = h
            .pool
            .declare(c, criteria(Mode::Video, &["music", "chess"]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DeclareOutcome::Matched { counterpart, .. } if counterpart == a
        ));
        assert_eq!(h.pool.depth(Some(Mode::Video)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_earliest_two_match_first() {
        let h = setup();
        let (a, _a_rx) = h.participant();
        let (b, _b_rx) = h.participant();
        let (c, _c_rx) = h.participant();

        h.pool.declare(a, criteria(Mode::Text, &[])).await.unwrap();
        let second = h.pool.declare(b, criteria(Mode::Text, &[])).await.unwrap();
        assert!(matches!(
            second,
            DeclareOutcome::Matched { counterpart, .. } if counterpart == a
        ));

        // c arrives last and keeps waiting
        let third = h.pool.declare(c, criteria(Mode::Text, &[])).await.unwrap();
        assert_eq!(third, DeclareOutcome::Waiting);
    }

    #[tokio::test]
    async fn test_redeclare_is_idempotent() {
        let h = setup();
        let (a, _a_rx) = h.participant();

        h.pool.declare(a, criteria(Mode::Video, &["music"])).await.unwrap();
        h.pool.declare(a, criteria(Mode::Video, &["chess"])).await.unwrap();

        assert_eq!(h.pool.depth(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redeclare_keeps_queue_position() {
        let h = setup();
        let (a, _a_rx) = h.participant();
        let (b, _b_rx) = h.participant();
        let (c, _c_rx) = h.participant();

        h.pool.declare(a, criteria(Mode::Video, &["music"])).await.unwrap();
        h.pool.declare(b, criteria(Mode::Video, &["chess"])).await.unwrap();
        // a updates its tags but keeps its earlier arrival slot
        h.pool
            .declare(a, criteria(Mode::Video, &["music", "art"]))
            .await
            .unwrap();

        let outcome = h
            .pool
            .declare(c, criteria(Mode::Video, &["chess", "art"]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DeclareOutcome::Matched { counterpart, .. } if counterpart == a
        ));
    }

    #[tokio::test]
    async fn test_mode_switch_requeues_at_back() {
        let h = setup();
        let (a, _a_rx) = h.participant();
        let (b, _b_rx) = h.participant();

        h.pool.declare(a, criteria(Mode::Video, &["music"])).await.unwrap();
        h.pool.declare(a, criteria(Mode::Text, &["music"])).await.unwrap();

        assert_eq!(h.pool.depth(Some(Mode::Video)).await.unwrap(), 0);
        assert_eq!(h.pool.depth(Some(Mode::Text)).await.unwrap(), 1);

        let outcome = h.pool.declare(b, criteria(Mode::Text, &["music"])).await.unwrap();
        assert!(matches!(outcome, DeclareOutcome::Matched { .. }));
    }

    #[tokio::test]
    async fn test_withdraw_removes_entry() {
        let h = setup();
        let (a, _a_rx) = h.participant();

        h.pool.declare(a, criteria(Mode::Video, &[])).await.unwrap();
        h.pool.withdraw(a);

        assert_eq!(h.pool.depth(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_declare_while_matched_is_rejected() {
        let h = setup();
        let (a, _a_rx) = h.participant();
        let (b, _b_rx) = h.participant();

        h.pool.declare(a, criteria(Mode::Video, &[])).await.unwrap();
        h.pool.declare(b, criteria(Mode::Video, &[])).await.unwrap();

        let result = h.pool.declare(a, criteria(Mode::Video, &[])).await;
        assert!(matches!(result, Err(RelayError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_concurrent_declarations_never_double_match() {
        let h = setup();

        let mut ids = Vec::new();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let (id, rx) = h.participant();
            ids.push(id);
            receivers.push(rx);
            let pool = h.pool.clone();
            tasks.push(tokio::spawn(async move {
                pool.declare(id, criteria(Mode::Video, &[])).await
            }));
        }

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // all eight ended up paired, each in exactly one live match
        assert_eq!(h.matches.live_count(), 4);
        assert_eq!(h.pool.depth(None).await.unwrap(), 0);
        for &id in &ids {
            let (_, record) = h.matches.live_match_of(id).expect("everyone is matched");
            let record = record.lock();
            assert!(record.contains(id));
            let counterpart = record.counterpart_of(id).unwrap();
            assert_eq!(h.matches.match_of(counterpart), h.matches.match_of(id));
        }
    }
}
