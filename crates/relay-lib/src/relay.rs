// ============================
// crates/relay-lib/src/relay.rs
// ============================
//! Signaling relay between the two members of a match.
//!
//! Destinations are always derived from the match record, never from the
//! client-supplied `to` hint; a mismatching hint is an integrity violation.
//! Delivery happens under the match lock, so each sender's frames reach the
//! counterpart in call order and buffered candidates flush before any
//! directly delivered ones.

use crate::error::RelayError;
use crate::matches::{MatchRecord, MatchState};
use crate::metrics::{RELAY_BUFFERED, RELAY_FORWARDED};
use crate::AppState;
use metrics::counter;
use pairlink_common::{ParticipantId, ServerMessage};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// How a relayed frame left the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Buffered,
}

fn live_record(
    state: &AppState,
    sender: ParticipantId,
) -> Result<Arc<Mutex<MatchRecord>>, RelayError> {
    state
        .matches
        .live_match_of(sender)
        .map(|(_, record)| record)
        .ok_or(RelayError::NoActiveMatch)
}

/// The counterpart is always derived from the match; the client's `to`
/// hint is only checked, never routed on.
fn check_target(
    record: &MatchRecord,
    sender: ParticipantId,
    to: Option<ParticipantId>,
) -> Result<ParticipantId, RelayError> {
    let counterpart = record
        .counterpart_of(sender)
        .ok_or(RelayError::NoActiveMatch)?;

    if let Some(target) = to {
        if target != counterpart {
            error!(
                match_id = %record.id,
                %sender,
                %target,
                "payload addressed outside the match"
            );
            return Err(RelayError::NotCounterpart);
        }
    }
    Ok(counterpart)
}

/// Forward a connection offer. Valid only while the match is awaiting one.
pub fn forward_offer(
    state: &AppState,
    sender: ParticipantId,
    sdp: serde_json::Value,
    to: Option<ParticipantId>,
) -> Result<Delivery, RelayError> {
    let record = live_record(state, sender)?;
    let mut record = record.lock();

    if record.state == MatchState::Ended {
        return Err(RelayError::NoActiveMatch);
    }
    let counterpart = check_target(&record, sender, to)?;

    if record.state != MatchState::PendingOffer {
        return Err(RelayError::InvalidState(
            "offer is only valid before the call is established".to_string(),
        ));
    }

    record.last_offer_from = Some(sender);
    deliver(state, counterpart, ServerMessage::SendOffer { sdp });
    Ok(Delivery::Sent)
}

/// Forward a connection answer and establish the call. The side that sent
/// the most recent offer cannot answer it (glare).
pub fn forward_answer(
    state: &AppState,
    sender: ParticipantId,
    sdp: serde_json::Value,
    to: Option<ParticipantId>,
) -> Result<Delivery, RelayError> {
    let record = live_record(state, sender)?;
    let mut record = record.lock();

    if record.state == MatchState::Ended {
        return Err(RelayError::NoActiveMatch);
    }
    let counterpart = check_target(&record, sender, to)?;

    match record.last_offer_from {
        None => {
            return Err(RelayError::InvalidState(
                "answer without a prior offer".to_string(),
            ));
        },
        Some(from) if from == sender => {
            return Err(RelayError::InvalidState(
                "the offering side cannot answer its own offer".to_string(),
            ));
        },
        Some(_) => {},
    }

    record.state = MatchState::InCall;
    deliver(state, counterpart, ServerMessage::SendAnswer { sdp });
    Ok(Delivery::Sent)
}

/// Forward a network-path candidate. Buffered until the counterpart has
/// applied its remote description, then flushed in arrival order.
pub fn forward_candidate(
    state: &AppState,
    sender: ParticipantId,
    candidate: serde_json::Value,
    to: Option<ParticipantId>,
) -> Result<Delivery, RelayError> {
    let record = live_record(state, sender)?;
    let mut record = record.lock();

    if record.state == MatchState::Ended {
        return Err(RelayError::NoActiveMatch);
    }
    let counterpart = check_target(&record, sender, to)?;

    if record.applied_for(counterpart) {
        deliver(state, counterpart, ServerMessage::SendCandidate { candidate });
        Ok(Delivery::Sent)
    } else {
        record.buffer_for(counterpart, candidate);
        counter!(RELAY_BUFFERED).increment(1);
        debug!(match_id = %record.id, %sender, "candidate buffered");
        Ok(Delivery::Buffered)
    }
}

/// Forward a chat line. Valid in any non-ended state; never persisted.
pub fn forward_chat(
    state: &AppState,
    sender: ParticipantId,
    text: String,
    to: Option<ParticipantId>,
) -> Result<Delivery, RelayError> {
    let record = live_record(state, sender)?;
    let record = record.lock();

    if record.state == MatchState::Ended {
        return Err(RelayError::NoActiveMatch);
    }
    let counterpart = check_target(&record, sender, to)?;

    deliver(state, counterpart, ServerMessage::SendText { text });
    Ok(Delivery::Sent)
}

/// The sender applied its remote description: flush the candidates queued
/// for it and deliver future ones directly.
pub fn description_applied(
    state: &AppState,
    sender: ParticipantId,
) -> Result<usize, RelayError> {
    let record = live_record(state, sender)?;
    let mut record = record.lock();

    if record.state == MatchState::Ended {
        return Err(RelayError::NoActiveMatch);
    }

    let flushed = record.mark_applied(sender);
    let count = flushed.len();
    for candidate in flushed {
        deliver(state, sender, ServerMessage::SendCandidate { candidate });
    }
    if count > 0 {
        debug!(match_id = %record.id, participant = %sender, count, "candidate buffer flushed");
    }
    Ok(count)
}

fn deliver(state: &AppState, to: ParticipantId, msg: ServerMessage) {
    counter!(RELAY_FORWARDED).increment(1);
    // A counterpart that vanished mid-send is a teardown race; its match is
    // about to be ended by the disconnect path.
    if let Err(err) = state.registry.send_to(to, msg) {
        debug!(%to, %err, "relay target gone, frame dropped");
    }
}
