// ============================
// crates/relay-lib/src/lifecycle.rs
// ============================
//! Lifecycle controller: skip, explicit disconnect, and involuntary
//! disconnect.
//!
//! Every teardown funnels through `MatchTable::end_for`, which is
//! idempotent, so concurrent teardown from both sides produces exactly one
//! `counterpart-left`/`call-ended` pair. A network drop is treated like the
//! peer leaving: the survivor is re-queued when it opted into continuous
//! matching. A deliberate disconnect releases both sides to idle.

use crate::error::RelayError;
use crate::AppState;
use pairlink_common::{ParticipantId, ServerMessage};
use tracing::{debug, info, warn};

/// End the requester's match and immediately look for a new counterpart.
/// The counterpart is notified and re-queued per its continuous flag.
pub async fn skip(state: &AppState, requester: ParticipantId) -> Result<(), RelayError> {
    let Some(ended) = state.matches.end_for(requester) else {
        // Teardown race; the match is already gone and the client is free
        // to declare again.
        debug!(participant = %requester, "skip without a live match");
        return Ok(());
    };

    info!(match_id = %ended.match_id, %requester, "match skipped");
    let _ = state.registry.send_to(requester, ServerMessage::CallEnded);
    let _ = state
        .registry
        .send_to(ended.counterpart, ServerMessage::CounterpartLeft);

    requeue_if_continuous(state, ended.counterpart).await;

    // The requester re-enters the pool with its last declaration, no
    // manual re-initiation needed.
    match state.registry.lookup(requester)?.last_criteria {
        Some(criteria) => {
            state.matchmaker.declare(requester, criteria).await?;
        },
        None => {
            warn!(participant = %requester, "skip with no recorded criteria, staying idle");
        },
    }
    Ok(())
}

/// End the requester's match and release both sides to idle. Models the
/// user navigating away rather than seeking a new partner.
pub async fn disconnect(state: &AppState, requester: ParticipantId) -> Result<(), RelayError> {
    let Some(ended) = state.matches.end_for(requester) else {
        debug!(participant = %requester, "disconnect without a live match");
        return Ok(());
    };

    info!(match_id = %ended.match_id, %requester, "match disconnected");
    let _ = state.registry.send_to(requester, ServerMessage::CallEnded);
    let _ = state
        .registry
        .send_to(ended.counterpart, ServerMessage::CounterpartLeft);
    Ok(())
}

/// Involuntary disconnect: the connection is gone. Withdraws the waiting
/// entry, removes the participant, and tears down any live match so no
/// signaling is ever sent into the void.
pub async fn handle_closed(state: &AppState, id: ParticipantId) {
    state.matchmaker.withdraw(id);
    state.registry.remove(id);

    if let Some(ended) = state.matches.end_for(id) {
        info!(match_id = %ended.match_id, participant = %id, "match ended by connection loss");
        let _ = state
            .registry
            .send_to(ended.counterpart, ServerMessage::CounterpartLeft);
        requeue_if_continuous(state, ended.counterpart).await;
    }
}

async fn requeue_if_continuous(state: &AppState, id: ParticipantId) {
    let Ok(participant) = state.registry.lookup(id) else {
        // Counterpart disconnected at the same moment.
        return;
    };
    if !participant.continuous() {
        return;
    }
    let Some(criteria) = participant.last_criteria else {
        return;
    };

    // Last-declared criteria are reused verbatim.
    if let Err(err) = state.matchmaker.declare(id, criteria).await {
        debug!(participant = %id, %err, "auto-requeue declined");
    }
}
