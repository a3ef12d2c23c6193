// ============================
// crates/relay-lib/src/handler.rs
// ============================
//! Per-connection message handler.
//!
//! Instantiated once per WebSocket connection. Registers the participant on
//! construction, translates each incoming [`ClientMessage`] into registry,
//! pool, relay, or lifecycle operations, and tears everything down when the
//! socket closes. Replies and pushed events both travel through the
//! participant's outbox channel.

use crate::error::RelayError;
use crate::{lifecycle, relay, validation, AppState};
use pairlink_common::{ClientMessage, ParticipantId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct ConnectionHandler {
    state: Arc<AppState>,
    participant_id: ParticipantId,
}

impl ConnectionHandler {
    /// Register a new connection with its outbound channel.
    pub fn new(state: Arc<AppState>, outbox: mpsc::Sender<ServerMessage>) -> Self {
        let participant_id = state.registry.register(outbox);
        Self {
            state,
            participant_id,
        }
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    /// Handle one incoming client message.
    ///
    /// Successful operations reply through push events (or not at all), so
    /// `Ok(())` means "nothing further to tell the sender". Errors are
    /// mapped by the caller: benign ones are dropped, the rest become an
    /// `error` frame for this connection only.
    pub async fn handle_message(&self, msg: ClientMessage) -> Result<(), RelayError> {
        let id = self.participant_id;
        match msg {
            ClientMessage::DeclareCriteria(criteria) => {
                let criteria = validation::validate_criteria(&criteria)?;

                // The account subsystem may know this participant; its
                // attributes fill whatever the client left blank. Anonymous
                // participants match on declared criteria alone.
                let identity = self.state.identity.get_identity(id).await;
                let criteria = match identity {
                    Some(identity) => {
                        let mut criteria = criteria;
                        if criteria.gender.is_empty() {
                            criteria.gender = identity.gender;
                        }
                        if criteria.interests.is_empty() {
                            criteria.interests = identity.interest_tags;
                        }
                        self.state.registry.update_profile(
                            id,
                            criteria.clone(),
                            identity.premium,
                        )?;
                        criteria
                    },
                    None => {
                        self.state.registry.update_profile(id, criteria.clone(), false)?;
                        criteria
                    },
                };

                // Match notifications are pushed to both sides by the
                // matchmaker; a waiting outcome needs no reply.
                self.state.matchmaker.declare(id, criteria).await?;
                Ok(())
            },
            ClientMessage::Skip { mode } => {
                debug!(participant = %id, %mode, "skip requested");
                lifecycle::skip(&self.state, id).await
            },
            ClientMessage::Disconnect { mode } => {
                debug!(participant = %id, %mode, "disconnect requested");
                lifecycle::disconnect(&self.state, id).await
            },
            ClientMessage::SendOffer { sdp, to } => {
                validation::validate_description(&sdp)?;
                relay::forward_offer(&self.state, id, sdp, to)?;
                Ok(())
            },
            ClientMessage::SendAnswer { sdp, to } => {
                validation::validate_description(&sdp)?;
                relay::forward_answer(&self.state, id, sdp, to)?;
                Ok(())
            },
            ClientMessage::SendCandidate { candidate, to } => {
                validation::validate_candidate(&candidate)?;
                relay::forward_candidate(&self.state, id, candidate, to)?;
                Ok(())
            },
            ClientMessage::SendText { text, to } => {
                validation::validate_text(&text)?;
                relay::forward_chat(&self.state, id, text, to)?;
                Ok(())
            },
            ClientMessage::DescriptionApplied => {
                relay::description_applied(&self.state, id)?;
                Ok(())
            },
        }
    }

    /// The socket is gone: withdraw, deregister, and tear down promptly so
    /// the counterpart never signals into the void.
    pub async fn closed(&self) {
        lifecycle::handle_closed(&self.state, self.participant_id).await;
    }
}
