// ============================
// crates/relay-lib/src/lib.rs
// ============================
//! Core library for the pairlink pairing and signaling relay server.

pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod lifecycle;
pub mod matches;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod relay;
pub mod validation;
pub mod ws_router;

use crate::config::Settings;
use crate::identity::{IdentityProvider, NullIdentity};
use crate::matches::MatchTable;
use crate::pool::{spawn_matchmaker, MatchmakerHandle};
use crate::registry::SessionRegistry;
use std::sync::Arc;

/// Application state shared across all handlers.
///
/// Starts empty and drains on shutdown; every map in here is keyed by live
/// connection ids only.
#[derive(Clone)]
pub struct AppState {
    /// Live connections and their outbound channels
    pub registry: Arc<SessionRegistry>,
    /// Live matches and the participant index
    pub matches: Arc<MatchTable>,
    /// Waiting pool actor
    pub matchmaker: MatchmakerHandle,
    /// Read-only seam to the account subsystem
    pub identity: Arc<dyn IdentityProvider>,
    /// Settings manager
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create application state for an anonymous-only deployment.
    pub fn new(settings: Settings) -> Self {
        Self::with_identity(settings, Arc::new(NullIdentity))
    }

    /// Create application state with an identity collaborator.
    pub fn with_identity(settings: Settings, identity: Arc<dyn IdentityProvider>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let matches = Arc::new(MatchTable::with_buffer_limit(
            settings.candidate_buffer_limit,
        ));
        let matchmaker = spawn_matchmaker(registry.clone(), matches.clone());

        Self {
            registry,
            matches,
            matchmaker,
            identity,
            settings: Arc::new(settings),
        }
    }
}
