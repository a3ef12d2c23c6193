// ==============
// crates/relay-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const POOL_WAITING: &str = "pool.waiting";
pub const MATCH_CREATED: &str = "match.created";
pub const MATCH_ENDED: &str = "match.ended";
pub const RELAY_FORWARDED: &str = "relay.forwarded";
pub const RELAY_BUFFERED: &str = "relay.buffered";
pub const OUTBOX_DROPPED: &str = "outbox.dropped";
