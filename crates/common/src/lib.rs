// ================
// crates/common/src/lib.rs
// ================
//! Wire protocol shared between the pairlink client and the relay server.
//! One persistent WebSocket per participant, JSON text frames, tagged by
//! `event`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one live connection.
pub type ParticipantId = Uuid;

/// Identifier for an established pairing.
pub type MatchId = Uuid;

/// Session mode a participant wants to be paired in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Video,
    Text,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Video => write!(f, "video"),
            Mode::Text => write!(f, "text"),
        }
    }
}

/// Search criteria a participant declares to enter the waiting pool.
///
/// `continuous` opts the participant into automatic re-queueing when its
/// counterpart skips away or drops.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    #[serde(default)]
    pub gender: String,
    /// Interest tags; an empty set matches only other empty sets.
    #[serde(rename = "interest", default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub name: String,
    pub mode: Mode,
    #[serde(default)]
    pub continuous: bool,
}

/// Messages sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter the waiting pool, or replace an existing waiting entry.
    DeclareCriteria(Criteria),
    /// End the current match and look for a new counterpart.
    Skip { mode: Mode },
    /// End the current match and go idle.
    Disconnect { mode: Mode },
    /// Relay a connection offer to the counterpart.
    ///
    /// `to` is advisory only; the relay always routes to the match
    /// counterpart and rejects a mismatching target.
    SendOffer {
        sdp: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ParticipantId>,
    },
    /// Relay a connection answer to the counterpart.
    SendAnswer {
        sdp: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ParticipantId>,
    },
    /// Relay a network-path candidate to the counterpart.
    SendCandidate {
        candidate: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ParticipantId>,
    },
    /// Relay a chat line to the counterpart.
    SendText {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<ParticipantId>,
    },
    /// The sender has applied the remote connection description and can
    /// now accept candidates directly.
    DescriptionApplied,
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// A counterpart was found. Only the counterpart identifier is
    /// disclosed.
    Matched {
        #[serde(rename = "counterpartId")]
        counterpart_id: ParticipantId,
    },
    /// The counterpart skipped away or dropped.
    CounterpartLeft,
    /// The participant's own teardown request completed.
    CallEnded,
    /// Offer relayed verbatim from the counterpart.
    SendOffer { sdp: serde_json::Value },
    /// Answer relayed verbatim from the counterpart.
    SendAnswer { sdp: serde_json::Value },
    /// Candidate relayed (possibly after buffering) from the counterpart.
    SendCandidate { candidate: serde_json::Value },
    /// Chat line relayed verbatim from the counterpart.
    SendText { text: String },
    Error {
        code: String,
        message: String,
    },
    MalformedMessage {
        #[serde(rename = "errMsg")]
        err_msg: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_criteria_wire_shape() {
        let msg = ClientMessage::DeclareCriteria(Criteria {
            gender: "f".to_string(),
            interests: vec!["music".to_string(), "chess".to_string()],
            name: "ana".to_string(),
            mode: Mode::Video,
            continuous: true,
        });

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["event"], "declare-criteria");
        assert_eq!(parsed["gender"], "f");
        assert_eq!(parsed["interest"][1], "chess");
        assert_eq!(parsed["mode"], "video");
        assert_eq!(parsed["continuous"], true);

        let roundtrip: ClientMessage = serde_json::from_str(&json).unwrap();
        match roundtrip {
            ClientMessage::DeclareCriteria(c) => {
                assert_eq!(c.name, "ana");
                assert_eq!(c.interests.len(), 2);
            },
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_declare_criteria_defaults() {
        // A minimal anonymous declaration only needs a mode.
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"declare-criteria","mode":"text"}"#).unwrap();
        match msg {
            ClientMessage::DeclareCriteria(c) => {
                assert!(c.gender.is_empty());
                assert!(c.interests.is_empty());
                assert!(!c.continuous);
            },
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_matched_uses_counterpart_id_key() {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(&ServerMessage::Matched { counterpart_id: id }).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["event"], "matched");
        assert_eq!(parsed["counterpartId"], id.to_string());
    }

    #[test]
    fn test_signaling_payloads_relay_verbatim_json() {
        let sdp = serde_json::json!({"type": "offer", "sdp": "v=0\r\n..."});
        let msg = ClientMessage::SendOffer {
            sdp: sdp.clone(),
            to: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["event"], "send-offer");
        assert_eq!(parsed["sdp"], sdp);
        assert!(parsed.get("to").is_none());
    }

    #[test]
    fn test_description_applied_is_bare_event() {
        let json = serde_json::to_string(&ClientMessage::DescriptionApplied).unwrap();
        assert_eq!(json, r#"{"event":"description-applied"}"#);
    }
}
