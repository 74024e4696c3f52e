use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound signaling envelope. Wire form: `{"action": "<tag>", "data": <payload>}`.
///
/// An unknown action or a payload that does not match its action fails the
/// whole decode; the read pump logs and skips such frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Ping,
    StartChatReq,
    OfferRes(Offer),
    AnswerRes(Answer),
    IceCandidateRes(IceCandidate),
    HangUpRes(Option<PeerRef>),
    ForceHangUpRes(Option<PeerRef>),
    DisConnected(Option<PeerRef>),
}

/// Outbound action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Pong,
    Connected,
    StartChatAck,
    OfferReq,
    AnswerReq,
    AnswerRec,
    IceCandidateRec,
    HangUpRec,
    ActiveUsers,
}

/// SDP offer payload. `uId` names the remote peer on the way in and the
/// sender on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "uId")]
    pub peer_id: String,
    pub sdp: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "uId")]
    pub peer_id: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub sdp_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidate {
    #[serde(rename = "uId")]
    pub peer_id: String,
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u32>,
}

/// Optional `{uId}` payload carried by hang-up and disconnect envelopes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerRef {
    #[serde(rename = "uId", default)]
    pub peer_id: Option<String>,
}

impl PeerRef {
    pub fn to_peer(id: impl Into<String>) -> Self {
        PeerRef {
            peer_id: Some(id.into()),
        }
    }
}

/// Server reply body: success `{code: 0, data}` or error `{code, message, details}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Success {
        code: u16,
        data: Value,
    },
    Error {
        code: u16,
        message: String,
        details: Option<Value>,
    },
}

impl Reply {
    pub fn success(data: impl Serialize) -> Self {
        Reply::Success {
            code: 0,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Reply::Error {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn error_with_details(code: u16, message: impl Into<String>, details: Value) -> Self {
        Reply::Error {
            code,
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Outbound signaling envelope: `{"action": "<tag>", "message": <reply>}`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope {
    pub action: Action,
    pub message: Reply,
}

impl ServerEnvelope {
    pub fn success(action: Action, data: impl Serialize) -> Self {
        ServerEnvelope {
            action,
            message: Reply::success(data),
        }
    }

    /// Wire text of the envelope. The payload types used here serialize
    /// infallibly.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_offer_res() {
        let raw = r#"{"action":"offer_res","data":{"uId":"bob","sdp":"v=0...","type":"offer"}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::OfferRes(offer) => {
                assert_eq!(offer.peer_id, "bob");
                assert_eq!(offer.sdp, "v=0...");
                assert_eq!(offer.sdp_type, "offer");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_ice_candidate_with_numeric_mline_index() {
        let raw = r#"{"action":"ice_candidate_res","data":{"uId":"alice","candidate":"candidate:1 1 udp 2130706431 10.0.0.1 54400 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::IceCandidateRes(ice) => {
                assert_eq!(ice.peer_id, "alice");
                assert_eq!(ice.sdp_mid.as_deref(), Some("0"));
                assert_eq!(ice.sdp_mline_index, Some(0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_start_chat_req_with_null_data() {
        let raw = r#"{"action":"start_chat_req","data":null}"#;
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(raw).unwrap(),
            ClientEvent::StartChatReq
        ));
    }

    #[test]
    fn decodes_hang_up_with_and_without_peer() {
        let named = r#"{"action":"hang_up_res","data":{"uId":"bob"}}"#;
        match serde_json::from_str::<ClientEvent>(named).unwrap() {
            ClientEvent::HangUpRes(Some(peer)) => {
                assert_eq!(peer.peer_id.as_deref(), Some("bob"))
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let bare = r#"{"action":"hang_up_res","data":null}"#;
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(bare).unwrap(),
            ClientEvent::HangUpRes(None)
        ));

        let empty = r#"{"action":"dis_connected","data":{}}"#;
        match serde_json::from_str::<ClientEvent>(empty).unwrap() {
            ClientEvent::DisConnected(Some(peer)) => assert!(peer.peer_id.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_a_decode_error() {
        let raw = r#"{"action":"subscribe","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn success_envelope_matches_wire_shape() {
        let envelope = ServerEnvelope::success(Action::Connected, true);
        let value: Value = serde_json::from_str(&envelope.encode()).unwrap();
        assert_eq!(value["action"], "connected");
        assert_eq!(value["message"]["code"], 0);
        assert_eq!(value["message"]["data"], true);
    }

    #[test]
    fn relayed_offer_carries_sender_id() {
        let envelope = ServerEnvelope::success(
            Action::AnswerReq,
            Offer {
                peer_id: "alice".into(),
                sdp: "v=0...".into(),
                sdp_type: "offer".into(),
            },
        );
        let value: Value = serde_json::from_str(&envelope.encode()).unwrap();
        assert_eq!(value["action"], "answer_req");
        assert_eq!(value["message"]["data"]["uId"], "alice");
        assert_eq!(value["message"]["data"]["type"], "offer");
    }

    #[test]
    fn error_reply_matches_wire_shape() {
        let reply = Reply::error(400, "uId is required");
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["code"], 400);
        assert_eq!(value["message"], "uId is required");
        assert_eq!(value["details"], Value::Null);
    }
}
