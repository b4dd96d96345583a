//! Wire frames exchanged with the AI backend, per spec.md §4.10.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct AuthFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub auth: AuthDetails,
    pub call: CallDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthDetails {
    pub token: String,
    pub signature: String,
    pub timestamp: String,
    pub call_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallDetails {
    pub conversation_id: String,
    pub from_number: String,
    pub to_number: String,
    pub direction: String,
    pub codec: String,
    pub sample_rate: u32,
}

impl AuthFrame {
    pub fn new(auth: AuthDetails, call: CallDetails) -> Self {
        AuthFrame { kind: "auth", auth, call }
    }
}

/// Frames this bridge sends once the handshake completes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    #[serde(rename = "audio_data")]
    AudioData { data: OutboundAudioData },
    #[serde(rename = "dtmf")]
    Dtmf { data: OutboundDtmf },
    #[serde(rename = "call_state")]
    CallState { data: OutboundCallState },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundAudioData {
    pub call_id: String,
    pub audio: String,
    pub timestamp: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundDtmf {
    pub call_id: String,
    pub digit: char,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundCallState {
    pub call_id: String,
    pub state: String,
}

impl OutboundFrame {
    /// Whether this frame belongs on the priority lane that never drops,
    /// as opposed to the best-effort audio lane.
    pub fn is_control(&self) -> bool {
        !matches!(self, OutboundFrame::AudioData { .. })
    }
}

/// Frames received from the AI backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "auth_ok")]
    AuthOk,
    #[serde(rename = "audio_data")]
    AudioData { data: InboundAudioData },
    #[serde(rename = "hangup")]
    Hangup { data: serde_json::Value },
    #[serde(rename = "transfer")]
    Transfer { data: serde_json::Value },
    #[serde(rename = "dtmf")]
    Dtmf { data: serde_json::Value },
    #[serde(rename = "control")]
    Control { data: serde_json::Value },
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundAudioData {
    pub call_id: String,
    pub audio: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_frame_serializes_with_top_level_auth_and_call() {
        let frame = AuthFrame::new(
            AuthDetails { token: "tok".into(), signature: "sig".into(), timestamp: "123".into(), call_id: "call-1".into() },
            CallDetails {
                conversation_id: "conv-1".into(),
                from_number: "+15551234567".into(),
                to_number: "+15557654321".into(),
                direction: "inbound".into(),
                codec: "PCMU".into(),
                sample_rate: 16000,
            },
        );
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "auth");
        assert_eq!(json["auth"]["call_id"], "call-1");
        assert_eq!(json["call"]["sample_rate"], 16000);
    }

    #[test]
    fn audio_data_frame_nests_fields_under_data() {
        let frame = OutboundFrame::AudioData { data: OutboundAudioData { call_id: "call-1".into(), audio: "AAAA".into(), timestamp: "123".into(), sequence: 7 } };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "audio_data");
        assert_eq!(json["data"]["sequence"], 7);
        assert!(!frame.is_control());
    }

    #[test]
    fn dtmf_and_call_state_frames_are_control() {
        let dtmf = OutboundFrame::Dtmf { data: OutboundDtmf { call_id: "call-1".into(), digit: '5', duration_ms: 120 } };
        assert!(dtmf.is_control());
        let state = OutboundFrame::CallState { data: OutboundCallState { call_id: "call-1".into(), state: "bridged".into() } };
        assert!(state.is_control());
    }

    #[test]
    fn auth_ok_parses_from_bare_type() {
        let parsed: InboundFrame = serde_json::from_str(r#"{"type":"auth_ok"}"#).unwrap();
        assert!(matches!(parsed, InboundFrame::AuthOk));
    }

    #[test]
    fn inbound_audio_data_parses_nested_payload() {
        let raw = r#"{"type":"audio_data","data":{"call_id":"call-1","audio":"AAAA"}}"#;
        let parsed: InboundFrame = serde_json::from_str(raw).unwrap();
        match parsed {
            InboundFrame::AudioData { data } => assert_eq!(data.call_id, "call-1"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn hangup_parses_with_opaque_payload() {
        let raw = r#"{"type":"hangup","data":{"reason":"caller_ended"}}"#;
        let parsed: InboundFrame = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed, InboundFrame::Hangup { .. }));
    }
}
