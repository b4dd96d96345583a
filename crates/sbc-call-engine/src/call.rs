//! The per-call data model and state machine, per spec.md §4.9.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sbc_sip_core::AudioCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Init,
    Ringing,
    Answered,
    Bridged,
    Holding,
    Ending,
    Ended,
}

impl CallState {
    /// Whether `to` may directly follow `self`, per the transition diagram
    /// in spec.md §4.9.
    fn can_transition_to(self, to: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, to),
            (Init, Ringing)
                | (Ringing, Answered)
                | (Answered, Bridged)
                | (Bridged, Holding)
                | (Holding, Bridged)
                | (Init, Ending)
                | (Ringing, Ending)
                | (Answered, Ending)
                | (Bridged, Ending)
                | (Holding, Ending)
                | (Ending, Ended)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    NormalClearing,
    UserBusy,
    GlobalLimitReached,
    NoAnswer,
    MediaSocketError,
    BridgeUnrecoverable,
    AuthFailed,
    Cancelled,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::NormalClearing => "normal_clearing",
            EndReason::UserBusy => "user_busy",
            EndReason::GlobalLimitReached => "global_limit_reached",
            EndReason::NoAnswer => "no_answer",
            EndReason::MediaSocketError => "media_socket_error",
            EndReason::BridgeUnrecoverable => "bridge_unrecoverable",
            EndReason::AuthFailed => "auth_failed",
            EndReason::Cancelled => "cancelled",
        }
    }
}

/// Running media/bridge counters, updated by C4/C10 and folded into the
/// CDR when the call ends.
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    pub packets_in: u64,
    pub packets_out: u64,
    pub loss_count: u64,
    pub jitter_max_ms: u32,
    pub bridge_bytes_in: u64,
    pub bridge_bytes_out: u64,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub call_id: String,
    pub from: String,
    pub to: String,
    pub direction: Direction,
    pub codec: Option<AudioCodec>,
    pub state: CallState,
    pub end_reason: Option<EndReason>,
    pub stats: CallStats,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub user_aor: Option<String>,
    pub trunk_name: Option<String>,
}

impl Call {
    pub fn new(call_id: impl Into<String>, from: impl Into<String>, to: impl Into<String>, direction: Direction, now: DateTime<Utc>) -> Self {
        Call {
            call_id: call_id.into(),
            from: from.into(),
            to: to.into(),
            direction,
            codec: None,
            state: CallState::Init,
            end_reason: None,
            stats: CallStats::default(),
            started_at: now,
            answered_at: None,
            ended_at: None,
            user_aor: None,
            trunk_name: None,
        }
    }

    pub fn transition(&mut self, to: CallState, now: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(Error::InvalidTransition { from: self.state, to });
        }
        if to == CallState::Answered {
            self.answered_at = Some(now);
        }
        if to == CallState::Ended {
            self.ended_at = Some(now);
        }
        self.state = to;
        Ok(())
    }

    pub fn end(&mut self, reason: EndReason, now: DateTime<Utc>) -> Result<()> {
        if self.state != CallState::Ending {
            self.transition(CallState::Ending, now)?;
        }
        self.end_reason = Some(reason);
        self.transition(CallState::Ended, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_state_in_order() {
        let now = Utc::now();
        let mut call = Call::new("call-1", "alice", "bob", Direction::Inbound, now);
        call.transition(CallState::Ringing, now).unwrap();
        call.transition(CallState::Answered, now).unwrap();
        assert!(call.answered_at.is_some());
        call.transition(CallState::Bridged, now).unwrap();
        call.transition(CallState::Holding, now).unwrap();
        call.transition(CallState::Bridged, now).unwrap();
        call.end(EndReason::NormalClearing, now).unwrap();
        assert_eq!(call.state, CallState::Ended);
        assert_eq!(call.end_reason, Some(EndReason::NormalClearing));
        assert!(call.ended_at.is_some());
    }

    #[test]
    fn skipping_ringing_is_rejected() {
        let now = Utc::now();
        let mut call = Call::new("call-1", "alice", "bob", Direction::Inbound, now);
        assert!(call.transition(CallState::Answered, now).is_err());
    }

    #[test]
    fn any_state_can_end() {
        let now = Utc::now();
        let mut call = Call::new("call-1", "alice", "bob", Direction::Inbound, now);
        call.end(EndReason::Cancelled, now).unwrap();
        assert_eq!(call.state, CallState::Ended);
    }

    #[test]
    fn ended_call_rejects_further_transitions() {
        let now = Utc::now();
        let mut call = Call::new("call-1", "alice", "bob", Direction::Inbound, now);
        call.end(EndReason::Cancelled, now).unwrap();
        assert!(call.transition(CallState::Ringing, now).is_err());
    }
}
