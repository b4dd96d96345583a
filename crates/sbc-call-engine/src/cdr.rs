//! Call detail record emission on call end, per spec.md §4.9.

use crate::call::{Call, CallStats, Direction};
use chrono::{DateTime, Utc};
use sbc_sip_core::AudioCodec;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Cdr {
    pub call_id: String,
    pub from: String,
    pub to: String,
    pub direction: Direction,
    pub start: DateTime<Utc>,
    pub answer: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
    pub end_reason: String,
    pub codec: Option<AudioCodec>,
    pub stats: CallStats,
}

impl Cdr {
    pub fn from_call(call: &Call) -> Self {
        Cdr {
            call_id: call.call_id.clone(),
            from: call.from.clone(),
            to: call.to.clone(),
            direction: call.direction,
            start: call.started_at,
            answer: call.answered_at,
            end: call.ended_at.unwrap_or_else(Utc::now),
            end_reason: call.end_reason.as_ref().map(|r| r.as_str().to_string()).unwrap_or_default(),
            codec: call.codec,
            stats: call.stats.clone(),
        }
    }
}

/// Destination for completed CDRs. Production deployments point this at a
/// durable store; the in-memory sink below is what this workspace exercises
/// and what its tests assert against.
pub trait CdrSink: Send + Sync {
    fn record(&self, cdr: Cdr);
}

#[derive(Default)]
pub struct InMemoryCdrSink {
    records: Mutex<Vec<Cdr>>,
}

impl InMemoryCdrSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Cdr> {
        self.records.lock().expect("cdr sink mutex poisoned").clone()
    }
}

impl CdrSink for InMemoryCdrSink {
    fn record(&self, cdr: Cdr) {
        self.records.lock().expect("cdr sink mutex poisoned").push(cdr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CallState, EndReason};

    #[test]
    fn cdr_carries_end_reason_as_snake_case_string() {
        let now = Utc::now();
        let mut call = Call::new("call-1", "alice", "bob", Direction::Inbound, now);
        call.transition(CallState::Ringing, now).unwrap();
        call.transition(CallState::Answered, now).unwrap();
        call.end(EndReason::NormalClearing, now).unwrap();
        let cdr = Cdr::from_call(&call);
        assert_eq!(cdr.end_reason, "normal_clearing");
        assert!(cdr.answer.is_some());
    }

    #[test]
    fn in_memory_sink_accumulates_records() {
        let sink = InMemoryCdrSink::new();
        let now = Utc::now();
        let mut call = Call::new("call-1", "alice", "bob", Direction::Inbound, now);
        call.end(EndReason::Cancelled, now).unwrap();
        sink.record(Cdr::from_call(&call));
        assert_eq!(sink.all().len(), 1);
    }
}
