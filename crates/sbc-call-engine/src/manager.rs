//! The call supervisor: admits, tracks, and tears down calls, publishing
//! lifecycle events and CDRs as it goes. Grounded on the teacher's
//! `call-engine::orchestrator::core::CallCenterState` (a `DashMap` of
//! active-call records plus `Arc`-shared subsystem handles), narrowed from
//! a full call-center (agents/queues/bridges) down to this system's single
//! bridge-to-AI call shape.

use crate::admission::AdmissionControl;
use crate::call::{Call, CallState, Direction, EndReason};
use crate::cdr::{Cdr, CdrSink};
use crate::error::{Error, Result};
use chrono::Utc;
use dashmap::DashMap;
use sbc_infra_common::events::{BridgeState, DtmfMethod};
use sbc_infra_common::{EventBus, SbcEvent};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CallManager {
    calls: DashMap<String, Call>,
    admission: AdmissionControl,
    events: EventBus,
    cdr_sink: Arc<dyn CdrSink>,
}

impl CallManager {
    pub fn new(admission: AdmissionControl, events: EventBus, cdr_sink: Arc<dyn CdrSink>) -> Self {
        CallManager { calls: DashMap::new(), admission, events, cdr_sink }
    }

    /// Admits and creates a new call, or returns the admission error
    /// (mapped by the SIP layer to 486/503) without creating anything.
    pub fn start_call(&self, call_id: &str, from: &str, to: &str, direction: Direction, user_aor: Option<&str>, trunk_name: Option<&str>) -> Result<()> {
        if let Err(e) = self.admission.admit(user_aor, trunk_name) {
            warn!(%call_id, error = %e, "call rejected at admission");
            return Err(e);
        }
        let mut call = Call::new(call_id, from, to, direction, Utc::now());
        call.user_aor = user_aor.map(str::to_string);
        call.trunk_name = trunk_name.map(str::to_string);
        self.calls.insert(call_id.to_string(), call);
        info!(%call_id, %from, %to, ?direction, "call started");
        self.events.publish(SbcEvent::CallStarted { call_id: call_id.to_string() });
        Ok(())
    }

    pub fn ring(&self, call_id: &str) -> Result<()> {
        self.transition(call_id, CallState::Ringing)
    }

    pub fn answer(&self, call_id: &str) -> Result<()> {
        self.transition(call_id, CallState::Answered)?;
        self.events.publish(SbcEvent::CallAnswered { call_id: call_id.to_string() });
        Ok(())
    }

    pub fn bridge(&self, call_id: &str) -> Result<()> {
        self.transition(call_id, CallState::Bridged)?;
        self.events.publish(SbcEvent::BridgeStateChanged { call_id: call_id.to_string(), state: BridgeState::Streaming });
        Ok(())
    }

    pub fn hold(&self, call_id: &str) -> Result<()> {
        self.transition(call_id, CallState::Holding)
    }

    pub fn resume(&self, call_id: &str) -> Result<()> {
        self.transition(call_id, CallState::Bridged)
    }

    pub fn record_dtmf(&self, call_id: &str, digit: char, duration_ms: u32, method: DtmfMethod) {
        self.events.publish(SbcEvent::DtmfDetected { call_id: call_id.to_string(), digit, duration_ms, method });
    }

    /// Ends a call: transitions it to `Ended`, emits its CDR, releases its
    /// admission slot, and drops it from the active-call table.
    pub fn end_call(&self, call_id: &str, reason: EndReason) -> Result<()> {
        let (user_aor, trunk_name, cdr) = {
            let mut entry = self.calls.get_mut(call_id).ok_or_else(|| Error::CallNotFound(call_id.to_string()))?;
            entry.end(reason.clone(), Utc::now())?;
            (entry.user_aor.clone(), entry.trunk_name.clone(), Cdr::from_call(&entry))
        };
        self.calls.remove(call_id);
        self.admission.release(user_aor.as_deref(), trunk_name.as_deref());
        self.cdr_sink.record(cdr);
        info!(%call_id, reason = reason.as_str(), "call ended");
        self.events.publish(SbcEvent::CallEnded { call_id: call_id.to_string(), end_reason: reason.as_str().to_string() });
        Ok(())
    }

    pub fn get(&self, call_id: &str) -> Option<Call> {
        self.calls.get(call_id).map(|c| c.clone())
    }

    pub fn active_count(&self) -> usize {
        self.calls.len()
    }

    fn transition(&self, call_id: &str, to: CallState) -> Result<()> {
        let mut entry = self.calls.get_mut(call_id).ok_or_else(|| Error::CallNotFound(call_id.to_string()))?;
        entry.transition(to, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdr::InMemoryCdrSink;

    fn manager() -> (CallManager, Arc<InMemoryCdrSink>) {
        let sink = Arc::new(InMemoryCdrSink::new());
        let manager = CallManager::new(AdmissionControl::new(10, 10, 10), EventBus::new(), sink.clone());
        (manager, sink)
    }

    #[test]
    fn full_lifecycle_emits_cdr_and_frees_admission_slot() {
        let (manager, sink) = manager();
        manager.start_call("call-1", "alice", "bob", Direction::Inbound, Some("alice"), None).unwrap();
        manager.ring("call-1").unwrap();
        manager.answer("call-1").unwrap();
        manager.bridge("call-1").unwrap();
        manager.end_call("call-1", EndReason::NormalClearing).unwrap();
        assert_eq!(manager.active_count(), 0);
        assert_eq!(sink.all().len(), 1);
        assert_eq!(sink.all()[0].end_reason, "normal_clearing");
    }

    #[test]
    fn admission_rejection_prevents_call_creation() {
        let sink = Arc::new(InMemoryCdrSink::new());
        let manager = CallManager::new(AdmissionControl::new(0, 10, 10), EventBus::new(), sink);
        let result = manager.start_call("call-1", "alice", "bob", Direction::Inbound, None, None);
        assert_eq!(result, Err(Error::GlobalLimitReached));
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn ending_unknown_call_is_an_error() {
        let (manager, _sink) = manager();
        assert_eq!(manager.end_call("missing", EndReason::Cancelled), Err(Error::CallNotFound("missing".into())));
    }

    #[test]
    fn released_admission_slot_is_reusable_by_the_same_user() {
        let sink = Arc::new(InMemoryCdrSink::new());
        let manager = CallManager::new(AdmissionControl::new(10, 1, 10), EventBus::new(), sink);
        manager.start_call("call-1", "alice", "bob", Direction::Inbound, Some("alice"), None).unwrap();
        assert_eq!(
            manager.start_call("call-2", "alice", "carol", Direction::Inbound, Some("alice"), None),
            Err(Error::UserLimitReached("alice".into()))
        );
        manager.end_call("call-1", EndReason::NormalClearing).unwrap();
        manager.start_call("call-2", "alice", "carol", Direction::Inbound, Some("alice"), None).unwrap();
    }
}
