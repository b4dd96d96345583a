//! INVITE server transaction, RFC 3261 §17.2.1. A pure state machine: the
//! caller drives it with incoming requests/responses/timer fires and reads
//! back the actions (`Action`) it should perform (send, (re)schedule a
//! timer, cancel a timer). Keeping the FSM synchronous and I/O-free makes it
//! directly unit-testable without a runtime, unlike the teacher's
//! generic async `run_transaction_loop`, whose trait-based dispatch this
//! crate doesn't need for a single concrete set of four FSMs.

use crate::error::{Error, Result};
use crate::timer::{TimerName, T1, T4};
use sbc_sip_core::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Proceeding,
    Accepted,
    Completed,
    Confirmed,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendResponse(StatusCode),
    ScheduleTimer { name: TimerName, after: Duration },
    CancelTimer(TimerName),
    NotifyTu(StatusCode),
}

pub struct InviteServerTransaction {
    state: State,
    last_final_status: Option<StatusCode>,
    retransmit_interval: Duration,
    reliable_transport: bool,
}

impl InviteServerTransaction {
    /// `reliable_transport` disables retransmission timers (G/I are no-ops
    /// on TCP per RFC 3261 §17.2.1).
    pub fn new(reliable_transport: bool) -> Self {
        InviteServerTransaction {
            state: State::Proceeding,
            last_final_status: None,
            retransmit_interval: T1,
            reliable_transport,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// A retransmit of the original INVITE arrived while still in
    /// Proceeding/Completed: reply with the last response sent, never
    /// re-running upper-layer logic.
    pub fn on_duplicate_invite(&self) -> Option<Action> {
        self.last_final_status.map(Action::SendResponse)
    }

    /// Upper layer sends a response. Drives Proceeding -> Accepted/Completed.
    pub fn send_response(&mut self, status: StatusCode) -> Result<Vec<Action>> {
        if self.state != State::Proceeding {
            return Err(Error::InvalidTransition { from: "non-Proceeding", to: "response" });
        }
        let mut actions = vec![Action::SendResponse(status)];
        if status.is_provisional() {
            return Ok(actions);
        }

        self.last_final_status = Some(status);
        if status.is_success() {
            self.state = State::Accepted;
            if !self.reliable_transport {
                actions.push(Action::ScheduleTimer { name: TimerName::L, after: T4 });
            } else {
                self.state = State::Terminated;
            }
        } else {
            self.state = State::Completed;
            if !self.reliable_transport {
                self.retransmit_interval = T1;
                actions.push(Action::ScheduleTimer { name: TimerName::G, after: self.retransmit_interval });
            }
            actions.push(Action::ScheduleTimer { name: TimerName::H, after: crate::timer::INVITE_CLIENT_RETRANSMIT_CAP });
        }
        Ok(actions)
    }

    /// ACK received for a non-2xx final response: absorbed here (2xx ACKs
    /// are dialog-layer traffic and never reach this FSM).
    pub fn on_ack(&mut self) -> Vec<Action> {
        if self.state != State::Completed {
            return Vec::new();
        }
        self.state = State::Confirmed;
        let mut actions = vec![Action::CancelTimer(TimerName::G), Action::CancelTimer(TimerName::H)];
        if self.reliable_transport {
            self.state = State::Terminated;
        } else {
            actions.push(Action::ScheduleTimer { name: TimerName::I, after: T4 });
        }
        actions
    }

    pub fn on_timer(&mut self, timer: TimerName) -> Vec<Action> {
        match (self.state, timer) {
            (State::Completed, TimerName::G) => {
                self.retransmit_interval = crate::timer::next_retransmit_interval(self.retransmit_interval);
                vec![
                    Action::SendResponse(self.last_final_status.unwrap()),
                    Action::ScheduleTimer { name: TimerName::G, after: self.retransmit_interval },
                ]
            }
            (State::Completed, TimerName::H) | (State::Accepted, TimerName::L) | (State::Confirmed, TimerName::I) => {
                self.state = State::Terminated;
                vec![Action::NotifyTu(self.last_final_status.unwrap_or(StatusCode::REQUEST_TIMEOUT))]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_response_stays_in_proceeding() {
        let mut tx = InviteServerTransaction::new(false);
        let actions = tx.send_response(StatusCode::RINGING).unwrap();
        assert_eq!(tx.state(), State::Proceeding);
        assert_eq!(actions, vec![Action::SendResponse(StatusCode::RINGING)]);
    }

    #[test]
    fn success_moves_to_accepted_and_schedules_timer_l() {
        let mut tx = InviteServerTransaction::new(false);
        let actions = tx.send_response(StatusCode::OK).unwrap();
        assert_eq!(tx.state(), State::Accepted);
        assert!(actions.iter().any(|a| matches!(a, Action::ScheduleTimer { name: TimerName::L, .. })));
    }

    #[test]
    fn non_success_schedules_retransmit_and_timeout() {
        let mut tx = InviteServerTransaction::new(false);
        let actions = tx.send_response(StatusCode::BUSY_HERE).unwrap();
        assert_eq!(tx.state(), State::Completed);
        assert!(actions.contains(&Action::ScheduleTimer { name: TimerName::G, after: T1 }));
    }

    #[test]
    fn ack_moves_completed_to_confirmed_and_cancels_retransmit() {
        let mut tx = InviteServerTransaction::new(false);
        tx.send_response(StatusCode::BUSY_HERE).unwrap();
        let actions = tx.on_ack();
        assert_eq!(tx.state(), State::Confirmed);
        assert!(actions.contains(&Action::CancelTimer(TimerName::G)));
    }

    #[test]
    fn reliable_transport_terminates_immediately_on_success() {
        let mut tx = InviteServerTransaction::new(true);
        tx.send_response(StatusCode::OK).unwrap();
        assert_eq!(tx.state(), State::Terminated);
    }

    #[test]
    fn duplicate_invite_replays_last_final_response() {
        let mut tx = InviteServerTransaction::new(false);
        tx.send_response(StatusCode::BUSY_HERE).unwrap();
        assert_eq!(tx.on_duplicate_invite(), Some(Action::SendResponse(StatusCode::BUSY_HERE)));
    }

    #[test]
    fn timer_h_expiry_terminates_transaction() {
        let mut tx = InviteServerTransaction::new(false);
        tx.send_response(StatusCode::BUSY_HERE).unwrap();
        let actions = tx.on_timer(TimerName::H);
        assert_eq!(tx.state(), State::Terminated);
        assert!(matches!(actions[0], Action::NotifyTu(_)));
    }
}
