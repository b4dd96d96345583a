//! INVITE client transaction, RFC 3261 §17.1.1.

use crate::error::{Error, Result};
use crate::timer::{next_retransmit_interval, TimerName, T1};
use sbc_sip_core::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Calling,
    Proceeding,
    Completed,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RetransmitInvite,
    SendAck,
    ScheduleTimer { name: TimerName, after: Duration },
    CancelTimer(TimerName),
    NotifyTu(StatusCode),
}

pub struct InviteClientTransaction {
    state: State,
    retransmit_interval: Duration,
    reliable_transport: bool,
}

impl InviteClientTransaction {
    /// Starting a transaction always arms Timer B (overall timeout) and,
    /// on unreliable transports, Timer A for retransmission.
    pub fn new(reliable_transport: bool) -> (Self, Vec<Action>) {
        let mut actions = vec![Action::ScheduleTimer { name: TimerName::B, after: T1 * 64 }];
        if !reliable_transport {
            actions.push(Action::ScheduleTimer { name: TimerName::A, after: T1 });
        }
        (
            InviteClientTransaction {
                state: State::Calling,
                retransmit_interval: T1,
                reliable_transport,
            },
            actions,
        )
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn on_timer(&mut self, timer: TimerName) -> Vec<Action> {
        match (self.state, timer) {
            (State::Calling, TimerName::A) => {
                self.retransmit_interval = next_retransmit_interval(self.retransmit_interval);
                vec![
                    Action::RetransmitInvite,
                    Action::ScheduleTimer { name: TimerName::A, after: self.retransmit_interval },
                ]
            }
            (State::Calling, TimerName::B) | (State::Proceeding, TimerName::B) => {
                self.state = State::Terminated;
                vec![Action::NotifyTu(StatusCode::REQUEST_TIMEOUT)]
            }
            (State::Completed, TimerName::D) => {
                self.state = State::Terminated;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// A response arrived for this transaction.
    pub fn on_response(&mut self, status: StatusCode) -> Result<Vec<Action>> {
        if self.state == State::Terminated {
            return Err(Error::Terminated("invite-client".into()));
        }
        if status.is_provisional() {
            self.state = State::Proceeding;
            return Ok(Vec::new());
        }

        let mut actions = vec![Action::CancelTimer(TimerName::A), Action::CancelTimer(TimerName::B)];
        if status.is_success() {
            // 2xx ACK is dialog-layer responsibility; this transaction is
            // done the moment the TU has seen the response.
            self.state = State::Terminated;
            actions.push(Action::NotifyTu(status));
        } else {
            self.state = State::Completed;
            actions.push(Action::SendAck);
            actions.push(Action::NotifyTu(status));
            let wait = if self.reliable_transport { Duration::ZERO } else { crate::timer::T4 * 2 };
            actions.push(Action::ScheduleTimer { name: TimerName::D, after: wait });
        }
        Ok(actions)
    }
}
