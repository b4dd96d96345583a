//! Non-INVITE client transaction, RFC 3261 §17.1.2.

use crate::error::{Error, Result};
use crate::timer::{next_retransmit_interval, TimerName, T1, T2, T4};
use sbc_sip_core::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Trying,
    Proceeding,
    Completed,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RetransmitRequest,
    ScheduleTimer { name: TimerName, after: Duration },
    CancelTimer(TimerName),
    NotifyTu(StatusCode),
}

pub struct NonInviteClientTransaction {
    state: State,
    retransmit_interval: Duration,
    reliable_transport: bool,
}

impl NonInviteClientTransaction {
    pub fn new(reliable_transport: bool) -> (Self, Vec<Action>) {
        let mut actions = vec![Action::ScheduleTimer { name: TimerName::F, after: T1 * 64 }];
        if !reliable_transport {
            actions.push(Action::ScheduleTimer { name: TimerName::E, after: T1 });
        }
        (
            NonInviteClientTransaction { state: State::Trying, retransmit_interval: T1, reliable_transport },
            actions,
        )
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn on_timer(&mut self, timer: TimerName) -> Vec<Action> {
        match (self.state, timer) {
            (State::Trying, TimerName::E) | (State::Proceeding, TimerName::E) => {
                self.retransmit_interval = if self.state == State::Proceeding {
                    T2
                } else {
                    next_retransmit_interval(self.retransmit_interval)
                };
                vec![
                    Action::RetransmitRequest,
                    Action::ScheduleTimer { name: TimerName::E, after: self.retransmit_interval },
                ]
            }
            (State::Trying, TimerName::F) | (State::Proceeding, TimerName::F) => {
                self.state = State::Terminated;
                vec![Action::NotifyTu(StatusCode::REQUEST_TIMEOUT)]
            }
            (State::Completed, TimerName::K) => {
                self.state = State::Terminated;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn on_response(&mut self, status: StatusCode) -> Result<Vec<Action>> {
        if self.state == State::Terminated {
            return Err(Error::Terminated("non-invite-client".into()));
        }
        if status.is_provisional() {
            self.state = State::Proceeding;
            return Ok(Vec::new());
        }

        self.state = State::Completed;
        let mut actions = vec![Action::CancelTimer(TimerName::E), Action::CancelTimer(TimerName::F), Action::NotifyTu(status)];
        let wait = if self.reliable_transport { Duration::ZERO } else { T4 };
        actions.push(Action::ScheduleTimer { name: TimerName::K, after: wait });
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_moves_to_proceeding() {
        let (mut tx, _) = NonInviteClientTransaction::new(false);
        tx.on_response(StatusCode::TRYING).unwrap();
        assert_eq!(tx.state(), State::Proceeding);
    }

    #[test]
    fn final_response_schedules_timer_k() {
        let (mut tx, _) = NonInviteClientTransaction::new(false);
        let actions = tx.on_response(StatusCode::OK).unwrap();
        assert_eq!(tx.state(), State::Completed);
        assert!(actions.iter().any(|a| matches!(a, Action::ScheduleTimer { name: TimerName::K, .. })));
    }

    #[test]
    fn timer_k_terminates() {
        let (mut tx, _) = NonInviteClientTransaction::new(false);
        tx.on_response(StatusCode::OK).unwrap();
        tx.on_timer(TimerName::K);
        assert_eq!(tx.state(), State::Terminated);
    }

    #[test]
    fn timer_f_times_out_while_trying() {
        let (mut tx, _) = NonInviteClientTransaction::new(false);
        let actions = tx.on_timer(TimerName::F);
        assert_eq!(tx.state(), State::Terminated);
        assert_eq!(actions, vec![Action::NotifyTu(StatusCode::REQUEST_TIMEOUT)]);
    }
}
