//! Non-INVITE server transaction, RFC 3261 §17.2.2.

use crate::error::{Error, Result};
use crate::timer::{TimerName, T4};
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
    SendResponse(StatusCode),
    ScheduleTimer { name: TimerName, after: Duration },
}

pub struct NonInviteServerTransaction {
    state: State,
    last_response: Option<StatusCode>,
}

impl NonInviteServerTransaction {
    pub fn new() -> Self {
        NonInviteServerTransaction { state: State::Trying, last_response: None }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// A retransmit of the original request arrived: replay the last
    /// response sent, if any, without invoking the upper layer again.
    pub fn on_duplicate_request(&self) -> Option<Action> {
        self.last_response.map(Action::SendResponse)
    }

    pub fn send_response(&mut self, status: StatusCode) -> Result<Vec<Action>> {
        if self.state == State::Terminated {
            return Err(Error::Terminated("non-invite-server".into()));
        }
        self.last_response = Some(status);
        let mut actions = vec![Action::SendResponse(status)];
        if status.is_provisional() {
            self.state = State::Proceeding;
        } else {
            self.state = State::Completed;
            actions.push(Action::ScheduleTimer { name: TimerName::J, after: T4 });
        }
        Ok(actions)
    }

    pub fn on_timer(&mut self, timer: TimerName) -> Vec<Action> {
        if self.state == State::Completed && timer == TimerName::J {
            self.state = State::Terminated;
        }
        Vec::new()
    }
}

impl Default for NonInviteServerTransaction {
    fn default() -> Self {
        Self::new()
    }
}
