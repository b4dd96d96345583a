//! RFC 3261 §17 timer defaults and the named timers each FSM schedules.
//! Owned timer *firing* (the actual sleeps) lives with the caller (a timer
//! wheel or per-transaction task); this module only holds durations and the
//! tags used to identify which timer fired.

use std::time::Duration;

pub const T1: Duration = Duration::from_millis(500);
pub const T2: Duration = Duration::from_secs(4);
pub const T4: Duration = Duration::from_secs(5);

/// Timer A backoff sequence cap: retransmit up to 64*T1 per RFC 3261 §17.1.1.2.
pub const INVITE_CLIENT_RETRANSMIT_CAP: Duration = Duration::from_millis(500 * 64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    /// INVITE client: retransmit INVITE (UDP only).
    A,
    /// INVITE client: give up on no final response.
    B,
    /// INVITE client: wait time in Completed before Terminated (non-2xx ACK absorption).
    D,
    /// Non-INVITE client: retransmit request (UDP only).
    E,
    /// Non-INVITE client: transaction timeout.
    F,
    /// INVITE server: retransmit final response (UDP only).
    G,
    /// INVITE server: wait for ACK before giving up.
    H,
    /// INVITE server: wait time in Confirmed before Terminated (UDP only).
    I,
    /// Non-INVITE server: wait time in Completed before Terminated.
    J,
    /// INVITE client: wait time in Completed before Terminated (UDP extra delay).
    K,
    /// INVITE server (RFC 6026): wait in Accepted for late-arriving 2xx retransmits.
    L,
}

/// Next retransmit interval for Timer A/E, doubling each time up to T2.
pub fn next_retransmit_interval(previous: Duration) -> Duration {
    (previous * 2).min(T2)
}
