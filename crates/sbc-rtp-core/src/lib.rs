//! RTP packet encode/decode, per-call session bookkeeping, jitter buffer,
//! and statistics counters (C2).

pub mod error;
pub mod jitter;
pub mod packet;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use jitter::{InsertOutcome, JitterBuffer, Playout};
pub use packet::{RtpPacket, TelephoneEvent, PT_TELEPHONE_EVENT};
pub use session::{ReceiveOutcome, RtpSession};
pub use stats::{RtpStats, RtpStatsSnapshot};
