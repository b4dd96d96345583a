//! RFC 3261 §17 SIP transaction FSMs and their timers (C7). Each
//! transaction type is a synchronous state machine; the caller (the
//! Transaction Layer's dispatcher, in `sbc-call-engine`) owns transport I/O
//! and timer scheduling, invoking these types with events and applying the
//! returned `Action`s.

pub mod error;
pub mod invite_client;
pub mod invite_server;
pub mod key;
pub mod non_invite_client;
pub mod non_invite_server;
pub mod timer;

pub use error::{Error, Result};
pub use invite_client::InviteClientTransaction;
pub use invite_server::InviteServerTransaction;
pub use key::TransactionKey;
pub use non_invite_client::NonInviteClientTransaction;
pub use non_invite_server::NonInviteServerTransaction;
pub use timer::TimerName;
