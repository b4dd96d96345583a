//! Call admission control, the per-call state machine, and CDR emission
//! (C9). SIP dialog/transaction wiring and bridge I/O live in
//! `sbc-dialog-core`/`sbc-transaction-core`/`sbc-ai-bridge`; this crate owns
//! only the call's lifecycle and its accounting.

pub mod admission;
pub mod call;
pub mod cdr;
pub mod error;
pub mod manager;

pub use admission::AdmissionControl;
pub use call::{Call, CallState, CallStats, Direction, EndReason};
pub use cdr::{Cdr, CdrSink, InMemoryCdrSink};
pub use error::{Error, Result};
pub use manager::CallManager;
