//! WebSocket bridge to the conversational AI backend (C10): auth
//! handshake, steady-state audio/DTMF/call-state relay, backpressure, and
//! reconnection.

pub mod error;
pub mod frame;
pub mod queue;
pub mod reconnect;
pub mod session;
pub mod signature;
pub mod transport;

pub use error::{Error, Result};
pub use frame::{AuthDetails, AuthFrame, CallDetails, InboundFrame, OutboundFrame};
pub use session::BridgeSession;
