//! SIP message parsing/serialization and SDP offer/answer handling (C6).
//!
//! Scope is the subset of RFC 3261/4566 spec.md §4.6 names: request/status
//! lines, header framing with compact-form expansion, a single audio `m=`
//! section negotiating PCMU/PCMA.

pub mod error;
pub mod header;
pub mod message;
pub mod method;
pub mod sdp;
pub mod status;
pub mod uri;

pub use error::{Error, Result};
pub use header::Headers;
pub use message::{parse_message, serialize_request, serialize_response, Message, Request, Response};
pub use method::Method;
pub use sdp::{build_answer, parse_offer, select_codec, AudioCodec};
pub use status::StatusCode;
pub use uri::Uri;
