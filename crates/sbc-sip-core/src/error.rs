use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// SIP/SDP parsing and serialization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("missing required header: {0}")]
    MissingHeader(String),

    #[error("content-length mismatch: expected {expected}, got {actual}")]
    ContentLengthMismatch { expected: usize, actual: usize },

    #[error("invalid SDP: {0}")]
    InvalidSdp(String),

    #[error("SDP offer has neither PCMU (0) nor PCMA (8)")]
    NoCompatibleCodec,

    #[error("incomplete message")]
    Incomplete,
}
