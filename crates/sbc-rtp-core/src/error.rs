use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported RTP version: {0}")]
    UnsupportedVersion(u8),

    #[error("socket send failed: {0}")]
    SocketSend(String),
}
