use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("connecting to AI backend: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("auth handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("AI backend rejected the auth frame")]
    AuthRejected,

    #[error("decoding frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("bridge reconnect attempts exhausted")]
    ReconnectExhausted,

    #[error("bridge is closed")]
    Closed,
}
