use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid frame size: expected one of {expected:?}, got {actual}")]
    InvalidFrameSize { expected: &'static [usize], actual: usize },

    #[error("no ports available in configured range")]
    NoPortsAvailable,

    #[error("port {0} is outside the configured range")]
    PortOutOfRange(u16),

    #[error("port {0} is not owned by the caller")]
    PortNotOwned(u16),
}
