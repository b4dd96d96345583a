use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("transaction {0} is already terminated")]
    Terminated(String),

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("response status {0} does not match the transaction's expected range")]
    UnexpectedStatus(u16),
}
