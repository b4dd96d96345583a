use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("call {0} not found")]
    CallNotFound(String),

    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: crate::call::CallState, to: crate::call::CallState },

    #[error("global concurrent call limit reached")]
    GlobalLimitReached,

    #[error("user {0} has reached their concurrent call limit")]
    UserLimitReached(String),

    #[error("trunk {0} has reached its concurrent call limit")]
    TrunkLimitReached(String),
}
