use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no dialog matches (call-id={0}, local-tag={1}, remote-tag={2})")]
    DialogNotFound(String, String, String),

    #[error("CSeq {got} is not strictly increasing over {last_seen}")]
    OutOfOrderCseq { last_seen: u32, got: u32 },

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("user {0} is blocked")]
    UserBlocked(String),

    #[error("user {0} is locked until a later time")]
    UserLocked(String),

    #[error("stale nonce")]
    StaleNonce,

    #[error("digest response mismatch")]
    DigestMismatch,

    #[error("no binding for address-of-record {0}")]
    NoBinding(String),

    #[error("no trunk available supporting outbound calls")]
    NoOutboundTrunk,
}
