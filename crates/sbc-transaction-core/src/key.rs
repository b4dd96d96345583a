//! Transaction identity, per RFC 3261 §17.1.3 / §17.2.3: matched on branch,
//! method (CANCEL matches its INVITE's branch but is a distinct transaction
//! keyed by method), and sent-by for server transactions received over
//! different transports.

use sbc_sip_core::Method;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub branch: String,
    pub method: Method,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, method: Method) -> Self {
        TransactionKey { branch: branch.into(), method }
    }
}

impl std::fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.branch, self.method)
    }
}
