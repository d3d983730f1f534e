//! Errors raised by the chain client.

use thiserror::Error;

/// Errors that can occur while querying or submitting to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The identity derivation failed.
    #[error("identity: {0}")]
    Identity(#[from] crate::identity::IdentityError),
    /// The RPC transport itself failed (connection refused, DNS, timeout).
    #[error("transport: {0}")]
    Transport(String),
    /// The node returned a non-zero ABCI code for a query.
    #[error("query rejected: code {code}, log: {log}")]
    QueryRejected {
        /// The ABCI response code.
        code: u32,
        /// The node's log message.
        log: String,
    },
    /// `broadcast_tx_sync` returned a non-zero check-tx code. Not retried:
    /// a rejected transaction needs a new sequence number or fee, not a
    /// repeat of the exact same bytes.
    #[error("transaction rejected: {0}")]
    TxRejected(String),
    /// The response body could not be decoded into the expected type.
    #[error("response decoding failed: {0}")]
    Decoding(String),
    /// Transaction construction (signing, encoding) failed locally.
    #[error("transaction build failed: {0}")]
    Build(String),
}

impl ChainError {
    /// Whether this error represents a transient condition worth retrying.
    #[allow(
        clippy::wildcard_enum_match_arm,
        reason = "only transport-level failures are considered transient"
    )]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
