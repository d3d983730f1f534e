//! Operator identity, signing, and serialized transaction submission
//! against the Injective-style chain the lottery contracts live on.

pub mod client;
pub mod error;
pub mod identity;
pub mod messages;
pub mod retry;

pub use client::{ChainBroadcaster, ChainClient, ChainQuery, execute, smart_query};
pub use error::ChainError;
pub use identity::{IdentityError, OperatorIdentity};
pub use retry::{RetryPolicy, retry_with_backoff};
