//! Reward funding for `advance_epoch`, opt-in.
//!
//! The upstream design always calls `advance_epoch` with zero rewards and
//! carries a TODO to claim delegation rewards from validators first. This
//! crate preserves that default but makes it pluggable: a real deployment
//! can supply a [`RewardClaimer`] that withdraws validator rewards into the
//! operator account and reports the claimed amount to forward as funds.

use std::sync::Arc;

use async_trait::async_trait;
use lotto_chain::{ChainClient, ChainError};
use tracing::{info, warn};

/// Claims delegation rewards ahead of `advance_epoch`, returning the
/// amount (in the native denom) now sitting in the operator's account and
/// available to forward as funds.
#[async_trait]
pub trait RewardClaimer: Send + Sync {
    /// Claim rewards and return the claimed amount.
    async fn claim(&self) -> Result<u128, ChainError>;
}

/// The default claimer: claims nothing, matching the documented gap.
pub struct NoRewardClaimer;

#[async_trait]
impl RewardClaimer for NoRewardClaimer {
    async fn claim(&self) -> Result<u128, ChainError> {
        Ok(0)
    }
}

/// Withdraws the operator's pending delegation rewards from a fixed set of
/// validators and forwards the withdrawn amount into `advance_epoch`.
///
/// The withdraw is queried first so the claimed amount is known even if the
/// withdraw transaction itself is still settling; a rejected withdraw is
/// logged and treated as zero claimed rather than failing the epoch
/// advance.
pub struct ValidatorRewardClaimer {
    client: Arc<ChainClient>,
    validators: Vec<String>,
}

impl ValidatorRewardClaimer {
    /// Build a claimer that withdraws from `validators` using `client`.
    #[must_use]
    pub fn new(client: Arc<ChainClient>, validators: Vec<String>) -> Self {
        Self { client, validators }
    }
}

#[async_trait]
impl RewardClaimer for ValidatorRewardClaimer {
    async fn claim(&self) -> Result<u128, ChainError> {
        if self.validators.is_empty() {
            return Ok(0);
        }
        let total = self.client.delegation_total_rewards().await?;
        if total == 0 {
            return Ok(0);
        }
        match self.client.withdraw_delegator_rewards(&self.validators).await {
            Ok(_) => {
                info!(total, validators = self.validators.len(), "claimed validator rewards");
                Ok(total)
            }
            Err(ChainError::TxRejected(log)) => {
                warn!(log, "withdraw_delegator_rewards rejected, claiming nothing this epoch");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_reward_claimer_claims_nothing() {
        assert_eq!(NoRewardClaimer.claim().await.expect("ok"), 0);
    }
}
