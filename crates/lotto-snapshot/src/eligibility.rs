//! Pluggable eligibility predicate applied to each holder before it enters
//! the snapshot's cumulative layout.
//!
//! The snapshot's own invariants (address-sorted, zero-balance-free,
//! contiguous) don't depend on which filter is used; any predicate
//! implementing [`EligibilityFilter`] composes with [`crate::build_snapshot`].

use async_trait::async_trait;
use lotto_chain::{ChainQuery, smart_query};
use lotto_core::DenomHolder;
use serde::{Deserialize, Serialize};

use crate::SnapshotError;

/// Decides whether a holder belongs in the snapshot being built.
#[async_trait]
pub trait EligibilityFilter: Send + Sync {
    /// Returns `true` if `holder` should be included.
    async fn is_eligible(&self, holder: &DenomHolder) -> Result<bool, SnapshotError>;
}

/// The default filter: every holder with a non-zero balance is eligible.
/// [`lotto_core::Snapshot::from_holders`] drops zero balances on its own,
/// so this filter never needs to inspect the holder at all.
pub struct AlwaysEligible;

#[async_trait]
impl EligibilityFilter for AlwaysEligible {
    async fn is_eligible(&self, _holder: &DenomHolder) -> Result<bool, SnapshotError> {
        Ok(true)
    }
}

#[derive(Debug, Serialize)]
struct StakerInfoQuery<'a> {
    staker_info: StakerInfoQueryInner<'a>,
}

#[derive(Debug, Serialize)]
struct StakerInfoQueryInner<'a> {
    address: &'a str,
}

#[derive(Debug, Deserialize)]
struct StakerInfoResponse {
    stake_epoch: u64,
}

/// Drops holders who haven't been staked for `min_epochs_regular` epochs.
///
/// This is the "one variant of the code" the lottery's eligibility rule
/// describes: a holder below the regular threshold is excluded entirely;
/// one between the regular and big thresholds is included but is not
/// eligible for the big draw (tracked via [`Self::is_big_eligible`] rather
/// than by dropping it here, since the snapshot itself has no notion of
/// draw type).
pub struct StakeEpochFilter<'a> {
    client: &'a dyn ChainQuery,
    staking_hub_address: String,
    current_epoch: u64,
    min_epochs_regular: u64,
    min_epochs_big: u64,
}

impl<'a> StakeEpochFilter<'a> {
    /// Build a filter against the staking hub at `staking_hub_address`,
    /// evaluated as of `current_epoch`.
    #[must_use]
    pub fn new(
        client: &'a dyn ChainQuery,
        staking_hub_address: impl Into<String>,
        current_epoch: u64,
        min_epochs_regular: u64,
        min_epochs_big: u64,
    ) -> Self {
        Self {
            client,
            staking_hub_address: staking_hub_address.into(),
            current_epoch,
            min_epochs_regular,
            min_epochs_big,
        }
    }

    async fn stake_epoch(&self, address: &str) -> Result<u64, SnapshotError> {
        let query = StakerInfoQuery {
            staker_info: StakerInfoQueryInner { address },
        };
        let response: StakerInfoResponse =
            smart_query(self.client, &self.staking_hub_address, &query)
                .await
                .map_err(|e| SnapshotError::Eligibility(e.to_string()))?;
        Ok(response.stake_epoch)
    }

    /// Whether `address` has been staked long enough to be included in the
    /// big draw, given its already-known `stake_epoch`.
    #[must_use]
    pub fn is_big_eligible(&self, stake_epoch: u64) -> bool {
        self.current_epoch.saturating_sub(stake_epoch) >= self.min_epochs_big
    }
}

#[async_trait]
impl EligibilityFilter for StakeEpochFilter<'_> {
    async fn is_eligible(&self, holder: &DenomHolder) -> Result<bool, SnapshotError> {
        let stake_epoch = self.stake_epoch(&holder.address).await?;
        Ok(self.current_epoch.saturating_sub(stake_epoch) >= self.min_epochs_regular)
    }
}
