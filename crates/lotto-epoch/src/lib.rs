//! Detects epoch expiry, advances the epoch, takes a snapshot, and
//! publishes it into the cache the draw controller reveals against.

pub mod cache;
pub mod reward;

pub use cache::{CacheError, SnapshotCache};
pub use reward::{NoRewardClaimer, RewardClaimer, ValidatorRewardClaimer};

use lotto_chain::messages::{
    EpochStateResponse, HubConfigResponse, StakingHubExecuteMsg, StakingHubQueryMsg,
};
use lotto_chain::{ChainBroadcaster, ChainError, ChainQuery, execute, smart_query};
use lotto_snapshot::{EligibilityFilter, HolderSource, SnapshotError, build_snapshot};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while running the epoch controller.
#[derive(Debug, Error)]
pub enum EpochError {
    /// A chain query or submission failed.
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
    /// Snapshot construction failed.
    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    /// Publishing the snapshot cache failed.
    #[error("snapshot cache: {0}")]
    Cache(#[from] CacheError),
}

/// Run one iteration of the epoch controller.
///
/// # Errors
/// Returns [`EpochError`] if any query, submission, or cache publish
/// fails. The caller (the supervisor loop) logs and retries next period;
/// no iteration error is fatal.
#[allow(clippy::too_many_arguments)]
pub async fn run_once(
    hub_query: &dyn ChainQuery,
    hub_broadcaster: &dyn ChainBroadcaster,
    hub_address: &str,
    now_ns: u128,
    denom: &str,
    holder_source: &dyn HolderSource,
    eligibility: &dyn EligibilityFilter,
    reward_claimer: &dyn reward::RewardClaimer,
    cache: &SnapshotCache,
) -> Result<(), EpochError> {
    let state: EpochStateResponse =
        smart_query(hub_query, hub_address, &StakingHubQueryMsg::EpochState {}).await?;
    let config: HubConfigResponse =
        smart_query(hub_query, hub_address, &StakingHubQueryMsg::Config {}).await?;

    let epoch_start_ns = u128::from(state.epoch_start_time).saturating_mul(1_000_000_000);
    let elapsed_seconds = now_ns
        .saturating_sub(epoch_start_ns)
        .checked_div(1_000_000_000)
        .unwrap_or(0);

    if elapsed_seconds < u128::from(config.epoch_duration_seconds) {
        return Ok(());
    }

    let reward_amount = reward_claimer.claim().await?;
    execute(
        hub_broadcaster,
        hub_address,
        &StakingHubExecuteMsg::AdvanceEpoch {},
        reward_amount,
    )
    .await?;
    info!(epoch = state.epoch, reward_amount, "advanced epoch");

    if state.snapshot_finalized {
        return Ok(());
    }

    let snapshot = build_snapshot(holder_source, eligibility, denom).await?;
    let num_holders = u64::try_from(snapshot.entries.len()).unwrap_or(u64::MAX);
    let merkle_root = hex::encode(snapshot.merkle_root);
    let total_weight = snapshot.total_weight;

    match execute(
        hub_broadcaster,
        hub_address,
        &StakingHubExecuteMsg::TakeSnapshot {
            merkle_root,
            total_weight,
            num_holders,
            snapshot_uri: String::new(),
        },
        0,
    )
    .await
    {
        Ok(_) => {
            cache.publish(snapshot).await?;
            info!(num_holders, total_weight, "published snapshot");
        }
        Err(ChainError::TxRejected(log)) => {
            warn!(log, "take_snapshot rejected, snapshot not cached");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
