//! Spawns and supervises the three independent timer-driven loops (§4.8):
//! beacon mirror, epoch controller, and draw controller.
//!
//! Each loop is `loop { try { work }.await catch { log }; sleep(period) }`.
//! An iteration error never kills its loop; only a task panic (surfaced as
//! a `JoinError` from `tokio::try_join!`) propagates out of [`run`] to
//! `main`, matching §4.8's "a fatal error in main propagates to process
//! exit; individual iteration errors never kill a loop."

use std::sync::Arc;
use std::time::Duration;

use lotto_beacon::BeaconHttpClient;
use lotto_chain::ChainClient;
use lotto_draw::SecretStore;
use lotto_epoch::{NoRewardClaimer, RewardClaimer, SnapshotCache, ValidatorRewardClaimer};
use lotto_snapshot::{AlwaysEligible, BankModuleHolderSource};
use tracing::error;

use crate::config::Config;

/// The bank module's query route. Not a CosmWasm contract address; reused
/// through the same [`lotto_chain::ChainQuery`] abstraction as documented
/// on [`lotto_snapshot::BankModuleHolderSource`].
const BANK_MODULE_ROUTE: &str = "bank";

/// Wire the three loops and run them until one panics or the process is
/// asked to shut down.
///
/// # Errors
/// Returns an error if a loop task panics; individual iteration failures
/// are logged and retried, never propagated here.
pub async fn run(config: Config, client: Arc<ChainClient>) -> eyre::Result<()> {
    let secrets_path = config.data_dir.join("pending_secrets.json");
    let cache_path = config.data_dir.join("snapshot_cache.json");

    let secrets = Arc::new(SecretStore::load(secrets_path).await?);
    let cache = Arc::new(SnapshotCache::new(cache_path));
    cache.load().await;

    let beacon = Arc::new(BeaconHttpClient::new(
        config.drand_api_url.clone(),
        config.drand_chain_hash.clone(),
    ));

    let beacon_loop = tokio::spawn(beacon_loop(
        client.clone(),
        config.drand_oracle_address.clone(),
        beacon.clone(),
        Duration::from_secs(config.drand_poll_interval),
    ));

    let epoch_loop = tokio::spawn(epoch_loop(
        client.clone(),
        config.staking_hub_address.clone(),
        config.stake_denom.clone(),
        config.reward_validators(),
        cache.clone(),
        Duration::from_secs(config.epoch_check_interval),
    ));

    let draw_loop = tokio::spawn(draw_loop(
        client,
        config.reward_distributor_address.clone(),
        config.drand_oracle_address.clone(),
        config.staking_hub_address.clone(),
        beacon,
        cache,
        secrets,
        Duration::from_secs(config.draw_check_interval),
    ));

    tokio::try_join!(beacon_loop, epoch_loop, draw_loop)?;
    Ok(())
}

fn now_ns() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

async fn beacon_loop(
    client: Arc<ChainClient>,
    oracle_address: String,
    beacon: Arc<BeaconHttpClient>,
    period: Duration,
) {
    loop {
        if let Err(e) = lotto_beacon::run_once(
            client.as_ref(),
            client.as_ref(),
            &oracle_address,
            beacon.as_ref(),
        )
        .await
        {
            error!(error = %e, "beacon loop iteration failed");
        }
        tokio::time::sleep(period).await;
    }
}

async fn epoch_loop(
    client: Arc<ChainClient>,
    hub_address: String,
    denom: String,
    reward_validators: Vec<String>,
    cache: Arc<SnapshotCache>,
    period: Duration,
) {
    let holder_source = BankModuleHolderSource::new(client.as_ref(), BANK_MODULE_ROUTE);
    let reward_claimer: Box<dyn RewardClaimer> = if reward_validators.is_empty() {
        Box::new(NoRewardClaimer)
    } else {
        Box::new(ValidatorRewardClaimer::new(client.clone(), reward_validators))
    };

    loop {
        if let Err(e) = lotto_epoch::run_once(
            client.as_ref(),
            client.as_ref(),
            &hub_address,
            now_ns(),
            &denom,
            &holder_source,
            &AlwaysEligible,
            reward_claimer.as_ref(),
            cache.as_ref(),
        )
        .await
        {
            error!(error = %e, "epoch loop iteration failed");
        }
        tokio::time::sleep(period).await;
    }
}

async fn draw_loop(
    client: Arc<ChainClient>,
    distributor_address: String,
    oracle_address: String,
    staking_hub_address: String,
    beacon: Arc<BeaconHttpClient>,
    cache: Arc<SnapshotCache>,
    secrets: Arc<SecretStore>,
    period: Duration,
) {
    loop {
        let epoch = match current_epoch(client.as_ref(), &staking_hub_address).await {
            Ok(epoch) => epoch,
            Err(e) => {
                error!(error = %e, "draw loop could not resolve current epoch");
                tokio::time::sleep(period).await;
                continue;
            }
        };

        if let Err(e) = lotto_draw::run_once(
            client.as_ref(),
            client.as_ref(),
            &distributor_address,
            client.as_ref(),
            client.as_ref(),
            &oracle_address,
            client.as_ref(),
            &staking_hub_address,
            beacon.as_ref(),
            cache.as_ref(),
            secrets.as_ref(),
            now_ns(),
            epoch,
        )
        .await
        {
            error!(error = %e, "draw loop iteration failed");
        }
        tokio::time::sleep(period).await;
    }
}

/// The draw loop needs the current epoch to tag freshly committed draws;
/// read it straight from the staking hub rather than threading it through
/// from the epoch loop, since the two loops run on independent periods.
async fn current_epoch(
    client: &ChainClient,
    staking_hub_address: &str,
) -> Result<u64, lotto_chain::ChainError> {
    let state: lotto_chain::messages::EpochStateResponse = lotto_chain::smart_query(
        client,
        staking_hub_address,
        &lotto_chain::messages::StakingHubQueryMsg::EpochState {},
    )
    .await?;
    Ok(state.epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_module_route_is_stable() {
        assert_eq!(BANK_MODULE_ROUTE, "bank");
    }
}
