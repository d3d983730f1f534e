//! The commit-reveal draw state machine: generates secrets, persists them,
//! reveals winners against the on-chain stored beacon, and expires draws
//! past their deadline.
//!
//! One loop iteration does reveal-then-expire-then-commit, in that order
//! (§5: "reveals are attempted before commits so a newly committed draw
//! never blocks a ready reveal for a whole period").

pub mod secrets;

pub use secrets::{SecretStore, SecretsError};

use lotto_beacon::BeaconHttpClient;
use lotto_chain::messages::{
    BeaconResponse, DistributorExecuteMsg, DistributorQueryMsg, DrawHistoryResponse,
    DrawStateResponse, EpochStateResponse, OracleQueryMsg, PoolBalancesResponse,
    StakingHubQueryMsg,
};
use lotto_chain::{ChainBroadcaster, ChainError, ChainQuery, execute, smart_query};
use lotto_core::{DrawStatus, DrawType, SecretBytes, commit_of, find_winner_index, generate_secret, winning_ticket};
use lotto_epoch::SnapshotCache;
use thiserror::Error;
use tracing::{info, warn};

/// How many history entries to sweep per iteration.
const HISTORY_WINDOW: u32 = 20;
/// Beacon rounds of lead time given to a freshly committed draw, assuming
/// a roughly 3-second beacon period (~30 seconds of lead time).
const TARGET_ROUND_LEAD: u64 = 10;

/// Errors raised while running the draw controller.
#[derive(Debug, Error)]
pub enum DrawError {
    /// A chain query or submission failed.
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
    /// The external/on-chain beacon mirror failed.
    #[error("beacon: {0}")]
    Beacon(#[from] lotto_beacon::BeaconError),
    /// The secrets store failed to load, read, or persist.
    #[error("secrets: {0}")]
    Secrets(#[from] SecretsError),
    /// No cached snapshot is available to reveal against.
    #[error("no cached snapshot available for reveal")]
    NoSnapshot,
    /// The ticket didn't fall in any entry's cumulative range.
    #[error("no winner found for ticket in snapshot ranges")]
    NoWinner,
}

/// Run one reveal/expire/commit sweep.
///
/// # Errors
/// Returns [`DrawError`] only for failures that should abort this whole
/// iteration (e.g. the initial `draw_history` read); most per-draw
/// failures are logged and skipped so other draws in the sweep still get
/// a chance.
#[allow(clippy::too_many_arguments)]
pub async fn run_once(
    distributor_query: &dyn ChainQuery,
    distributor_broadcaster: &dyn ChainBroadcaster,
    distributor_address: &str,
    oracle_query: &dyn ChainQuery,
    oracle_broadcaster: &dyn ChainBroadcaster,
    oracle_address: &str,
    hub_query: &dyn ChainQuery,
    staking_hub_address: &str,
    beacon: &BeaconHttpClient,
    snapshot_cache: &SnapshotCache,
    secrets: &SecretStore,
    now_ns: u128,
    epoch: u64,
) -> Result<(), DrawError> {
    let history: DrawHistoryResponse = smart_query(
        distributor_query,
        distributor_address,
        &DistributorQueryMsg::DrawHistory {
            start_after: None,
            limit: Some(HISTORY_WINDOW),
        },
    )
    .await?;

    for draw in &history.draws {
        if draw.status != DrawStatus::Committed {
            continue;
        }
        if let Err(e) = sweep_one(
            distributor_query,
            distributor_broadcaster,
            distributor_address,
            oracle_query,
            oracle_broadcaster,
            oracle_address,
            beacon,
            snapshot_cache,
            secrets,
            now_ns,
            draw,
        )
        .await
        {
            warn!(draw_id = draw.id, error = %e, "draw sweep step failed, continuing");
        }
    }

    commit_sweep(
        distributor_query,
        distributor_broadcaster,
        distributor_address,
        oracle_query,
        oracle_address,
        hub_query,
        staking_hub_address,
        secrets,
        epoch,
    )
    .await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn sweep_one(
    distributor_query: &dyn ChainQuery,
    distributor_broadcaster: &dyn ChainBroadcaster,
    distributor_address: &str,
    oracle_query: &dyn ChainQuery,
    oracle_broadcaster: &dyn ChainBroadcaster,
    oracle_address: &str,
    beacon: &BeaconHttpClient,
    snapshot_cache: &SnapshotCache,
    secrets: &SecretStore,
    now_ns: u128,
    draw: &lotto_core::DrawRecord,
) -> Result<(), DrawError> {
    if now_ns > draw.reveal_deadline_ns {
        expire(
            distributor_broadcaster,
            distributor_address,
            secrets,
            draw.id,
        )
        .await?;
        return Ok(());
    }

    let Some(secret) = secrets.get(draw.id).await else {
        info!(draw_id = draw.id, "no local secret, skipping (belongs to another operator or lost)");
        return Ok(());
    };

    let latest = beacon.latest().await?;
    if latest.round < draw.target_drand_round {
        return Ok(());
    }

    reveal(
        distributor_query,
        distributor_broadcaster,
        distributor_address,
        oracle_query,
        oracle_broadcaster,
        oracle_address,
        beacon,
        snapshot_cache,
        secrets,
        draw,
        &secret,
    )
    .await
}

async fn expire(
    distributor_broadcaster: &dyn ChainBroadcaster,
    distributor_address: &str,
    secrets: &SecretStore,
    draw_id: u64,
) -> Result<(), DrawError> {
    match execute(
        distributor_broadcaster,
        distributor_address,
        &DistributorExecuteMsg::ExpireDraw { draw_id },
        0,
    )
    .await
    {
        Ok(_) => {
            info!(draw_id, "expired draw");
        }
        Err(ChainError::TxRejected(log)) => {
            warn!(draw_id, log, "expire_draw rejected, treated as transient (already expired)");
        }
        Err(e) => return Err(e.into()),
    }
    secrets.remove(draw_id).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn reveal(
    distributor_query: &dyn ChainQuery,
    distributor_broadcaster: &dyn ChainBroadcaster,
    distributor_address: &str,
    oracle_query: &dyn ChainQuery,
    oracle_broadcaster: &dyn ChainBroadcaster,
    oracle_address: &str,
    beacon: &BeaconHttpClient,
    snapshot_cache: &SnapshotCache,
    secrets: &SecretStore,
    draw: &lotto_core::DrawRecord,
    secret: &SecretBytes,
) -> Result<(), DrawError> {
    let stored: BeaconResponse = smart_query(
        oracle_query,
        oracle_address,
        &OracleQueryMsg::Beacon {
            round: draw.target_drand_round,
        },
    )
    .await?;

    let randomness_hex = match stored.randomness {
        Some(randomness) => randomness,
        None => {
            let fetched = lotto_beacon::submit_specific_round(
                oracle_broadcaster,
                oracle_address,
                beacon,
                draw.target_drand_round,
            )
            .await?;
            hex::encode(&fetched.randomness)
        }
    };
    let randomness = hex::decode(&randomness_hex)
        .map_err(|e| DrawError::Chain(ChainError::Decoding(e.to_string())))?;

    let snapshot = snapshot_cache.current().await.ok_or(DrawError::NoSnapshot)?;
    let ticket = winning_ticket(&randomness, secret, snapshot.total_weight)
        .map_err(|_| DrawError::NoWinner)?;
    let ranges: Vec<(u128, u128)> = snapshot
        .entries
        .iter()
        .map(|e| (e.cumulative_start, e.cumulative_end))
        .collect();
    let winner_index = find_winner_index(&ranges, ticket).map_err(|_| DrawError::NoWinner)?;
    let winner = snapshot
        .entries
        .get(winner_index)
        .ok_or(DrawError::NoWinner)?;

    let tree = snapshot.rebuild_tree().map_err(|_| DrawError::NoWinner)?;
    let proof = tree
        .proof(winner_index)
        .map_err(|_| DrawError::NoWinner)?
        .iter()
        .map(hex::encode)
        .collect();

    let msg = DistributorExecuteMsg::RevealDraw {
        draw_id: draw.id,
        operator_secret_hex: secret.to_hex(),
        winner_address: winner.address.clone(),
        winner_cumulative_start: winner.cumulative_start,
        winner_cumulative_end: winner.cumulative_end,
        merkle_proof: proof,
    };

    match execute(distributor_broadcaster, distributor_address, &msg, 0).await {
        Ok(_) => {
            info!(draw_id = draw.id, winner = %winner.address, "revealed draw");
            secrets.remove(draw.id).await?;
            Ok(())
        }
        Err(ChainError::TxRejected(log)) => {
            warn!(draw_id = draw.id, log, "reveal_draw rejected");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn commit_sweep(
    distributor_query: &dyn ChainQuery,
    distributor_broadcaster: &dyn ChainBroadcaster,
    distributor_address: &str,
    oracle_query: &dyn ChainQuery,
    oracle_address: &str,
    hub_query: &dyn ChainQuery,
    staking_hub_address: &str,
    secrets: &SecretStore,
    epoch: u64,
) -> Result<(), DrawError> {
    let epoch_state: EpochStateResponse =
        smart_query(hub_query, staking_hub_address, &StakingHubQueryMsg::EpochState {}).await?;
    if !epoch_state.snapshot_finalized {
        return Ok(());
    }

    let state: DrawStateResponse = smart_query(
        distributor_query,
        distributor_address,
        &DistributorQueryMsg::DrawState {},
    )
    .await?;
    let pools: PoolBalancesResponse = smart_query(
        distributor_query,
        distributor_address,
        &DistributorQueryMsg::PoolBalances {},
    )
    .await?;
    let history: DrawHistoryResponse = smart_query(
        distributor_query,
        distributor_address,
        &DistributorQueryMsg::DrawHistory {
            start_after: None,
            limit: Some(HISTORY_WINDOW),
        },
    )
    .await?;

    let mut next_draw_id = state.next_draw_id;

    for (draw_type, pool, reward) in [
        (DrawType::Regular, pools.regular_pool, pools.regular_reward),
        (DrawType::Big, pools.big_pool, pools.big_reward),
    ] {
        if pool < reward {
            continue;
        }
        let already_committed = history
            .draws
            .iter()
            .any(|d| d.draw_type == draw_type && d.epoch == epoch && d.status == DrawStatus::Committed);
        if already_committed {
            continue;
        }

        let latest: lotto_chain::messages::LatestRoundResponse =
            smart_query(oracle_query, oracle_address, &OracleQueryMsg::LatestRound {}).await?;

        let secret = generate_secret();
        let draw_type_str = match draw_type {
            DrawType::Regular => "regular",
            DrawType::Big => "big",
        };
        let msg = DistributorExecuteMsg::CommitDraw {
            draw_type: draw_type_str.to_owned(),
            operator_commit: commit_of(&secret),
            target_drand_round: latest.round.saturating_add(TARGET_ROUND_LEAD),
            reward_amount: reward,
            epoch,
        };

        match execute(distributor_broadcaster, distributor_address, &msg, 0).await {
            Ok(_) => {
                secrets.insert(next_draw_id, secret).await?;
                info!(draw_id = next_draw_id, draw_type = draw_type_str, "committed draw");
                next_draw_id = next_draw_id.saturating_add(1);
            }
            Err(ChainError::TxRejected(log)) => {
                warn!(draw_type = draw_type_str, log, "commit_draw rejected");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
