//! Wire shapes for the three CosmWasm contracts the operator talks to:
//! the drand oracle, the staking hub, and the reward distributor.
//!
//! Each `*ExecuteMsg` serializes to the single-key JSON shape CosmWasm
//! expects (`{variant_name: {fields...}}`), matching §6 of the message
//! catalogue exactly.

use serde::{Deserialize, Serialize};

/// Messages sent to the drand oracle contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleExecuteMsg {
    /// Record a beacon round the operator has observed externally.
    SubmitBeacon {
        /// The beacon round number.
        round: u64,
        /// Hex-encoded BLS signature over the round's randomness.
        signature_hex: String,
    },
}

/// Messages sent to the staking hub contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingHubExecuteMsg {
    /// Close the current epoch and open the next one.
    AdvanceEpoch {},
    /// Commit the current epoch's snapshot Merkle root.
    TakeSnapshot {
        /// Snapshot Merkle root, hex-encoded.
        merkle_root: String,
        /// Sum of all eligible balances in the snapshot.
        total_weight: u128,
        /// Number of eligible holders in the snapshot.
        num_holders: u64,
        /// Off-chain pointer to the full snapshot; unused, always empty.
        snapshot_uri: String,
    },
}

/// Messages sent to the reward distributor contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributorExecuteMsg {
    /// Commit to a secret for an upcoming draw.
    CommitDraw {
        /// Regular or big draw.
        draw_type: String,
        /// Hex-encoded SHA-256 commitment to the operator's secret.
        operator_commit: String,
        /// The beacon round the draw will reveal against.
        target_drand_round: u64,
        /// Reward amount funded into this draw, taken from the
        /// distributor's configured per-draw-type reward.
        reward_amount: u128,
        /// The current epoch.
        epoch: u64,
    },
    /// Reveal a previously committed draw's winner.
    RevealDraw {
        /// The draw being revealed.
        draw_id: u64,
        /// Hex-encoded 32-byte secret matching the stored commitment.
        operator_secret_hex: String,
        /// The winning holder's address.
        winner_address: String,
        /// The winner's cumulative-range start.
        winner_cumulative_start: u128,
        /// The winner's cumulative-range end.
        winner_cumulative_end: u128,
        /// Merkle inclusion proof for the winner's leaf.
        merkle_proof: Vec<String>,
    },
    /// Expire a draw whose reveal deadline has passed.
    ExpireDraw {
        /// The draw being expired.
        draw_id: u64,
    },
}

/// Queries consumed from the drand oracle contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleQueryMsg {
    /// The latest beacon round the oracle has recorded.
    LatestRound {},
    /// A specific beacon round.
    Beacon {
        /// The round to look up.
        round: u64,
    },
}

/// Response to [`OracleQueryMsg::LatestRound`].
#[derive(Debug, Clone, Deserialize)]
pub struct LatestRoundResponse {
    /// The latest recorded round.
    pub round: u64,
}

/// Response to [`OracleQueryMsg::Beacon`]. `None` if the round is unknown.
#[derive(Debug, Clone, Deserialize)]
pub struct BeaconResponse {
    /// The stored round, if present.
    pub round: Option<u64>,
    /// Hex-encoded randomness, if present.
    pub randomness: Option<String>,
}

/// Queries consumed from the staking hub contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingHubQueryMsg {
    /// The current epoch's lifecycle state.
    EpochState {},
    /// Static hub configuration.
    Config {},
    /// A single staker's delegated balance.
    StakerInfo {
        /// The staker's address.
        address: String,
    },
}

/// Response to [`StakingHubQueryMsg::EpochState`].
#[derive(Debug, Clone, Deserialize)]
pub struct EpochStateResponse {
    /// The current epoch number.
    pub epoch: u64,
    /// Unix seconds the current epoch started.
    pub epoch_start_time: u64,
    /// Whether `take_snapshot` has already landed for this epoch.
    pub snapshot_finalized: bool,
}

/// Response to [`StakingHubQueryMsg::Config`].
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfigResponse {
    /// Epoch duration in seconds.
    pub epoch_duration_seconds: u64,
}

/// Queries consumed from the reward distributor contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributorQueryMsg {
    /// The distributor's current draw lifecycle state.
    DrawState {},
    /// Current pool balances available for reward funding.
    PoolBalances {},
    /// A single draw's record.
    Draw {
        /// The draw id to look up.
        draw_id: u64,
    },
    /// A page of historical draws.
    DrawHistory {
        /// Exclusive starting draw id.
        start_after: Option<u64>,
        /// Page size.
        limit: Option<u32>,
    },
}

/// Response to [`DistributorQueryMsg::DrawState`].
#[derive(Debug, Clone, Deserialize)]
pub struct DrawStateResponse {
    /// Id of the currently open (committed but unresolved) draw, if any.
    pub open_draw_id: Option<u64>,
    /// The next draw id the distributor will assign on `commit_draw`.
    pub next_draw_id: u64,
}

/// Response to [`DistributorQueryMsg::PoolBalances`].
#[derive(Debug, Clone, Deserialize)]
pub struct PoolBalancesResponse {
    /// Funds available for the regular draw's reward.
    pub regular_pool: u128,
    /// Configured reward amount for the regular draw.
    pub regular_reward: u128,
    /// Funds available for the big draw's reward.
    pub big_pool: u128,
    /// Configured reward amount for the big draw.
    pub big_reward: u128,
}

/// Response to [`DistributorQueryMsg::Draw`].
#[derive(Debug, Clone, Deserialize)]
pub struct DrawResponse {
    /// The requested draw, if it exists.
    pub draw: Option<lotto_core::DrawRecord>,
}

/// Response to [`DistributorQueryMsg::DrawHistory`]: a page of draws, most
/// recent first.
#[derive(Debug, Clone, Deserialize)]
pub struct DrawHistoryResponse {
    /// The returned draws.
    pub draws: Vec<lotto_core::DrawRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_beacon_serializes_to_single_key_shape() {
        let msg = OracleExecuteMsg::SubmitBeacon {
            round: 42,
            signature_hex: "ab".to_owned(),
        };
        let json = serde_json::to_string(&msg).expect("serializes");
        assert_eq!(json, r#"{"submit_beacon":{"round":42,"signature_hex":"ab"}}"#);
    }

    #[test]
    fn advance_epoch_serializes_with_empty_body() {
        let msg = StakingHubExecuteMsg::AdvanceEpoch {};
        let json = serde_json::to_string(&msg).expect("serializes");
        assert_eq!(json, r#"{"advance_epoch":{}}"#);
    }

    #[test]
    fn commit_draw_serializes_all_fields() {
        let msg = DistributorExecuteMsg::CommitDraw {
            draw_type: "regular".to_owned(),
            operator_commit: "deadbeef".to_owned(),
            target_drand_round: 1010,
            reward_amount: 0,
            epoch: 7,
        };
        let json = serde_json::to_string(&msg).expect("serializes");
        assert!(json.starts_with(r#"{"commit_draw":{"#));
        assert!(json.contains("\"target_drand_round\":1010"));
    }

    #[test]
    fn epoch_state_response_deserializes() {
        let json = r#"{"epoch":3,"epoch_start_time":1000,"snapshot_finalized":false}"#;
        let resp: EpochStateResponse = serde_json::from_str(json).expect("deserializes");
        assert_eq!(resp.epoch, 3);
        assert!(!resp.snapshot_finalized);
    }
}
