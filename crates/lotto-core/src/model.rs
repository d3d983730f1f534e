//! Wire-level data model shared across the operator's control loops.
//!
//! Balances arrive from the chain as arbitrary-precision decimal strings
//! (`DenomHolder`); once sorted and filtered they are folded into
//! cumulative `u128` ranges, which is the width the on-chain Merkle
//! verifier and the ticket-reduction scheme (§C1) are specified over.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use thiserror::Error;

use crate::crypto::leaf_hash;
use crate::merkle::{MerkleError, MerkleTree};

/// A single token holder as read from the bank module, before filtering.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomHolder {
    /// The holder's bech32 address.
    pub address: String,
    /// The holder's balance, arbitrary precision, decimal at the wire
    /// boundary.
    #[serde_as(as = "DisplayFromStr")]
    pub balance: BigUint,
}

/// One eligible holder's position in the snapshot's cumulative range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The holder's address.
    pub address: String,
    /// The holder's balance (fits in `u128`; see [`ModelError::BalanceTooLarge`]).
    pub balance: u128,
    /// Inclusive start of this holder's cumulative range.
    pub cumulative_start: u128,
    /// Exclusive end of this holder's cumulative range
    /// (`cumulative_start + balance`).
    pub cumulative_end: u128,
}

impl SnapshotEntry {
    /// This entry's Merkle leaf hash.
    #[must_use]
    pub fn leaf(&self) -> [u8; 32] {
        leaf_hash(&self.address, self.cumulative_start, self.cumulative_end)
    }
}

/// A built snapshot: the full ordered holder list, its Merkle root, and the
/// total weight (`== entries.last().cumulative_end`).
///
/// Held in memory for the epoch that produced it; consumed by the draw
/// controller on reveal to locate the winner and build an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Eligible holders, ascending by address, cumulative ranges contiguous.
    pub entries: Vec<SnapshotEntry>,
    /// Merkle root committed on-chain via `take_snapshot`.
    pub merkle_root: [u8; 32],
    /// Sum of all included balances.
    pub total_weight: u128,
}

/// Errors that can occur while turning a holder list into a [`Snapshot`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// No holders remained after dropping zero balances.
    #[error("snapshot has no eligible holders")]
    NoEligibleHolders,
    /// A holder's balance (or the running cumulative total) doesn't fit in
    /// the `u128` width the hashing scheme is specified over.
    #[error("balance for {address} does not fit in 128 bits")]
    BalanceTooLarge {
        /// The offending holder's address.
        address: String,
    },
    /// The underlying Merkle build failed (only possible if the input was
    /// empty, which [`NoEligibleHolders`](Self::NoEligibleHolders) should
    /// have already caught).
    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

impl Snapshot {
    /// Build a snapshot from a holder multiset: drop zero balances, sort
    /// ascending by address (byte-wise lexicographic, matching
    /// [`crate::crypto::node_hash`]'s ordering rule), assign contiguous
    /// cumulative ranges, and build the Merkle tree over the resulting
    /// leaves.
    ///
    /// Deterministic: the output depends only on the multiset of eligible
    /// holders, never on the input order.
    ///
    /// # Errors
    /// Returns [`ModelError::NoEligibleHolders`] if every holder has a zero
    /// balance, or [`ModelError::BalanceTooLarge`] if a balance (or the
    /// running total) overflows `u128`.
    pub fn from_holders(holders: Vec<DenomHolder>) -> Result<Self, ModelError> {
        let zero = BigUint::from(0_u32);
        let mut holders: Vec<DenomHolder> = holders
            .into_iter()
            .filter(|h| h.balance > zero)
            .collect();
        holders.sort_by(|a, b| a.address.as_bytes().cmp(b.address.as_bytes()));

        if holders.is_empty() {
            return Err(ModelError::NoEligibleHolders);
        }

        let mut entries = Vec::with_capacity(holders.len());
        let mut cursor: u128 = 0;
        for holder in holders {
            let balance =
                biguint_to_u128(&holder.balance).ok_or_else(|| ModelError::BalanceTooLarge {
                    address: holder.address.clone(),
                })?;
            let end = cursor
                .checked_add(balance)
                .ok_or_else(|| ModelError::BalanceTooLarge {
                    address: holder.address.clone(),
                })?;
            entries.push(SnapshotEntry {
                address: holder.address,
                balance,
                cumulative_start: cursor,
                cumulative_end: end,
            });
            cursor = end;
        }

        let leaves: Vec<[u8; 32]> = entries.iter().map(SnapshotEntry::leaf).collect();
        let tree = MerkleTree::build(&leaves)?;

        Ok(Self {
            merkle_root: tree.root(),
            total_weight: cursor,
            entries,
        })
    }

    /// Rebuild the Merkle tree over this snapshot's entries, e.g. to
    /// produce an inclusion proof at reveal time.
    ///
    /// # Errors
    /// Returns [`MerkleError::EmptySnapshot`] only if `entries` is empty,
    /// which a validly-constructed `Snapshot` never is.
    pub fn rebuild_tree(&self) -> Result<MerkleTree, MerkleError> {
        let leaves: Vec<[u8; 32]> = self.entries.iter().map(SnapshotEntry::leaf).collect();
        MerkleTree::build(&leaves)
    }
}

/// Convert a [`BigUint`] to `u128`, returning `None` if it doesn't fit.
fn biguint_to_u128(n: &BigUint) -> Option<u128> {
    let bytes = n.to_bytes_be();
    if bytes.len() > 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    let offset = 16 - bytes.len();
    #[allow(
        clippy::indexing_slicing,
        reason = "offset computed from bytes.len() <= 16 above"
    )]
    buf[offset..].copy_from_slice(&bytes);
    Some(u128::from_be_bytes(buf))
}

/// Which lottery this draw is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawType {
    /// The regular, lower-reward draw.
    Regular,
    /// The big, higher-reward draw.
    Big,
}

/// The draw's lifecycle state, as observed on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    /// `commit_draw` has landed; waiting on the target beacon round.
    Committed,
    /// `reveal_draw` has landed; terminal.
    Revealed,
    /// `expire_draw` has landed; terminal.
    Expired,
}

/// A draw as read from chain. The node never owns this state; it only
/// holds short-lived read copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    /// The draw's on-chain identifier.
    pub id: u64,
    /// Regular or big.
    pub draw_type: DrawType,
    /// The epoch this draw was committed in.
    pub epoch: u64,
    /// Lifecycle status.
    pub status: DrawStatus,
    /// Hex-encoded SHA-256 commitment to the operator's secret.
    pub operator_commit: String,
    /// The beacon round whose randomness this draw reveals against.
    pub target_drand_round: u64,
    /// Nanosecond unix timestamp after which the draw may be expired.
    pub reveal_deadline_ns: u128,
}

/// A beacon round as read from the external service or the on-chain oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconRound {
    /// Monotonic round number.
    pub round: u64,
    /// The round's randomness.
    pub randomness: Vec<u8>,
    /// The round's BLS signature over the randomness.
    pub signature: Vec<u8>,
}
