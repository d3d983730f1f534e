//! Shared primitives for the staking lottery operator node.
//!
//! This crate holds the pieces that have no external dependency on the
//! chain or the beacon: hashing primitives, the Merkle tree used to commit
//! a snapshot, and the wire-level data model shared by every other crate
//! in the workspace.

pub mod crypto;
pub mod merkle;
pub mod model;

pub use crypto::{
    CryptoError, SecretBytes, be16, commit_of, generate_secret, keccak256, leaf_hash, node_hash,
    sha256, winning_ticket,
};
pub use merkle::{MerkleError, MerkleProof, MerkleTree, find_winner_index};
pub use model::{
    BeaconRound, DenomHolder, DrawRecord, DrawStatus, DrawType, ModelError, Snapshot,
    SnapshotEntry,
};
