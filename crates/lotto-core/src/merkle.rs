//! Merkle tree construction, inclusion proofs and winner lookup.
//!
//! Built over already-hashed, already-sorted leaves (sorting and hashing
//! are the snapshot builder's job); this module only knows how to combine
//! 32-byte nodes with [`crate::crypto::node_hash`].

use thiserror::Error;

use crate::crypto::node_hash;

/// Errors raised while building or proving against a Merkle tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    /// The tree was built from zero leaves.
    #[error("snapshot has no eligible holders")]
    EmptySnapshot,
    /// A requested leaf index is out of bounds.
    #[error("leaf index {index} out of bounds for {len} leaves")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of leaves in the tree.
        len: usize,
    },
    /// No cumulative range contains the given ticket.
    #[error("no snapshot entry contains ticket {ticket}")]
    NoWinner {
        /// The ticket that could not be located.
        ticket: u128,
    },
}

/// A built Merkle tree: every level from the leaves up to the root.
///
/// `levels[0]` is the leaf level, `levels.last()` is `[root]`.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

/// An inclusion proof: the sibling hashes encountered on the path from a
/// leaf to the root, in bottom-up order. A missing sibling (the leaf was
/// the odd node promoted unchanged at that level) is simply skipped, not
/// stored as a placeholder.
pub type MerkleProof = Vec<[u8; 32]>;

impl MerkleTree {
    /// Build a tree over an ordered, non-empty sequence of leaf hashes.
    ///
    /// Within a level, adjacent leaves are paired and combined with
    /// [`node_hash`]; a trailing unpaired leaf is promoted unchanged to the
    /// next level rather than duplicated.
    ///
    /// # Errors
    /// Returns [`MerkleError::EmptySnapshot`] if `leaves` is empty.
    pub fn build(leaves: &[[u8; 32]]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptySnapshot);
        }

        let mut levels = vec![leaves.to_vec()];
        #[allow(
            clippy::indexing_slicing,
            reason = "levels always has at least one element, checked above"
        )]
        while levels[levels.len() - 1].len() > 1 {
            #[allow(
                clippy::indexing_slicing,
                reason = "guarded by the loop condition above"
            )]
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut pairs = current.chunks_exact(2);
            for pair in &mut pairs {
                #[allow(clippy::indexing_slicing, reason = "chunks_exact(2) yields len-2 slices")]
                next.push(node_hash(&pair[0], &pair[1]));
            }
            if let [odd] = *pairs.remainder() {
                next.push(odd);
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The Merkle root.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        #[allow(
            clippy::indexing_slicing,
            reason = "build() never leaves `levels` empty"
        )]
        let top = &self.levels[self.levels.len() - 1];
        #[allow(
            clippy::indexing_slicing,
            reason = "the top level always has exactly one element"
        )]
        top[0]
    }

    /// Number of leaves the tree was built from.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        #[allow(clippy::indexing_slicing, reason = "levels[0] is always the leaf level")]
        self.levels[0].len()
    }

    /// Produce the inclusion proof for the leaf at `index`.
    ///
    /// # Errors
    /// Returns [`MerkleError::IndexOutOfBounds`] if `index` is not a valid
    /// leaf index.
    pub fn proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        let len = self.leaf_count();
        if index >= len {
            return Err(MerkleError::IndexOutOfBounds { index, len });
        }

        let mut proof = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_idx = idx ^ 1;
            if let Some(sibling) = level.get(sibling_idx) {
                proof.push(*sibling);
            }
            // When `sibling_idx` is out of range, `idx` was the odd
            // promoted node for this level: no sibling is recorded.
            idx /= 2;
        }

        Ok(proof)
    }

    /// Verify an inclusion proof for `leaf` against `root`, replaying the
    /// same `node_hash(min, max)` combination rule used to build the tree.
    ///
    /// Because [`proof`](Self::proof) omits siblings for odd-promoted
    /// nodes, verification can't tell purely from the proof length whether
    /// a promotion happened partway up; instead it must be driven by the
    /// same per-level leaf counts used at build time. Callers that only
    /// have the proof and the original leaf count can use
    /// [`verify_with_leaf_count`].
    #[must_use]
    pub fn verify(&self, proof: &MerkleProof, leaf: [u8; 32], index: usize, root: [u8; 32]) -> bool {
        verify_with_leaf_count(proof, leaf, index, self.leaf_count(), root)
    }
}

/// Verify an inclusion proof without holding the whole tree, given only the
/// original number of leaves (needed to know, level by level, whether the
/// current node was promoted unchanged or had a sibling).
#[must_use]
pub fn verify_with_leaf_count(
    proof: &MerkleProof,
    leaf: [u8; 32],
    index: usize,
    leaf_count: usize,
    root: [u8; 32],
) -> bool {
    let mut node = leaf;
    let mut idx = index;
    let mut level_len = leaf_count;
    let mut proof_iter = proof.iter();

    while level_len > 1 {
        let sibling_idx = idx ^ 1;
        if sibling_idx < level_len {
            let Some(sibling) = proof_iter.next() else {
                return false;
            };
            node = node_hash(&node, sibling);
        }
        // else: `node` was the odd promoted element, unchanged.
        idx /= 2;
        level_len = level_len.div_ceil(2);
    }

    proof_iter.next().is_none() && node == root
}

/// Locate the snapshot entry whose half-open cumulative range
/// `[cum_start, cum_end)` contains `ticket`.
///
/// `ranges` must be contiguous and ascending, as produced by the snapshot
/// builder. Uses binary search since ranges are sorted.
///
/// # Errors
/// Returns [`MerkleError::NoWinner`] if no range contains `ticket` (only
/// possible if the contiguity invariant has been violated upstream).
pub fn find_winner_index(ranges: &[(u128, u128)], ticket: u128) -> Result<usize, MerkleError> {
    let idx = ranges.partition_point(|&(_, end)| end <= ticket);
    match ranges.get(idx) {
        Some(&(start, end)) if start <= ticket && ticket < end => Ok(idx),
        _ => Err(MerkleError::NoWinner { ticket }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{leaf_hash, sha256};

    fn leaves(n: usize) -> Vec<[u8; 32]> {
        (0..n).map(|i| sha256(&[i as u8])).collect()
    }

    #[test]
    fn build_rejects_empty() {
        assert_eq!(MerkleTree::build(&[]), Err(MerkleError::EmptySnapshot));
    }

    #[test]
    fn single_leaf_snapshot() {
        // S1: single holder, root is the leaf hash itself, empty proof.
        let leaf = leaf_hash("A", 0, 100);
        let tree = MerkleTree::build(&[leaf]).expect("non-empty");
        assert_eq!(tree.root(), leaf);
        let proof = tree.proof(0).expect("valid index");
        assert!(proof.is_empty());
        assert!(tree.verify(&proof, leaf, 0, tree.root()));
    }

    #[test]
    fn two_leaf_snapshot() {
        // S2: two holders, root is node_hash(min, max) of the two leaves.
        let leaf_a = leaf_hash("A", 0, 25);
        let leaf_b = leaf_hash("B", 25, 75);
        let tree = MerkleTree::build(&[leaf_a, leaf_b]).expect("non-empty");
        assert_eq!(tree.root(), node_hash(&leaf_a, &leaf_b));

        let proof_a = tree.proof(0).expect("valid index");
        assert_eq!(proof_a, vec![leaf_b]);
        assert!(tree.verify(&proof_a, leaf_a, 0, tree.root()));
    }

    #[test]
    fn odd_promotion_three_leaves() {
        // S3: three holders. Level 1 = [node(L_A,L_B), L_C]; proof for C
        // carries no sibling at level 0.
        let ls = leaves(3);
        let tree = MerkleTree::build(&ls).expect("non-empty");
        let expected_root = node_hash(&node_hash(&ls[0], &ls[1]), &ls[2]);
        assert_eq!(tree.root(), expected_root);

        let proof_c = tree.proof(2).expect("valid index");
        assert_eq!(proof_c, vec![node_hash(&ls[0], &ls[1])]);
        assert!(tree.verify(&proof_c, ls[2], 2, tree.root()));
    }

    #[test]
    fn every_leaf_proof_verifies() {
        for n in 1..20 {
            let ls = leaves(n);
            let tree = MerkleTree::build(&ls).expect("non-empty");
            for (i, leaf) in ls.iter().enumerate() {
                let proof = tree.proof(i).expect("valid index");
                assert!(
                    tree.verify(&proof, *leaf, i, tree.root()),
                    "failed to verify leaf {i} of {n}"
                );
            }
        }
    }

    #[test]
    fn deterministic_order_independent_of_build_calls() {
        let ls = leaves(5);
        let tree_a = MerkleTree::build(&ls).expect("non-empty");
        let tree_b = MerkleTree::build(&ls).expect("non-empty");
        assert_eq!(tree_a.root(), tree_b.root());
    }

    #[test]
    fn domain_separation_changes_root() {
        let ls = leaves(4);
        let tree = MerkleTree::build(&ls).expect("non-empty");

        // Recompute the root using the leaf domain byte instead of the
        // node domain byte at the internal-node step; root must differ.
        let fake_node_hash = |a: &[u8; 32], b: &[u8; 32]| -> [u8; 32] {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let mut buf = vec![0x00u8]; // wrong domain: leaf prefix
            buf.extend_from_slice(lo);
            buf.extend_from_slice(hi);
            sha256(&buf)
        };
        let wrong_root = fake_node_hash(&fake_node_hash(&ls[0], &ls[1]), &fake_node_hash(&ls[2], &ls[3]));
        assert_ne!(tree.root(), wrong_root);
    }

    #[test]
    fn find_winner_index_basic_ranges() {
        // S4: total_weight=100, A[0,25) B[25,75) C[75,100)
        let ranges = [(0u128, 25u128), (25, 75), (75, 100)];
        assert_eq!(find_winner_index(&ranges, 24), Ok(0));
        assert_eq!(find_winner_index(&ranges, 25), Ok(1));
        assert_eq!(find_winner_index(&ranges, 60), Ok(1));
        assert_eq!(find_winner_index(&ranges, 74), Ok(1));
        assert_eq!(find_winner_index(&ranges, 75), Ok(2));
        assert_eq!(find_winner_index(&ranges, 99), Ok(2));
    }

    #[test]
    fn find_winner_index_boundary_goes_to_next_entry() {
        let ranges = [(0u128, 50u128), (50, 100)];
        // t == cum_end[0] must resolve to the next entry, not the current one.
        assert_eq!(find_winner_index(&ranges, 50), Ok(1));
    }

    #[test]
    fn find_winner_index_out_of_range() {
        let ranges = [(0u128, 10u128)];
        assert_eq!(
            find_winner_index(&ranges, 10),
            Err(MerkleError::NoWinner { ticket: 10 })
        );
    }

    #[test]
    fn proof_index_out_of_bounds() {
        let ls = leaves(3);
        let tree = MerkleTree::build(&ls).expect("non-empty");
        assert_eq!(
            tree.proof(3),
            Err(MerkleError::IndexOutOfBounds { index: 3, len: 3 })
        );
    }
}
