//! Hashing and secret-generation primitives shared by every operator loop.
//!
//! The domain-separation bytes used by [`leaf_hash`] and [`node_hash`] are
//! mandatory and must match the on-chain verifier bit-for-bit: `0x00` for
//! leaves, `0x01` for internal nodes.

use rand::RngCore as _;
use sha2::{Digest as _, Sha256};
use sha3::Keccak256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain-separation prefix for a Merkle leaf hash.
const LEAF_DOMAIN: u8 = 0x00;
/// Domain-separation prefix for a Merkle internal-node hash.
const NODE_DOMAIN: u8 = 0x01;

/// A 32-byte commit-reveal secret, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes([u8; 32]);

impl SecretBytes {
    /// Wrap a raw 32-byte secret.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encode the secret, as required by `reveal_draw`'s
    /// `operator_secret_hex` field.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a secret from a hex string, as read back from the pending
    /// secrets file.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or isn't 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidSecretEncoding)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretEncoding)?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes(..)")
    }
}

/// Errors produced by the crypto primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// `winning_ticket` was asked to reduce against a zero weight.
    #[error("total weight is zero, draw cannot proceed")]
    ZeroWeight,
    /// A hex-encoded secret didn't decode to exactly 32 bytes.
    #[error("secret must be a 32-byte hex string")]
    InvalidSecretEncoding,
}

/// SHA-256 of arbitrary bytes.
#[must_use]
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Keccak-256 of arbitrary bytes, used for chain-identity/signing, never
/// for the Merkle tree (which is specified as SHA-256 to match the
/// on-chain verifier).
#[must_use]
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

/// Big-endian, zero-padded 16-byte encoding of a `u128`.
#[must_use]
pub fn be16(value: u128) -> [u8; 16] {
    value.to_be_bytes()
}

/// Generate a cryptographically secure 32-byte commit-reveal secret.
#[must_use]
pub fn generate_secret() -> SecretBytes {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    SecretBytes::new(bytes)
}

/// Hex-encoded SHA-256 commitment to a secret.
#[must_use]
pub fn commit_of(secret: &SecretBytes) -> String {
    hex::encode(sha256(secret.as_bytes()))
}

/// Domain-separated Merkle leaf hash for a snapshot entry.
///
/// `sha256(0x00 ‖ address_utf8 ‖ be16(cum_start) ‖ be16(cum_end))`.
#[must_use]
pub fn leaf_hash(address: &str, cum_start: u128, cum_end: u128) -> [u8; 32] {
    let mut buf = Vec::with_capacity(1 + address.len() + 32);
    buf.push(LEAF_DOMAIN);
    buf.extend_from_slice(address.as_bytes());
    buf.extend_from_slice(&be16(cum_start));
    buf.extend_from_slice(&be16(cum_end));
    sha256(&buf)
}

/// Domain-separated Merkle internal-node hash, combining two children in
/// lexicographic (min, max) order so that sibling order never affects the
/// result.
///
/// `sha256(0x01 ‖ min(a,b) ‖ max(a,b))`.
#[must_use]
pub fn node_hash(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = Vec::with_capacity(1 + 64);
    buf.push(NODE_DOMAIN);
    buf.extend_from_slice(lo);
    buf.extend_from_slice(hi);
    sha256(&buf)
}

/// Reduce beacon randomness and a secret into a weighted-random ticket.
///
/// `final = drand_randomness XOR sha256(secret)`, truncated/aligned to the
/// shorter of the two inputs. The first 16 bytes of `final` are read as a
/// big-endian `u128` and reduced modulo `total_weight`.
///
/// # Errors
/// Returns [`CryptoError::ZeroWeight`] if `total_weight` is zero.
pub fn winning_ticket(
    drand_randomness: &[u8],
    secret: &SecretBytes,
    total_weight: u128,
) -> Result<u128, CryptoError> {
    if total_weight == 0 {
        return Err(CryptoError::ZeroWeight);
    }

    let secret_hash = sha256(secret.as_bytes());
    let len = drand_randomness.len().min(secret_hash.len());

    let folded: Vec<u8> = drand_randomness
        .iter()
        .take(len)
        .zip(secret_hash.iter().take(len))
        .map(|(a, b)| a ^ b)
        .collect();

    let mut v_bytes = [0u8; 16];
    let take = folded.len().min(16);
    #[allow(
        clippy::indexing_slicing,
        reason = "take is bounded by both slice lengths above"
    )]
    v_bytes[..take].copy_from_slice(&folded[..take]);
    let v = u128::from_be_bytes(v_bytes);

    Ok(v % total_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be16_is_big_endian_zero_padded() {
        assert_eq!(be16(0), [0u8; 16]);
        let mut expected = [0u8; 16];
        expected[15] = 1;
        assert_eq!(be16(1), expected);
    }

    #[test]
    fn commit_of_matches_sha256_of_secret() {
        let secret = SecretBytes::new([7u8; 32]);
        let expected = hex::encode(sha256(&[7u8; 32]));
        assert_eq!(commit_of(&secret), expected);
    }

    #[test]
    fn secret_hex_round_trip() {
        let secret = generate_secret();
        let hex = secret.to_hex();
        let parsed = SecretBytes::from_hex(&hex).expect("valid hex");
        assert_eq!(parsed.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn secret_from_hex_rejects_wrong_length() {
        assert_eq!(
            SecretBytes::from_hex("aabb"),
            Err(CryptoError::InvalidSecretEncoding)
        );
    }

    #[test]
    fn node_hash_is_order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(node_hash(&a, &b), node_hash(&b, &a));
    }

    #[test]
    fn domain_separation_changes_leaf_vs_node_hash() {
        // Same payload bytes, only the domain prefix differs.
        let mut leaf_input = vec![LEAF_DOMAIN];
        leaf_input.extend_from_slice(b"addr");
        let mut node_input = vec![NODE_DOMAIN];
        node_input.extend_from_slice(b"addr");
        assert_ne!(sha256(&leaf_input), sha256(&node_input));
    }

    #[test]
    fn winning_ticket_in_range() {
        let secret = SecretBytes::new([1u8; 32]);
        let randomness = [0u8; 32];
        let ticket = winning_ticket(&randomness, &secret, 100).expect("non-zero weight");
        assert!(ticket < 100);
    }

    #[test]
    fn winning_ticket_rejects_zero_weight() {
        let secret = SecretBytes::new([1u8; 32]);
        let randomness = [0u8; 32];
        assert_eq!(
            winning_ticket(&randomness, &secret, 0),
            Err(CryptoError::ZeroWeight)
        );
    }

    #[test]
    fn winning_ticket_is_deterministic() {
        let secret = SecretBytes::new([9u8; 32]);
        let randomness = [42u8; 32];
        let t1 = winning_ticket(&randomness, &secret, 1000).expect("ok");
        let t2 = winning_ticket(&randomness, &secret, 1000).expect("ok");
        assert_eq!(t1, t2);
    }
}
