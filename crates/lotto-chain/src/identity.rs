//! The operator's signing identity: derived once at startup, read-only
//! thereafter, shared across every control loop.

use bech32::{Bech32, Hrp};
use bip32::{DerivationPath, XPrv};
use k256::ecdsa::signature::hazmat::PrehashSigner as _;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use lotto_core::keccak256;
use secrecy::{ExposeSecret as _, SecretBox};
use thiserror::Error;

/// Derivation path used for the operator's single signing account.
/// Coin type 60 (Ethereum) matches Injective's `eth_secp256k1` accounts.
const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Bech32 human-readable part for Injective-style addresses.
const ADDRESS_HRP: &str = "inj";

/// Errors raised while deriving or using the operator identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The mnemonic failed BIP-39 validation.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    /// Key derivation along [`DERIVATION_PATH`] failed.
    #[error("key derivation failed: {0}")]
    Derivation(String),
    /// Bech32 address encoding failed.
    #[error("address encoding failed: {0}")]
    AddressEncoding(String),
}

/// The process-wide signing identity: private key, derived address, derived
/// public key, and chain id. Initialized once at startup from a mnemonic;
/// never mutated afterward.
pub struct OperatorIdentity {
    signing_key: SecretBox<SigningKey>,
    verifying_key: VerifyingKey,
    address: String,
    chain_id: String,
}

impl OperatorIdentity {
    /// Derive the operator identity from a BIP-39 mnemonic and a chain id.
    ///
    /// # Errors
    /// Returns [`IdentityError`] if the mnemonic is invalid or key
    /// derivation fails.
    pub fn from_mnemonic(mnemonic: &str, chain_id: impl Into<String>) -> Result<Self, IdentityError> {
        let mnemonic = bip39::Mnemonic::parse_normalized(mnemonic)
            .map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))?;
        let seed = mnemonic.to_seed("");

        let path: DerivationPath = DERIVATION_PATH
            .parse()
            .map_err(|e: bip32::Error| IdentityError::Derivation(e.to_string()))?;
        let xprv = XPrv::derive_from_path(seed, &path)
            .map_err(|e| IdentityError::Derivation(e.to_string()))?;
        let signing_key: SigningKey = xprv.private_key().clone();
        let verifying_key = *signing_key.verifying_key();

        let address = derive_address(&verifying_key)?;

        Ok(Self {
            signing_key: SecretBox::new(Box::new(signing_key)),
            verifying_key,
            address,
            chain_id: chain_id.into(),
        })
    }

    /// The operator's bech32 address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The chain id this identity signs for.
    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// The operator's uncompressed public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.verifying_key
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Sign a pre-hashed (Keccak-256) message, as required by Injective's
    /// `eth_secp256k1` account type (§6: "Signature is Keccak-based ECDSA
    /// on the canonical sign-bytes produced by the chain SDK").
    ///
    /// # Errors
    /// Returns [`IdentityError`] if the underlying ECDSA signer rejects the
    /// digest (only possible for a malformed digest length).
    pub fn sign_prehashed(&self, digest: &[u8; 32]) -> Result<Signature, IdentityError> {
        self.signing_key
            .expose_secret()
            .sign_prehash(digest)
            .map_err(|e| IdentityError::Derivation(e.to_string()))
    }

    /// Sign arbitrary sign-bytes by first Keccak-256 hashing them.
    ///
    /// # Errors
    /// Returns [`IdentityError`] if signing fails.
    pub fn sign(&self, sign_bytes: &[u8]) -> Result<Signature, IdentityError> {
        self.sign_prehashed(&keccak256(sign_bytes))
    }
}

impl std::fmt::Debug for OperatorIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorIdentity")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// Derive an Injective/Ethermint-style address: the last 20 bytes of the
/// Keccak-256 hash of the uncompressed public key (sans the `0x04` prefix),
/// bech32-encoded with the `inj` human-readable part.
fn derive_address(verifying_key: &VerifyingKey) -> Result<String, IdentityError> {
    let uncompressed = verifying_key.to_encoded_point(false);
    let pubkey_bytes = uncompressed.as_bytes();
    // Drop the leading 0x04 tag byte.
    let xy = pubkey_bytes.get(1..).ok_or_else(|| {
        IdentityError::AddressEncoding("public key point is too short".to_owned())
    })?;
    let hash = keccak256(xy);
    let tail = hash.get(12..).ok_or_else(|| {
        IdentityError::AddressEncoding("keccak digest is too short".to_owned())
    })?;

    let hrp = Hrp::parse(ADDRESS_HRP)
        .map_err(|e| IdentityError::AddressEncoding(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, tail).map_err(|e| IdentityError::AddressEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn derives_stable_address_from_mnemonic() {
        let id1 = OperatorIdentity::from_mnemonic(TEST_MNEMONIC, "injective-888").expect("derives");
        let id2 = OperatorIdentity::from_mnemonic(TEST_MNEMONIC, "injective-888").expect("derives");
        assert_eq!(id1.address(), id2.address());
        assert!(id1.address().starts_with("inj1"));
    }

    #[test]
    fn different_mnemonics_derive_different_addresses() {
        let id1 = OperatorIdentity::from_mnemonic(TEST_MNEMONIC, "injective-888").expect("derives");
        let other = "legal winner thank year wave sausage worth useful legal winner thank yellow";
        let id2 = OperatorIdentity::from_mnemonic(other, "injective-888").expect("derives");
        assert_ne!(id1.address(), id2.address());
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let result = OperatorIdentity::from_mnemonic("not a valid mnemonic at all", "injective-888");
        assert!(result.is_err());
    }

    #[test]
    fn signing_is_deterministic_for_same_input() {
        let identity = OperatorIdentity::from_mnemonic(TEST_MNEMONIC, "injective-888").expect("derives");
        let sig1 = identity.sign(b"hello").expect("signs");
        let sig2 = identity.sign(b"hello").expect("signs");
        assert_eq!(sig1.to_bytes(), sig2.to_bytes());
    }

    #[test]
    fn chain_id_is_preserved() {
        let identity = OperatorIdentity::from_mnemonic(TEST_MNEMONIC, "injective-1").expect("derives");
        assert_eq!(identity.chain_id(), "injective-1");
    }
}
