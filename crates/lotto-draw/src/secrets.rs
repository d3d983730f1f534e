//! Persisted map of `draw_id -> secret`, the single source of truth for
//! in-flight commit-reveal secrets across restarts.
//!
//! A secret exists here exactly between a successful `commit_draw` write
//! and either a successful `reveal_draw` or `expire_draw` write for that
//! id. The file is fully rewritten on every change; a torn write on crash
//! is acceptable (§6) because the only draws affected are ones that will
//! expire and refund on chain regardless.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lotto_core::SecretBytes;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised while loading or persisting the secrets file.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// The file could not be read or written.
    #[error("secrets file io: {0}")]
    Io(#[from] std::io::Error),
    /// The file's contents were not valid JSON for the secrets map.
    #[error("secrets file decoding: {0}")]
    Decoding(#[from] serde_json::Error),
    /// A stored secret's hex encoding was invalid.
    #[error("stored secret decoding: {0}")]
    SecretHex(#[from] lotto_core::CryptoError),
}

/// The process's pending-secrets store. Single writer, guarded by an
/// internal lock so concurrent draw-loop calls (there should only ever be
/// one) serialize their rewrites.
pub struct SecretStore {
    path: PathBuf,
    secrets: Mutex<HashMap<u64, SecretBytes>>,
}

impl SecretStore {
    /// Load the store from `path`, or start empty if the file is absent.
    ///
    /// # Errors
    /// Returns [`SecretsError`] if the file exists but is unreadable or
    /// malformed.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, SecretsError> {
        let path = path.into();
        let secrets = match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            secrets: Mutex::new(secrets),
        })
    }

    /// The secret for `draw_id`, if one is pending.
    pub async fn get(&self, draw_id: u64) -> Option<SecretBytes> {
        self.secrets.lock().await.get(&draw_id).cloned()
    }

    /// Record a freshly committed secret and persist immediately.
    ///
    /// # Errors
    /// Returns [`SecretsError`] if the rewrite fails.
    pub async fn insert(&self, draw_id: u64, secret: SecretBytes) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.lock().await;
        secrets.insert(draw_id, secret);
        persist(&self.path, &secrets).await
    }

    /// Remove the secret for `draw_id` (after a successful reveal or
    /// expire) and persist immediately. A no-op if absent.
    ///
    /// # Errors
    /// Returns [`SecretsError`] if the rewrite fails.
    pub async fn remove(&self, draw_id: u64) -> Result<(), SecretsError> {
        let mut secrets = self.secrets.lock().await;
        if secrets.remove(&draw_id).is_none() {
            return Ok(());
        }
        persist(&self.path, &secrets).await
    }
}

fn decode(bytes: &[u8]) -> Result<HashMap<u64, SecretBytes>, SecretsError> {
    let raw: HashMap<String, String> = serde_json::from_slice(bytes)?;
    raw.into_iter()
        .map(|(id, hex_secret)| {
            let id: u64 = id
                .parse()
                .map_err(|_| SecretsError::Decoding(serde::de::Error::custom("invalid draw id")))?;
            Ok((id, SecretBytes::from_hex(&hex_secret)?))
        })
        .collect()
}

async fn persist(path: &Path, secrets: &HashMap<u64, SecretBytes>) -> Result<(), SecretsError> {
    let raw: HashMap<String, String> = secrets
        .iter()
        .map(|(id, secret)| (id.to_string(), secret.to_hex()))
        .collect();
    let bytes = serde_json::to_vec(&raw)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_core::generate_secret;

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SecretStore::load(dir.path().join("secrets.json"))
            .await
            .expect("loads empty");

        let secret = generate_secret();
        store.insert(7, secret.clone()).await.expect("inserts");
        let fetched = store.get(7).await.expect("present");
        assert_eq!(fetched.as_bytes(), secret.as_bytes());

        store.remove(7).await.expect("removes");
        assert!(store.get(7).await.is_none());
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("secrets.json");

        let secret = generate_secret();
        {
            let store = SecretStore::load(&path).await.expect("loads empty");
            store.insert(1, secret.clone()).await.expect("inserts");
        }

        let reloaded = SecretStore::load(&path).await.expect("loads");
        let fetched = reloaded.get(1).await.expect("present");
        assert_eq!(fetched.as_bytes(), secret.as_bytes());
    }

    #[tokio::test]
    async fn removing_absent_secret_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SecretStore::load(dir.path().join("secrets.json"))
            .await
            .expect("loads empty");
        store.remove(99).await.expect("no-op succeeds");
    }
}
