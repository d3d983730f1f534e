//! In-memory snapshot cache, published by the epoch controller and
//! consulted by the draw controller on reveal.
//!
//! The cache is also mirrored to disk so a restarted process can recover
//! the entry list for an in-flight draw rather than losing every pending
//! reveal to `StateLoss`. On load, the cached root is re-derived from the
//! entries and compared against the stored root; a mismatch is treated as
//! no cache at all, since a tampered or truncated file is no safer than an
//! empty one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lotto_core::Snapshot;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

/// Errors raised while loading or persisting the snapshot cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file could not be read or written.
    #[error("snapshot cache io: {0}")]
    Io(#[from] std::io::Error),
    /// The cache file's contents were not valid JSON for a [`Snapshot`].
    #[error("snapshot cache decoding: {0}")]
    Decoding(#[from] serde_json::Error),
}

/// Shared handle to the current epoch's snapshot. Single writer (epoch
/// controller), single reader (draw controller), replace-pointer semantics.
#[derive(Clone)]
pub struct SnapshotCache {
    current: Arc<RwLock<Option<Arc<Snapshot>>>>,
    cache_path: PathBuf,
}

impl SnapshotCache {
    /// Build an empty cache backed by `cache_path` for persistence.
    #[must_use]
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            cache_path: cache_path.into(),
        }
    }

    /// Load the cache file, verifying the stored root against a rebuild of
    /// the Merkle tree over the stored entries. A missing file, a decode
    /// failure, or a root mismatch all result in an empty cache rather
    /// than an error: recovery is best-effort, never fatal at startup.
    pub async fn load(&self) {
        match tokio::fs::read(&self.cache_path).await {
            Ok(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
                Ok(snapshot) => match snapshot.rebuild_tree() {
                    Ok(tree) if tree.root() == snapshot.merkle_root => {
                        *self.current.write().await = Some(Arc::new(snapshot));
                    }
                    Ok(_) => warn!("snapshot cache root mismatch on load, discarding"),
                    Err(e) => warn!(error = %e, "snapshot cache rebuild failed on load, discarding"),
                },
                Err(e) => warn!(error = %e, "snapshot cache decode failed on load, discarding"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "snapshot cache read failed on load, discarding"),
        }
    }

    /// Replace the cached snapshot and persist it to disk.
    ///
    /// # Errors
    /// Returns [`CacheError`] if the file write fails.
    pub async fn publish(&self, snapshot: Snapshot) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(&snapshot)?;
        write_atomic(&self.cache_path, &bytes).await?;
        *self.current.write().await = Some(Arc::new(snapshot));
        Ok(())
    }

    /// The currently cached snapshot, if any.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_core::DenomHolder;

    #[tokio::test]
    async fn publish_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SnapshotCache::new(dir.path().join("snapshot_cache.json"));
        assert!(cache.current().await.is_none());

        let snapshot = Snapshot::from_holders(vec![DenomHolder {
            address: "A".to_owned(),
            balance: 100_u64.into(),
        }])
        .expect("builds");
        cache.publish(snapshot.clone()).await.expect("publishes");

        let current = cache.current().await.expect("present");
        assert_eq!(*current, snapshot);
    }

    #[tokio::test]
    async fn load_recovers_published_snapshot_after_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot_cache.json");

        let snapshot = Snapshot::from_holders(vec![DenomHolder {
            address: "A".to_owned(),
            balance: 100_u64.into(),
        }])
        .expect("builds");
        SnapshotCache::new(path.clone())
            .publish(snapshot.clone())
            .await
            .expect("publishes");

        let restarted = SnapshotCache::new(path);
        restarted.load().await;
        let current = restarted.current().await.expect("recovered");
        assert_eq!(*current, snapshot);
    }

    #[tokio::test]
    async fn load_ignores_tampered_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot_cache.json");

        let mut snapshot = Snapshot::from_holders(vec![DenomHolder {
            address: "A".to_owned(),
            balance: 100_u64.into(),
        }])
        .expect("builds");
        snapshot.merkle_root = [0xFF; 32];
        let bytes = serde_json::to_vec(&snapshot).expect("serializes");
        tokio::fs::write(&path, bytes).await.expect("writes");

        let cache = SnapshotCache::new(path);
        cache.load().await;
        assert!(cache.current().await.is_none());
    }

    #[tokio::test]
    async fn load_with_no_file_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SnapshotCache::new(dir.path().join("missing.json"));
        cache.load().await;
        assert!(cache.current().await.is_none());
    }
}
