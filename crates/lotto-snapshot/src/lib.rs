//! Builds a verifiable [`lotto_core::Snapshot`] from the chain's live
//! holder set: paginated enumeration, an optional eligibility filter, and
//! deterministic cumulative-weight layout.

pub mod eligibility;
pub mod holders;

pub use eligibility::{AlwaysEligible, EligibilityFilter, StakeEpochFilter};
pub use holders::{BankModuleHolderSource, HolderPage, HolderSource};

use lotto_core::{DenomHolder, ModelError, Snapshot};
use thiserror::Error;
use tracing::debug;

/// Errors raised while assembling a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The underlying holder enumeration failed.
    #[error("holder enumeration failed: {0}")]
    Source(#[from] lotto_chain::ChainError),
    /// The eligibility filter itself failed (e.g. a stake-epoch query).
    #[error("eligibility filter failed: {0}")]
    Eligibility(String),
    /// No holders survived filtering, or balances didn't fit the model.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Enumerate every holder via `source`, keep only those `filter` accepts,
/// and build the resulting [`Snapshot`].
///
/// Pagination continues until `source` returns an empty next-key, matching
/// the chain's own termination convention for cursor-based enumeration.
///
/// # Errors
/// Returns [`SnapshotError`] if enumeration, filtering, or snapshot
/// construction fails.
pub async fn build_snapshot(
    source: &dyn HolderSource,
    filter: &dyn EligibilityFilter,
    denom: &str,
) -> Result<Snapshot, SnapshotError> {
    let mut holders: Vec<DenomHolder> = Vec::new();
    let mut next_key: Option<Vec<u8>> = None;

    loop {
        let page = source.page(denom, next_key.clone()).await?;
        for holder in page.holders {
            if filter.is_eligible(&holder).await? {
                holders.push(holder);
            }
        }
        match page.next_key {
            Some(key) if !key.is_empty() => next_key = Some(key),
            _ => break,
        }
    }

    debug!(eligible_holders = holders.len(), "snapshot enumeration complete");
    Ok(Snapshot::from_holders(holders)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakePages {
        pages: Mutex<Vec<HolderPage>>,
    }

    #[async_trait]
    impl HolderSource for FakePages {
        async fn page(
            &self,
            _denom: &str,
            _next_key: Option<Vec<u8>>,
        ) -> Result<HolderPage, lotto_chain::ChainError> {
            let mut pages = self.pages.lock().expect("not poisoned");
            Ok(pages.remove(0))
        }
    }

    fn holder(address: &str, balance: u64) -> DenomHolder {
        DenomHolder {
            address: address.to_owned(),
            balance: balance.into(),
        }
    }

    #[tokio::test]
    async fn paginates_until_empty_next_key() {
        let source = FakePages {
            pages: Mutex::new(vec![
                HolderPage {
                    holders: vec![holder("A", 10)],
                    next_key: Some(vec![1]),
                },
                HolderPage {
                    holders: vec![holder("B", 20)],
                    next_key: None,
                },
            ]),
        };

        let snapshot = build_snapshot(&source, &AlwaysEligible, "inj")
            .await
            .expect("builds");
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.total_weight, 30);
    }

    #[tokio::test]
    async fn empty_enumeration_is_an_error() {
        let source = FakePages {
            pages: Mutex::new(vec![HolderPage {
                holders: vec![],
                next_key: None,
            }]),
        };
        let result = build_snapshot(&source, &AlwaysEligible, "inj").await;
        assert!(matches!(result, Err(SnapshotError::Model(ModelError::NoEligibleHolders))));
    }
}
