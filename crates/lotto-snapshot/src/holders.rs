//! Paginated enumeration of the staking denom's holder set against the
//! chain's bank module.

use async_trait::async_trait;
use lotto_chain::{ChainError, ChainQuery, smart_query};
use lotto_core::DenomHolder;
use serde::{Deserialize, Serialize};

/// One page of the bank module's holder enumeration.
#[derive(Debug, Clone)]
pub struct HolderPage {
    /// Holders returned in this page, in the order the chain returned them.
    pub holders: Vec<DenomHolder>,
    /// Opaque cursor for the next page. An empty or absent key ends
    /// enumeration.
    pub next_key: Option<Vec<u8>>,
}

/// Enumerates holders of a denom, one page at a time.
#[async_trait]
pub trait HolderSource: Send + Sync {
    /// Fetch the page following `next_key` (or the first page if `None`).
    async fn page(&self, denom: &str, next_key: Option<Vec<u8>>) -> Result<HolderPage, ChainError>;
}

#[derive(Debug, Serialize)]
struct DenomOwnersQuery<'a> {
    denom: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DenomOwnersResponse {
    holders: Vec<DenomHolder>,
    next_key: Option<String>,
}

/// Queries the bank module's `DenomOwners` endpoint through a
/// [`ChainQuery`] client.
pub struct BankModuleHolderSource<'a> {
    client: &'a dyn ChainQuery,
    /// Module query path on the chain this client targets; the bank
    /// module itself has no contract address, so this isn't a CosmWasm
    /// contract query but is shaped identically for reuse with
    /// [`smart_query`].
    module_address: String,
}

impl<'a> BankModuleHolderSource<'a> {
    /// Build a holder source against the bank module at `module_address`
    /// (the chain's well-known bank module query route).
    #[must_use]
    pub fn new(client: &'a dyn ChainQuery, module_address: impl Into<String>) -> Self {
        Self {
            client,
            module_address: module_address.into(),
        }
    }
}

#[async_trait]
impl HolderSource for BankModuleHolderSource<'_> {
    async fn page(&self, denom: &str, next_key: Option<Vec<u8>>) -> Result<HolderPage, ChainError> {
        let query = DenomOwnersQuery {
            denom,
            key: next_key.map(hex::encode),
        };
        let response: DenomOwnersResponse =
            smart_query(self.client, &self.module_address, &query).await?;
        let next_key = match response.next_key {
            Some(hex_key) if !hex_key.is_empty() => {
                Some(hex::decode(hex_key).map_err(|e| ChainError::Decoding(e.to_string()))?)
            }
            _ => None,
        };
        Ok(HolderPage {
            holders: response.holders,
            next_key,
        })
    }
}
