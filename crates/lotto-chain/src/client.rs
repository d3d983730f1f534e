//! The chain client: read-only ABCI queries plus serialized, signed writes.
//!
//! Writes are funneled through a single-slot FIFO mutex
//! ([`tokio::sync::Mutex`] is strictly fair: waiters are woken in arrival
//! order). The lock is held across the entire
//! fetch-account-sequence/sign/broadcast window, so the account sequence
//! read by one write can never be raced by another (§5, "the single
//! strongest concurrency invariant of the system").
//!
//! Every RPC round-trip (queries and broadcasts alike) goes through
//! [`crate::retry::retry_with_backoff`]; only transport-level failures are
//! retried, a rejected query or transaction is returned immediately.

use cosmrs::proto::cosmos::auth::v1beta1::{BaseAccount, QueryAccountRequest, QueryAccountResponse};
use cosmrs::proto::cosmos::base::v1beta1::Coin as ProtoCoin;
use cosmrs::proto::cosmos::crypto::secp256k1::PubKey as Secp256k1PubKeyProto;
use cosmrs::proto::cosmos::distribution::v1beta1::{
    MsgWithdrawDelegatorReward, QueryDelegationTotalRewardsRequest,
    QueryDelegationTotalRewardsResponse,
};
use cosmrs::proto::cosmos::tx::signing::v1beta1::SignMode;
use cosmrs::proto::cosmos::tx::v1beta1::mode_info::{Single, Sum};
use cosmrs::proto::cosmos::tx::v1beta1::{
    AuthInfo, Fee as ProtoFee, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw,
};
use cosmrs::proto::cosmwasm::wasm::v1::{
    MsgExecuteContract, QuerySmartContractStateRequest, QuerySmartContractStateResponse,
};
use cosmrs::proto::prost::Message as _;
use cosmrs::proto::prost_types::Any;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tendermint_rpc::endpoint::abci_query::AbciQuery;
use tendermint_rpc::{Client as _, HttpClient};
use tokio::sync::Mutex;
use tracing::debug;

/// Cosmos SDK `Dec` fixed-point precision: amounts in `DecCoin` are integers
/// scaled by `10^18`.
const DEC_PRECISION: u32 = 18;

use crate::error::ChainError;
use crate::identity::OperatorIdentity;
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Memo is always empty, bit-exact with the target chain's operator (§6).
const MEMO: &str = "";
/// Flat fee, in the native denom's smallest unit.
const FEE_AMOUNT: u128 = 1_500_000_000_000_000;
/// Native fee denom.
const FEE_DENOM: &str = "inj";
/// Flat gas limit.
const GAS_LIMIT: u64 = 3_800_000;
/// Injective's custom pubkey type, used in `AuthInfo` so the chain decodes
/// the signature as Keccak-based `eth_secp256k1` rather than the default
/// SHA-256 `secp256k1` scheme.
const ETHSECP256K1_PUBKEY_TYPE_URL: &str = "/injective.crypto.v1beta1.ethsecp256k1.PubKey";

/// Read-only chain access, implemented by [`ChainClient`] and by test fakes.
///
/// Takes and returns raw JSON bytes rather than being generic over the
/// message type, so the trait stays object-safe: callers reach for the
/// [`smart_query`] helper instead of calling this directly.
#[async_trait::async_trait]
pub trait ChainQuery: Send + Sync {
    /// Run a CosmWasm smart-query against `contract`, returning the raw
    /// JSON response.
    async fn smart_query_raw(&self, contract: &str, query_json: Vec<u8>) -> Result<Vec<u8>, ChainError>;
}

/// Signed, serialized writes against the chain, implemented by
/// [`ChainClient`] and by test fakes.
///
/// Takes raw JSON bytes for the same reason [`ChainQuery`] does; use the
/// [`execute`] helper.
#[async_trait::async_trait]
pub trait ChainBroadcaster: Send + Sync {
    /// Execute a CosmWasm message against `contract`, funded with `funds`
    /// of the native denom (usually zero), returning the tx hash.
    async fn execute_raw(
        &self,
        contract: &str,
        msg_json: Vec<u8>,
        funds: u128,
    ) -> Result<String, ChainError>;
}

/// Serialize `query`, run it through `client`, and decode the response as
/// `R`.
///
/// # Errors
/// Propagates [`ChainError`] from serialization, the query itself, or
/// response decoding.
pub async fn smart_query<Q, R>(
    client: &dyn ChainQuery,
    contract: &str,
    query: &Q,
) -> Result<R, ChainError>
where
    Q: Serialize + Sync,
    R: DeserializeOwned,
{
    let query_json = serde_json::to_vec(query).map_err(|e| ChainError::Build(e.to_string()))?;
    let response = client.smart_query_raw(contract, query_json).await?;
    serde_json::from_slice(&response).map_err(|e| ChainError::Decoding(e.to_string()))
}

/// Serialize `msg` and submit it through `client`.
///
/// # Errors
/// Propagates [`ChainError`] from serialization or the broadcast itself.
pub async fn execute<M>(
    client: &dyn ChainBroadcaster,
    contract: &str,
    msg: &M,
    funds: u128,
) -> Result<String, ChainError>
where
    M: Serialize + Sync,
{
    let msg_json = serde_json::to_vec(msg).map_err(|e| ChainError::Build(e.to_string()))?;
    client.execute_raw(contract, msg_json, funds).await
}

/// RPC-backed implementation of [`ChainQuery`] and [`ChainBroadcaster`].
pub struct ChainClient {
    rpc: HttpClient,
    identity: OperatorIdentity,
    /// Single-slot FIFO write lock; see module docs.
    write_lock: Mutex<()>,
    retry_policy: RetryPolicy,
}

impl ChainClient {
    /// Build a client against `rpc_url`, signing writes with `identity`.
    ///
    /// # Errors
    /// Returns [`ChainError::Transport`] if the RPC URL cannot be parsed
    /// into a client.
    pub fn new(rpc_url: &str, identity: OperatorIdentity) -> Result<Self, ChainError> {
        let rpc = HttpClient::new(rpc_url).map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            rpc,
            identity,
            write_lock: Mutex::new(()),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// The operator's address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.identity.address()
    }

    async fn abci_query(&self, path: &str, data: Vec<u8>) -> Result<AbciQuery, ChainError> {
        let response = retry_with_backoff(&self.retry_policy, || async {
            self.rpc
                .abci_query(Some(path.to_owned()), data.clone(), None, false)
                .await
                .map_err(|e| ChainError::Transport(e.to_string()))
        })
        .await?;
        if response.code.is_err() {
            return Err(ChainError::QueryRejected {
                code: response.code.value(),
                log: response.log.to_string(),
            });
        }
        Ok(response)
    }

    async fn fetch_account(&self) -> Result<BaseAccount, ChainError> {
        let request = QueryAccountRequest {
            address: self.identity.address().to_owned(),
        };
        let response = self
            .abci_query(
                "/cosmos.auth.v1beta1.Query/Account",
                request.encode_to_vec(),
            )
            .await?;
        let decoded = QueryAccountResponse::decode(response.value.as_slice())
            .map_err(|e| ChainError::Decoding(e.to_string()))?;
        let any = decoded
            .account
            .ok_or_else(|| ChainError::Decoding("account not found".to_owned()))?;
        BaseAccount::decode(any.value.as_slice()).map_err(|e| ChainError::Decoding(e.to_string()))
    }

    fn build_tx_raw(
        &self,
        messages: Vec<Any>,
        account_number: u64,
        sequence: u64,
    ) -> Result<Vec<u8>, ChainError> {
        let body = TxBody {
            messages,
            memo: MEMO.to_owned(),
            timeout_height: 0,
            extension_options: Vec::new(),
            non_critical_extension_options: Vec::new(),
        };
        let body_bytes = body.encode_to_vec();

        let pubkey_any = Any {
            type_url: ETHSECP256K1_PUBKEY_TYPE_URL.to_owned(),
            value: Secp256k1PubKeyProto {
                key: self.identity.public_key_bytes(),
            }
            .encode_to_vec(),
        };
        let signer_info = SignerInfo {
            public_key: Some(pubkey_any),
            mode_info: Some(ModeInfo {
                sum: Some(Sum::Single(Single {
                    mode: SignMode::Direct.into(),
                })),
            }),
            sequence,
        };
        let auth_info = AuthInfo {
            signer_infos: vec![signer_info],
            fee: Some(ProtoFee {
                amount: vec![ProtoCoin {
                    denom: FEE_DENOM.to_owned(),
                    amount: FEE_AMOUNT.to_string(),
                }],
                gas_limit: GAS_LIMIT,
                payer: String::new(),
                granter: String::new(),
            }),
            tip: None,
        };
        let auth_info_bytes = auth_info.encode_to_vec();

        let sign_doc = SignDoc {
            body_bytes: body_bytes.clone(),
            auth_info_bytes: auth_info_bytes.clone(),
            chain_id: self.identity.chain_id().to_owned(),
            account_number,
        };
        let sign_doc_bytes = sign_doc.encode_to_vec();

        let signature = self
            .identity
            .sign(&sign_doc_bytes)
            .map_err(|e| ChainError::Build(e.to_string()))?;

        let tx_raw = TxRaw {
            body_bytes,
            auth_info_bytes,
            signatures: vec![signature.to_bytes().to_vec()],
        };
        Ok(tx_raw.encode_to_vec())
    }

    async fn broadcast_locked(&self, messages: Vec<Any>) -> Result<String, ChainError> {
        let _guard = self.write_lock.lock().await;

        let account = self.fetch_account().await?;
        let tx_bytes = self.build_tx_raw(messages, account.account_number, account.sequence)?;

        let response = retry_with_backoff(&self.retry_policy, || async {
            self.rpc
                .broadcast_tx_sync(tx_bytes.clone())
                .await
                .map_err(|e| ChainError::Transport(e.to_string()))
        })
        .await?;
        if response.code.is_err() {
            return Err(ChainError::TxRejected(response.log.to_string()));
        }
        let txhash = response.hash.to_string();
        debug!(txhash, "broadcast accepted");
        Ok(txhash)
    }

    /// Sum of this operator's unwithdrawn delegation rewards across all
    /// validators, in the fee denom's smallest unit (integer, truncated
    /// down from the chain's 18-decimal `Dec` representation).
    ///
    /// # Errors
    /// Returns [`ChainError`] on transport or decode failure.
    pub async fn delegation_total_rewards(&self) -> Result<u128, ChainError> {
        let request = QueryDelegationTotalRewardsRequest {
            delegator_address: self.identity.address().to_owned(),
        };
        let response = self
            .abci_query(
                "/cosmos.distribution.v1beta1.Query/DelegationTotalRewards",
                request.encode_to_vec(),
            )
            .await?;
        let decoded = QueryDelegationTotalRewardsResponse::decode(response.value.as_slice())
            .map_err(|e| ChainError::Decoding(e.to_string()))?;

        decoded
            .total
            .into_iter()
            .filter(|coin| coin.denom == FEE_DENOM)
            .try_fold(0_u128, |acc, coin| {
                let truncated = dec_string_to_u128(&coin.amount)
                    .ok_or_else(|| ChainError::Decoding(format!("bad dec amount: {}", coin.amount)))?;
                Ok(acc.saturating_add(truncated))
            })
    }

    /// Withdraw this operator's pending delegation rewards from every
    /// validator in `validators` in a single transaction.
    ///
    /// # Errors
    /// Returns [`ChainError`] if the broadcast fails or is rejected.
    pub async fn withdraw_delegator_rewards(
        &self,
        validators: &[String],
    ) -> Result<String, ChainError> {
        let messages = validators
            .iter()
            .map(|validator_address| Any {
                type_url: "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward".to_owned(),
                value: MsgWithdrawDelegatorReward {
                    delegator_address: self.identity.address().to_owned(),
                    validator_address: validator_address.clone(),
                }
                .encode_to_vec(),
            })
            .collect();
        self.broadcast_locked(messages).await
    }
}

/// Truncate a Cosmos SDK `Dec` string (an integer scaled by `10^18`) down to
/// a plain integer amount, discarding the fractional part.
fn dec_string_to_u128(dec: &str) -> Option<u128> {
    if dec.is_empty() {
        return Some(0);
    }
    let precision = usize::try_from(DEC_PRECISION).ok()?;
    let Some(whole_digits) = dec.len().checked_sub(precision) else {
        return Some(0);
    };
    if whole_digits == 0 {
        return Some(0);
    }
    let integer_part = dec.get(..whole_digits)?;
    integer_part.parse().ok()
}

#[async_trait::async_trait]
impl ChainQuery for ChainClient {
    async fn smart_query_raw(
        &self,
        contract: &str,
        query_json: Vec<u8>,
    ) -> Result<Vec<u8>, ChainError> {
        let request = QuerySmartContractStateRequest {
            address: contract.to_owned(),
            query_data: query_json,
        };
        let response = self
            .abci_query(
                "/cosmwasm.wasm.v1.Query/SmartContractState",
                request.encode_to_vec(),
            )
            .await?;
        let decoded = QuerySmartContractStateResponse::decode(response.value.as_slice())
            .map_err(|e| ChainError::Decoding(e.to_string()))?;
        Ok(decoded.data)
    }
}

#[async_trait::async_trait]
impl ChainBroadcaster for ChainClient {
    async fn execute_raw(
        &self,
        contract: &str,
        msg_json: Vec<u8>,
        funds: u128,
    ) -> Result<String, ChainError> {
        let coins = if funds == 0 {
            Vec::new()
        } else {
            vec![ProtoCoin {
                denom: FEE_DENOM.to_owned(),
                amount: funds.to_string(),
            }]
        };
        let execute_msg = MsgExecuteContract {
            sender: self.identity.address().to_owned(),
            contract: contract.to_owned(),
            msg: msg_json,
            funds: coins,
        };
        let any_msg = Any {
            type_url: "/cosmwasm.wasm.v1.MsgExecuteContract".to_owned(),
            value: execute_msg.encode_to_vec(),
        };
        self.broadcast_locked(vec![any_msg]).await
    }
}
