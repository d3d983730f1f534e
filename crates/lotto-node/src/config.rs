//! Command-line and environment configuration for the operator node.

use std::str::FromStr;

use clap::Parser;

/// Which network to drive the operator against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Injective's public testnet, chain id `injective-888`.
    Testnet,
    /// Injective mainnet, chain id `injective-1`.
    Mainnet,
}

impl Network {
    /// The chain id the transaction envelope signs against.
    #[must_use]
    pub fn chain_id(self) -> &'static str {
        match self {
            Self::Testnet => "injective-888",
            Self::Mainnet => "injective-1",
        }
    }

    /// The default public Tendermint RPC endpoint for this network.
    #[must_use]
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Self::Testnet => "https://testnet.sentry.tm.injective.network:443",
            Self::Mainnet => "https://sentry.tm.injective.network:443",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(format!("invalid network '{other}', expected testnet or mainnet")),
        }
    }
}

/// Operator node configuration, loaded from the environment (optionally via
/// a `.env` file) with no separate config-file layer.
#[derive(Parser)]
#[command(name = "lotto-node")]
#[command(about = "Off-chain operator node for the staking lottery protocol")]
pub struct Config {
    /// Mnemonic for the operator signing key.
    #[arg(long, env = "MNEMONIC", hide_env_values = true)]
    pub mnemonic: String,

    /// Which network to run against; selects chain id and RPC defaults.
    #[arg(long, env = "NETWORK", default_value = "testnet", value_parser = parse_network)]
    pub network: Network,

    /// Tendermint RPC endpoint. Defaults to the selected network's public
    /// sentry node when unset.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Drand oracle contract address.
    #[arg(long, env = "DRAND_ORACLE_ADDRESS")]
    pub drand_oracle_address: String,

    /// Staking hub contract address.
    #[arg(long, env = "STAKING_HUB_ADDRESS")]
    pub staking_hub_address: String,

    /// Reward distributor contract address.
    #[arg(long, env = "REWARD_DISTRIBUTOR_ADDRESS")]
    pub reward_distributor_address: String,

    /// Native staking token denom enumerated by the snapshot builder.
    #[arg(long, env = "STAKE_DENOM", default_value = "inj")]
    pub stake_denom: String,

    /// Beacon poll period, in seconds.
    #[arg(long, env = "DRAND_POLL_INTERVAL", default_value_t = 10)]
    pub drand_poll_interval: u64,

    /// Epoch check period, in seconds.
    #[arg(long, env = "EPOCH_CHECK_INTERVAL", default_value_t = 60)]
    pub epoch_check_interval: u64,

    /// Draw sweep period, in seconds.
    #[arg(long, env = "DRAW_CHECK_INTERVAL", default_value_t = 30)]
    pub draw_check_interval: u64,

    /// External beacon service base URL.
    #[arg(long, env = "DRAND_API_URL", default_value = "https://api.drand.sh")]
    pub drand_api_url: String,

    /// External beacon chain hash.
    #[arg(long, env = "DRAND_CHAIN_HASH")]
    pub drand_chain_hash: String,

    /// Validators to claim delegation rewards from before `advance_epoch`,
    /// comma-separated. Empty (the default) keeps the documented
    /// zero-reward behavior.
    #[arg(long, env = "REWARD_VALIDATORS", value_delimiter = ',', default_value = "")]
    pub reward_validators: Vec<String>,

    /// Directory for the persisted secrets file and snapshot cache.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: std::path::PathBuf,

    /// Log verbosity, also used as the default `tracing` filter.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("mnemonic", &"<redacted>")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("drand_oracle_address", &self.drand_oracle_address)
            .field("staking_hub_address", &self.staking_hub_address)
            .field("reward_distributor_address", &self.reward_distributor_address)
            .field("stake_denom", &self.stake_denom)
            .field("drand_poll_interval", &self.drand_poll_interval)
            .field("epoch_check_interval", &self.epoch_check_interval)
            .field("draw_check_interval", &self.draw_check_interval)
            .field("drand_api_url", &self.drand_api_url)
            .field("drand_chain_hash", &self.drand_chain_hash)
            .field("reward_validators", &self.reward_validators)
            .field("data_dir", &self.data_dir)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// The RPC endpoint to connect to: the explicit override if set, else
    /// the selected network's default.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or_else(|| self.network.default_rpc_url())
    }

    /// Validators to claim rewards from, with empty strings from an unset
    /// `REWARD_VALIDATORS` filtered out.
    #[must_use]
    pub fn reward_validators(&self) -> Vec<String> {
        self.reward_validators
            .iter()
            .filter(|v| !v.is_empty())
            .cloned()
            .collect()
    }
}

fn parse_network(s: &str) -> Result<Network, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parses_known_values() {
        assert_eq!("testnet".parse::<Network>().expect("parses"), Network::Testnet);
        assert_eq!("mainnet".parse::<Network>().expect("parses"), Network::Mainnet);
    }

    #[test]
    fn network_rejects_unknown_value() {
        assert!("devnet".parse::<Network>().is_err());
    }

    #[test]
    fn chain_id_matches_network() {
        assert_eq!(Network::Testnet.chain_id(), "injective-888");
        assert_eq!(Network::Mainnet.chain_id(), "injective-1");
    }

    #[test]
    fn rpc_url_falls_back_to_network_default() {
        let config = Config::parse_from([
            "lotto-node",
            "--mnemonic",
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "--drand-oracle-address",
            "inj1oracle",
            "--staking-hub-address",
            "inj1hub",
            "--reward-distributor-address",
            "inj1distributor",
            "--drand-chain-hash",
            "deadbeef",
        ]);
        assert_eq!(config.rpc_url(), Network::Testnet.default_rpc_url());
    }

    #[test]
    fn empty_reward_validators_filters_to_empty_vec() {
        let config = Config::parse_from([
            "lotto-node",
            "--mnemonic",
            "m",
            "--drand-oracle-address",
            "inj1oracle",
            "--staking-hub-address",
            "inj1hub",
            "--reward-distributor-address",
            "inj1distributor",
            "--drand-chain-hash",
            "deadbeef",
        ]);
        assert!(config.reward_validators().is_empty());
    }
}
