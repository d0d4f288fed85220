//! Configuration for the orchestrator binary: chain RPC/signer setup plus the
//! initial `system_config` snapshot, loaded from a JSON file with environment-
//! variable fallback for secrets (`SecretOrEnv`).

use clap::Parser;
use orch_types::chain::ChainId;
use orch_types::config::{RpcConfig, SecretOrEnv, SystemConfig};
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

/// CLI arguments for the orchestrator binary.
#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
#[command(about = "Yield orchestrator signal dispatcher")]
struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Per-chain RPC and signer configuration. One entry per chain the dispatcher will
/// spawn a worker for.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub rpc: RpcConfig,
    /// `(owner address, private key)` pairs loaded into the `KeyVault` hot-wallet
    /// cache at startup. Empty means every step for this chain runs in
    /// non-custodial (`PendingSignature`) mode.
    #[serde(default)]
    pub signers: Vec<SignerConfig>,
    /// Overrides `ChainMeta::default_gas_max_gwei` for this chain.
    #[serde(default)]
    pub gas_max_gwei: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub address: String,
    pub private_key: SecretOrEnv<String>,
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default)]
    chains: Vec<ChainConfig>,
    #[serde(default)]
    system_config: SystemConfig,
    /// Passphrase the `KeyVault` derives its AES-256-GCM encryption key from.
    #[serde(default = "config_defaults::default_wallet_encryption_key")]
    pub wallet_encryption_key: SecretOrEnv<String>,
}

pub mod config_defaults {
    use std::env;
    use std::net::IpAddr;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    pub fn default_port() -> u16 {
        env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_PORT)
    }

    pub fn default_host() -> IpAddr {
        env::var("HOST").ok().and_then(|s| s.parse().ok()).unwrap_or(IpAddr::V4(DEFAULT_HOST.parse().unwrap()))
    }

    pub fn default_wallet_encryption_key() -> super::SecretOrEnv<String> {
        super::SecretOrEnv(env::var("WALLET_ENCRYPTION_KEY").unwrap_or_default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn initial_system_config(&self) -> SystemConfig {
        self.system_config.clone()
    }

    /// Loads configuration from `--config`/`$CONFIG`, falling back to
    /// `config.json` in the working directory. Values absent from the file
    /// resolve via environment variables or the hard defaults above.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        if cli_args.config.exists() {
            Self::load_from_path(cli_args.config)
        } else {
            Ok(serde_json::from_str("{}")?)
        }
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let canonical = path.canonicalize().map_err(|e| ConfigError::FileRead(path.clone(), e))?;
        let content = fs::read_to_string(&canonical).map_err(|e| ConfigError::FileRead(canonical, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}
