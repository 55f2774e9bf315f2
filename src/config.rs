//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::gateway::{Address, ChainId, SimulatedWalletConfig};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub operations: OperationsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub simulation: SimulatedWalletConfig,
}

/// Chain every operation must run on
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: ChainId,
    /// Human-readable network name, used in logs only
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            network: default_network(),
        }
    }
}

/// Deployed contract addresses
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_token_drop")]
    pub token_drop: String,
    #[serde(default = "default_marketplace")]
    pub marketplace: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            token_drop: default_token_drop(),
            marketplace: default_marketplace(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Editor/test execution: addresses resolve to the zero sentinel
    #[serde(default)]
    pub sandbox_execution: bool,
    /// Handshake timeout, 0 disables
    #[serde(default)]
    pub connect_timeout_ms: u64,
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationsConfig {
    /// Units requested by a token-drop claim
    #[serde(default = "default_claim_quantity")]
    pub claim_quantity: String,
    /// Units bought per marketplace purchase
    #[serde(default = "default_buy_quantity")]
    pub buy_quantity: u64,
    /// Contract call timeout, 0 disables
    #[serde(default)]
    pub invoke_timeout_ms: u64,
}

impl OperationsConfig {
    pub fn invoke_timeout(&self) -> Option<Duration> {
        (self.invoke_timeout_ms > 0).then(|| Duration::from_millis(self.invoke_timeout_ms))
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            claim_quantity: default_claim_quantity(),
            buy_quantity: default_buy_quantity(),
            invoke_timeout_ms: 0,
        }
    }
}

/// Retry policy applied by callers around `connect()`
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_initial_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_retry_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_retry_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_retry_initial_ms(),
            max_interval_ms: default_retry_max_interval_ms(),
            max_elapsed_ms: default_retry_max_elapsed_ms(),
        }
    }
}

// Default value functions
fn default_chain_id() -> ChainId {
    420
}

fn default_network() -> String {
    "optimism-goerli".to_string()
}

fn default_token_drop() -> String {
    "0x07E29106198B3b43Ada9A833Aee3e7CE74D38446".to_string()
}

fn default_marketplace() -> String {
    "0x641c81F8c10e2958F4e0c00882014c0A3A03f86A".to_string()
}

fn default_claim_quantity() -> String {
    "10".to_string()
}

fn default_buy_quantity() -> u64 {
    1
}

fn default_retry_initial_ms() -> u64 {
    250
}

fn default_retry_max_interval_ms() -> u64 {
    2000
}

fn default_retry_max_elapsed_ms() -> u64 {
    10_000
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("chain.chain_id", default_chain_id() as i64)?
            .set_default("chain.network", default_network())?
            .set_default("contracts.token_drop", default_token_drop())?
            .set_default("contracts.marketplace", default_marketplace())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix CHAIN_SESSION__)
            .add_source(
                config::Environment::with_prefix("CHAIN_SESSION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chain.chain_id == 0 {
            anyhow::bail!("chain_id must be non-zero");
        }

        Address::parse(&self.contracts.token_drop)
            .with_context(|| format!("Invalid token_drop address: {}", self.contracts.token_drop))?;
        Address::parse(&self.contracts.marketplace).with_context(|| {
            format!("Invalid marketplace address: {}", self.contracts.marketplace)
        })?;

        match self.operations.claim_quantity.parse::<u64>() {
            Ok(q) if q > 0 => {}
            _ => anyhow::bail!(
                "claim_quantity must be a positive integer, got {:?}",
                self.operations.claim_quantity
            ),
        }

        if self.operations.buy_quantity == 0 {
            anyhow::bail!("buy_quantity must be positive");
        }

        if self.retry.initial_interval_ms > self.retry.max_interval_ms {
            anyhow::bail!("retry.initial_interval_ms cannot exceed retry.max_interval_ms");
        }

        if self.session.sandbox_execution {
            tracing::warn!("Sandbox execution enabled - get_address() returns the zero address");
        }

        Ok(())
    }

    /// Configuration summary for display
    pub fn summary(&self) -> String {
        format!(
            r#"Configuration:
  Chain:
    chain_id: {}
    network: {}
  Contracts:
    token_drop: {}
    marketplace: {}
  Session:
    sandbox_execution: {}
    connect_timeout: {}
  Operations:
    claim_quantity: {}
    buy_quantity: {}
    invoke_timeout: {}
  Retry:
    initial_interval: {}ms
    max_interval: {}ms
    max_elapsed: {}ms
"#,
            self.chain.chain_id,
            self.chain.network,
            self.contracts.token_drop,
            self.contracts.marketplace,
            self.session.sandbox_execution,
            format_timeout(self.session.connect_timeout_ms),
            self.operations.claim_quantity,
            self.operations.buy_quantity,
            format_timeout(self.operations.invoke_timeout_ms),
            self.retry.initial_interval_ms,
            self.retry.max_interval_ms,
            self.retry.max_elapsed_ms,
        )
    }
}

fn format_timeout(ms: u64) -> String {
    if ms == 0 {
        "none".to_string()
    } else {
        format!("{}ms", ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            contracts: ContractsConfig::default(),
            session: SessionConfig::default(),
            operations: OperationsConfig::default(),
            retry: RetryConfig::default(),
            simulation: SimulatedWalletConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chain.chain_id, 420);
        assert_eq!(config.operations.claim_quantity, "10");
        assert_eq!(config.operations.buy_quantity, 1);
        assert!(!config.session.sandbox_execution);
        assert!(config.session.connect_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("does-not-exist.toml").unwrap();
        assert_eq!(config.chain.network, "optimism-goerli");
        assert_eq!(
            config.contracts.marketplace,
            "0x641c81F8c10e2958F4e0c00882014c0A3A03f86A"
        );
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[chain]
chain_id = 10
network = "optimism"

[session]
sandbox_execution = true
connect_timeout_ms = 1500

[operations]
claim_quantity = "25"
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.chain.chain_id, 10);
        assert!(config.session.sandbox_execution);
        assert_eq!(
            config.session.connect_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.operations.claim_quantity, "25");
        // Untouched sections keep their defaults
        assert_eq!(config.operations.buy_quantity, 1);
    }

    #[test]
    fn test_invalid_contract_address_rejected() {
        let file = write_config(
            r#"
[contracts]
token_drop = "0xnot-an-address"
"#,
        );

        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("token_drop"));
    }

    #[test]
    fn test_invalid_claim_quantity_rejected() {
        let mut config = Config::default();
        config.operations.claim_quantity = "ten".to_string();
        assert!(config.validate().is_err());

        config.operations.claim_quantity = "0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_lists_contracts() {
        let summary = Config::default().summary();
        assert!(summary.contains("0x07E29106198B3b43Ada9A833Aee3e7CE74D38446"));
        assert!(summary.contains("connect_timeout: none"));
    }
}
