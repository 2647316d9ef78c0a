use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use anyhow::Context;
use dotenv::dotenv;
use envsubst::substitute;
use serde::Deserialize;

/// Environment prefixes that may be interpolated into the YAML file.
const ENV_PREFIXES: [&str; 3] = ["SERVER_", "WALLET_", "RPC_"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub rpc: RpcConfig,
    pub wallet: WalletConfig,
    pub swap: SwapConfig,
    pub uniswap: UniswapConfig,
}

impl Config {
    pub async fn from_yaml(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenv().ok();

        let path = path.as_ref();
        let file_content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file from path: {}", path.display()))?;

        let mut env_vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
            .collect();

        // Unset placeholders fall back to a local node and a read-only wallet.
        env_vars
            .entry("RPC_URL".to_string())
            .or_insert_with(|| "http://127.0.0.1:8545".to_string());
        env_vars.entry("WALLET_PRIVATE_KEY".to_string()).or_default();

        let interpolated = substitute(&file_content, &env_vars)
            .context("failed to substitute environment variables in YAML")?;

        serde_yaml::from_str(&interpolated).context("failed to parse YAML configuration")
    }

    pub fn server_uri(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Hex private key of a local signer. Empty means no local wallet.
    #[serde(default)]
    pub private_key: String,
    /// Use the accounts managed by the RPC node (`eth_accounts`) when no key is set.
    #[serde(default)]
    pub node_accounts: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    /// Human-readable input amount used when a request does not carry one.
    pub amount: String,
    /// Slippage tolerance in percent, e.g. "0.5".
    pub slippage_tolerance: String,
    pub fee_tier: u32,
    pub deadline_secs: u64,
    pub confirmation_timeout_secs: u64,
    /// Recipient of the output tokens. Empty means the connected account.
    #[serde(default)]
    pub recipient: String,
}

impl SwapConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniswapConfig {
    pub v3_factory: Address,
    pub v3_pool_init_code_hash: B256,
    pub v2_factory: Address,
    pub v2_pair_init_code_hash: B256,
    pub quoter_v2: Address,
    pub v2_router: Address,
    pub swap_router_02: Address,
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[tokio::test]
    #[serial_test::serial]
    async fn test_load_config_from_yaml() {
        let config = Config::from_yaml("config/test.yaml").await.unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.rpc.url, "https://eth.llamarpc.com");
        assert_eq!(config.wallet.private_key, "");
        assert!(!config.wallet.node_accounts);

        assert_eq!(config.swap.amount, "1");
        assert_eq!(config.swap.slippage_tolerance, "0.5");
        assert_eq!(config.swap.fee_tier, 3000);
        assert_eq!(config.swap.confirmation_timeout(), Duration::from_secs(300));
        assert!(config.swap.recipient.is_empty());

        assert_eq!(
            config.uniswap.v3_factory,
            address!("0x1F98431c8aD98523631AE4a59f267346ea31F984")
        );
        assert_eq!(
            config.uniswap.swap_router_02,
            address!("0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45")
        );
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_default_config_interpolates_env_vars() {
        unsafe {
            std::env::set_var("RPC_URL", "http://localhost:9545");
            std::env::set_var(
                "WALLET_PRIVATE_KEY",
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            );
        }

        let config = Config::from_yaml("config/default.yaml").await.unwrap();

        assert_eq!(config.rpc.url, "http://localhost:9545");
        assert!(config.wallet.private_key.starts_with("0xac0974"));

        unsafe {
            std::env::remove_var("RPC_URL");
            std::env::remove_var("WALLET_PRIVATE_KEY");
        }
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_default_config_without_env_vars_is_read_only() {
        unsafe {
            std::env::remove_var("RPC_URL");
            std::env::remove_var("WALLET_PRIVATE_KEY");
        }

        let config = Config::from_yaml("config/default.yaml").await.unwrap();

        assert_eq!(config.rpc.url, "http://127.0.0.1:8545");
        assert!(config.wallet.private_key.is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_file_is_an_error() {
        let result = Config::from_yaml("config/does-not-exist.yaml").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_server_uri() {
        let config = Config::from_yaml("config/test.yaml").await.unwrap();
        assert_eq!(config.server_uri(), "0.0.0.0:8000");
    }
}
