use std::collections::HashMap;

use alloy::primitives::{Address, address};

pub const MAINNET_CHAIN_ID: u64 = 1;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

const MAINNET_TOKENS: &[(&str, Address)] = &[
    // ETH resolves to WETH: the router only trades ERC20s
    ("ETH", address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")),
    ("WETH", address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")),
    ("WBTC", address!("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599")),
    ("USDC", address!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")),
    ("USDT", address!("0xdac17f958d2ee523a2206206994597c13d831ec7")),
    ("DAI", address!("0x6b175474e89094c44da98b954eedeac495271d0f")),
    ("UNI", address!("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984")),
    ("LINK", address!("0x514910771af9ca656af840dff83e8264ecf986ca")),
];

const SEPOLIA_TOKENS: &[(&str, Address)] = &[
    ("ETH", address!("0xfff9976782d46cc05630d1f6ebab18b2324d6b14")),
    ("WETH", address!("0xfff9976782d46cc05630d1f6ebab18b2324d6b14")),
    ("USDC", address!("0x1c7d4b196cb0c7b01d743fbc6116a902379c7238")),
    ("UNI", address!("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984")),
];

/// Well-known token symbols per chain, so callers can say "USDC" instead of an address.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    chains: HashMap<u64, HashMap<&'static str, Address>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let chains = [
            (MAINNET_CHAIN_ID, MAINNET_TOKENS),
            (SEPOLIA_CHAIN_ID, SEPOLIA_TOKENS),
        ]
        .into_iter()
        .map(|(chain_id, tokens)| (chain_id, tokens.iter().copied().collect()))
        .collect();

        Self { chains }
    }

    /// Lookup a token address by symbol (case-insensitive) on the given chain
    pub fn lookup(&self, chain_id: u64, symbol: &str) -> Option<Address> {
        let symbol = symbol.to_uppercase();
        self.chains.get(&chain_id)?.get(symbol.as_str()).copied()
    }

    /// Supported symbols on the given chain, sorted alphabetically
    pub fn supported_tokens(&self, chain_id: u64) -> Vec<&'static str> {
        let mut tokens: Vec<&'static str> = self
            .chains
            .get(&chain_id)
            .map(|tokens| tokens.keys().copied().collect())
            .unwrap_or_default();
        tokens.sort_unstable();
        tokens
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = TokenRegistry::new();
        let usdc = address!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

        assert_eq!(registry.lookup(MAINNET_CHAIN_ID, "USDC"), Some(usdc));
        assert_eq!(registry.lookup(MAINNET_CHAIN_ID, "usdc"), Some(usdc));
    }

    #[test]
    fn test_eth_resolves_to_weth() {
        let registry = TokenRegistry::new();
        assert_eq!(
            registry.lookup(MAINNET_CHAIN_ID, "ETH"),
            registry.lookup(MAINNET_CHAIN_ID, "WETH")
        );
        assert_eq!(
            registry.lookup(SEPOLIA_CHAIN_ID, "eth"),
            registry.lookup(SEPOLIA_CHAIN_ID, "WETH")
        );
    }

    #[test]
    fn test_lookup_is_chain_scoped() {
        let registry = TokenRegistry::new();

        assert!(registry.lookup(MAINNET_CHAIN_ID, "DAI").is_some());
        assert_eq!(registry.lookup(SEPOLIA_CHAIN_ID, "DAI"), None);
        assert_eq!(registry.lookup(137, "USDC"), None);
    }

    #[test]
    fn test_supported_tokens_sorted() {
        let registry = TokenRegistry::new();
        let tokens = registry.supported_tokens(MAINNET_CHAIN_ID);

        assert!(tokens.contains(&"USDT"));
        assert!(tokens.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(registry.supported_tokens(137).is_empty());
    }
}
