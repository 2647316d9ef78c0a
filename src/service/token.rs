use std::str::FromStr;

use alloy::primitives::{Address, U256};
use tracing::instrument;

use crate::repository::EthereumRepository;
use crate::service::token_registry::TokenRegistry;
use crate::service::{ServiceError, ServiceResult};

/// Snapshot of an ERC20 token as seen by one account. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
    /// Balance of the loading account, in the token's smallest unit.
    pub balance: U256,
}

impl TokenRecord {
    /// Canonical Uniswap ordering: lower address first.
    pub fn sorts_before(&self, other: &TokenRecord) -> bool {
        self.address < other.address
    }
}

/// Resolves token identifiers and reads ERC20 metadata.
pub struct TokenLoader<'a> {
    repository: &'a dyn EthereumRepository,
    registry: &'a TokenRegistry,
}

impl<'a> TokenLoader<'a> {
    pub fn new(repository: &'a dyn EthereumRepository, registry: &'a TokenRegistry) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Accepts a contract address or a symbol known on `chain_id`.
    pub fn resolve(&self, identifier: &str, chain_id: u64) -> ServiceResult<Address> {
        if let Ok(address) = Address::from_str(identifier.trim()) {
            return Ok(address);
        }

        self.registry.lookup(chain_id, identifier).ok_or_else(|| {
            tracing::warn!("Token symbol not found in registry: {}", identifier);
            ServiceError::TokenNotFound(format!(
                "{} (Supported tokens: {})",
                identifier,
                self.registry.supported_tokens(chain_id).join(", ")
            ))
        })
    }

    /// Reads symbol, name, decimals and the owner's balance.
    #[instrument(skip(self), err)]
    pub async fn load(
        &self,
        identifier: &str,
        chain_id: u64,
        owner: Address,
    ) -> ServiceResult<TokenRecord> {
        let address = self.resolve(identifier, chain_id)?;

        let metadata = self.repository.get_token_metadata(address).await?;
        let balance = self.repository.get_erc20_balance(address, owner).await?;

        tracing::info!(
            "Loaded token {} ({}) with {} decimals",
            metadata.symbol,
            address,
            metadata.decimals
        );

        Ok(TokenRecord {
            chain_id,
            address,
            decimals: metadata.decimals,
            symbol: metadata.symbol,
            name: metadata.name,
            balance,
        })
    }
}
