use alloy::primitives::Address;
use tracing::instrument;

use crate::repository::WalletProvider;
use crate::service::utils::short_address;
use crate::service::{ServiceError, ServiceResult};

/// The connected account. Lives until the wallet is disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: u64,
}

impl WalletSession {
    /// `0xd8dA...6045` style display form of the account.
    pub fn short_address(&self) -> String {
        short_address(&self.address.to_string())
    }
}

pub struct WalletConnector;

impl WalletConnector {
    /// Requests accounts from the wallet and opens a session on the first one.
    ///
    /// No retry: a missing wallet or an empty account list fails immediately.
    #[instrument(skip(provider), err)]
    pub async fn connect(provider: Option<&dyn WalletProvider>) -> ServiceResult<WalletSession> {
        let provider = provider.ok_or_else(ServiceError::wallet_not_installed)?;

        let accounts = provider.request_accounts().await?;
        let address = *accounts.first().ok_or_else(ServiceError::no_accounts)?;
        let chain_id = provider.chain_id().await?;

        let session = WalletSession { address, chain_id };
        tracing::info!(
            "Wallet connected: {} on chain {}",
            session.short_address(),
            chain_id
        );

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::address;
    use async_trait::async_trait;

    use super::*;
    use crate::repository::{RepositoryError, TransactionSigner};

    struct StaticWallet {
        accounts: Vec<Address>,
    }

    #[async_trait]
    impl WalletProvider for StaticWallet {
        async fn request_accounts(&self) -> Result<Vec<Address>, RepositoryError> {
            Ok(self.accounts.clone())
        }

        async fn chain_id(&self) -> Result<u64, RepositoryError> {
            Ok(1)
        }

        fn signer(&self, _account: Address) -> Result<Arc<dyn TransactionSigner>, RepositoryError> {
            Err(RepositoryError::Other("not used".to_string()))
        }
    }

    const VITALIK: Address = address!("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

    #[tokio::test]
    async fn test_connect_without_wallet_fails() {
        let err = WalletConnector::connect(None).await.unwrap_err();
        assert_eq!(err, ServiceError::wallet_not_installed());
        assert_eq!(err.to_string(), "Wallet not installed: Install a wallet!");
    }

    #[tokio::test]
    async fn test_connect_with_no_accounts_fails() {
        let wallet = StaticWallet { accounts: vec![] };
        let err = WalletConnector::connect(Some(&wallet)).await.unwrap_err();
        assert_eq!(err, ServiceError::no_accounts());
    }

    #[tokio::test]
    async fn test_connect_uses_first_account() {
        let wallet = StaticWallet {
            accounts: vec![VITALIK, Address::ZERO],
        };
        let session = WalletConnector::connect(Some(&wallet)).await.unwrap();

        assert_eq!(session.address, VITALIK);
        assert_eq!(session.chain_id, 1);
        assert_eq!(session.short_address(), "0xd8dA...6045");
    }
}
