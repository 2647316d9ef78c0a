use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepositoryError;

/// User-facing failures.
///
/// Serialized as `{"type": ..., "reason": ...}` so the notification layer can
/// pull the short message out of the `reason` field.
#[derive(Debug, Clone, PartialEq, Eq, Error, JsonSchema, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason")]
pub enum ServiceError {
    // Wallet errors
    /// No wallet is configured for this service.
    #[error("Wallet not installed: {0}")]
    WalletNotInstalled(String),

    /// The wallet exposed no accounts.
    #[error("No accounts: {0}")]
    NoAccounts(String),

    /// An action needs a connected wallet session.
    #[error("Wallet not connected: {0}")]
    NotConnected(String),

    // Input validation errors
    /// The token identifier is neither an address nor a known symbol.
    #[error("Token not found or not supported: {0}")]
    TokenNotFound(String),

    /// The amount is malformed, zero or otherwise unusable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The slippage tolerance is malformed or out of range.
    #[error("Invalid slippage tolerance: {0}")]
    InvalidSlippage(String),

    /// The fee tier is not one of 100, 500, 3000, 10000.
    #[error("Unsupported fee tier: {0}")]
    UnsupportedFeeTier(String),

    // Trade errors
    /// The trades cannot be combined or encoded.
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    /// The pool or pair has no liquidity in range.
    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    /// Another swap from this session has not finished yet.
    #[error("Swap in progress: {0}")]
    SwapInProgress(String),

    /// The swap transaction was mined but reverted.
    #[error("Swap reverted: {0}")]
    SwapReverted(String),

    // Infrastructure errors (abstracted from repository layer)
    /// The node rejected a request with a JSON-RPC error.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// An error occurred while communicating with the blockchain.
    #[error("Blockchain connection error: {0}")]
    BlockchainError(String),

    /// The transaction could not be submitted or confirmed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn wallet_not_installed() -> Self {
        ServiceError::WalletNotInstalled("Install a wallet!".to_string())
    }

    pub fn no_accounts() -> Self {
        ServiceError::NoAccounts("No accounts found!".to_string())
    }

    pub fn not_connected() -> Self {
        ServiceError::NotConnected("Connect your wallet first!".to_string())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::RpcResponse { message, .. } => ServiceError::ProviderError(message),
            RepositoryError::RpcError(msg) | RepositoryError::ContractError(msg) => {
                ServiceError::BlockchainError(format!("Failed to interact with blockchain: {msg}"))
            }
            RepositoryError::TransactionError(msg) => ServiceError::TransactionError(msg),
            RepositoryError::ParseError(msg) | RepositoryError::Other(msg) => {
                ServiceError::InternalError(msg)
            }
        }
    }
}
