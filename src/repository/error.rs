use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("RPC error: {0}")]
    RpcError(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    #[error("Contract call error: {0}")]
    ContractError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

impl From<RpcError<TransportErrorKind>> for RepositoryError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => RepositoryError::RpcResponse {
                code: payload.code,
                message: payload.message.to_string(),
            },
            other => RepositoryError::RpcError(other.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for RepositoryError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(inner) => inner.into(),
            other => RepositoryError::ContractError(other.to_string()),
        }
    }
}
