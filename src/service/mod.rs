pub mod dapp;
pub mod error;
pub mod notify;
pub mod pool;
pub mod router;
pub mod swap;
pub mod token;
pub mod token_registry;
pub mod trade;
pub mod types;
pub mod utils;
pub mod wallet;


pub use dapp::{SwapBackend, TokenSwapService};
pub use error::ServiceError;
pub use token_registry::TokenRegistry;
pub use types::*;

pub(crate) type ServiceResult<T> = std::result::Result<T, ServiceError>;
