pub mod app;
pub mod config;
pub mod middleware;
pub mod repository;
pub mod service;

pub use app::build_app;

// Re-export commonly used types for clients and tests
pub use service::{
    ConnectWalletResult, LoadTokenRequest, LoadTokenResult, NotificationsResponse, Protocol,
    SwapBackend, SwapTokensRequest, SwapTokensResponse, SwapTokensResult, TokenSwapService,
};
