use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::service::ServiceError;
use crate::service::notify::Notification;
use crate::service::trade::TradeType;

// Response types that include error handling
#[derive(Debug, JsonSchema, Serialize)]
#[serde(untagged)]
pub enum ConnectWalletResult {
    Success(ConnectWalletResponse),
    Error { error: ServiceError },
}

#[derive(Debug, JsonSchema, Serialize)]
#[serde(untagged)]
pub enum LoadTokenResult {
    Success(LoadTokenResponse),
    Error { error: ServiceError },
}

#[derive(Debug, JsonSchema, Serialize)]
#[serde(untagged)]
pub enum SwapTokensResult {
    Success(SwapTokensResponse),
    Error { error: ServiceError },
}

#[derive(Debug, JsonSchema, Serialize)]
pub struct ConnectWalletResponse {
    /// Connected account address
    pub address: String,
    /// Shortened address for display (e.g. "0xd8dA...6045")
    pub short_address: String,
    /// Chain id the wallet is connected to
    pub chain_id: u64,
}

#[derive(Debug, JsonSchema, Serialize)]
pub struct DisconnectWalletResponse {
    /// Whether a session was open before the call
    pub was_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, JsonSchema, Serialize, Deserialize)]
pub struct LoadTokenRequest {
    /// Token symbol or contract address (e.g., "USDC" or "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
    pub token: String,

    /// Optional: account whose balance is read (defaults to the connected wallet)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, JsonSchema, Serialize)]
pub struct LoadTokenResponse {
    pub chain_id: u64,
    /// Token contract address
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Raw balance value
    pub balance: String,
    /// Balance formatted with proper decimals
    pub formatted_balance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    V2,
    #[default]
    V3,
}

#[derive(Debug, Default, JsonSchema, Serialize, Deserialize)]
pub struct SwapTokensRequest {
    /// Source token symbol or address (e.g., "WETH" or "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
    pub from_token: String,

    /// Destination token symbol or address (e.g., "USDC", "DAI", or "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
    pub to_token: String,

    /// Optional: amount in human-readable format (e.g., "1", "100.5"); defaults to the configured amount.
    /// It is denominated in the source token for exact input and the destination token for exact output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,

    /// Optional: slippage tolerance in percentage (e.g., "0.5" for 0.5%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage_tolerance: Option<String>,

    /// Optional: V3 pool fee tier in hundredths of a basis point (100, 500, 3000 or 10000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_tier: Option<u32>,

    /// Optional: Uniswap protocol to route through ("v2" or "v3", defaults to "v3")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    /// Optional: "exact_input" (default) or "exact_output"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_type: Option<TradeType>,

    /// Optional: address receiving the output tokens (defaults to the connected wallet)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

#[derive(Debug, JsonSchema, Serialize)]
pub struct SwapTokensResponse {
    /// Hash of the confirmed swap transaction
    pub tx_hash: String,

    /// Hash of the ERC20 approval sent before the swap, if one was needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,

    pub gas_used: u64,

    /// Human-readable route (e.g. "WETH -> USDC via V3 0.3%")
    pub route: String,

    /// Quoted input amount (formatted with decimals)
    pub input_amount: String,

    /// Quoted output amount (formatted with decimals)
    pub output_amount: String,

    /// Minimum output after slippage (formatted)
    pub minimum_output: String,

    /// Maximum input after slippage (formatted)
    pub maximum_input: String,

    /// Price impact percentage, "N/A" when the mid price is unavailable
    pub price_impact: String,

    /// Exchange rate (to_token per from_token)
    pub exchange_rate: String,

    /// Address that received the output tokens
    pub recipient: String,
}

#[derive(Debug, JsonSchema, Serialize)]
pub struct NotificationsResponse {
    /// Notifications that have not expired yet, oldest first
    pub notifications: Vec<Notification>,
}
