pub mod alloy;
pub mod contract;
pub mod error;

use std::sync::Arc;

use ::alloy::primitives::{Address, Bytes, TxHash, U256};
pub use alloy::{
    AlloyEthereumRepository, AlloyTransactionSigner, AlloyWalletProvider, WalletSource,
    local_wallet,
};
use async_trait::async_trait;
pub use error::RepositoryError;

pub(crate) type RepoResult<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Price and tick read from a Uniswap V3 pool's `slot0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// A transaction ready to be signed: target, calldata and attached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTransaction {
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Read access to the chain: ERC20 metadata, pool state and quotes.
///
/// Every method is a single RPC round trip; callers decide ordering.
#[async_trait]
pub trait EthereumRepository: Send + Sync {
    /// Chain id of the connected network.
    async fn chain_id(&self) -> RepoResult<u64>;

    /// Reads `name`, `symbol` and `decimals` of an ERC20 contract.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ContractError` when the address is not an ERC20 contract.
    async fn get_token_metadata(&self, token: Address) -> RepoResult<TokenMetadata>;

    async fn get_erc20_balance(&self, token: Address, owner: Address) -> RepoResult<U256>;

    async fn get_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> RepoResult<U256>;

    /// In-range liquidity of a V3 pool.
    async fn get_pool_liquidity(&self, pool: Address) -> RepoResult<u128>;

    /// Current `sqrtPriceX96` and tick of a V3 pool.
    async fn get_pool_slot0(&self, pool: Address) -> RepoResult<Slot0>;

    /// Reserves of a V2 pair in `(reserve0, reserve1)` order.
    async fn get_pair_reserves(&self, pair: Address) -> RepoResult<(U256, U256)>;

    /// QuoterV2 `quoteExactInputSingle`, returns the output amount.
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> RepoResult<U256>;

    /// QuoterV2 `quoteExactOutputSingle`, returns the required input amount.
    async fn quote_exact_output_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_out: U256,
    ) -> RepoResult<U256>;

    /// QuoterV2 `quoteExactInput` over a packed multi-hop path.
    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> RepoResult<U256>;

    /// QuoterV2 `quoteExactOutput` over a reversed packed multi-hop path.
    async fn quote_exact_output(&self, path: Bytes, amount_out: U256) -> RepoResult<U256>;

    /// V2 Router02 `getAmountsOut`; the last element is the output amount.
    async fn get_v2_amounts_out(&self, amount_in: U256, path: Vec<Address>)
    -> RepoResult<Vec<U256>>;

    /// V2 Router02 `getAmountsIn`; the first element is the input amount.
    async fn get_v2_amounts_in(&self, amount_out: U256, path: Vec<Address>)
    -> RepoResult<Vec<U256>>;
}

/// The wallet the user connects: an account source plus a way to sign for it.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts the wallet exposes. An empty list means the wallet is locked.
    async fn request_accounts(&self) -> RepoResult<Vec<Address>>;

    async fn chain_id(&self) -> RepoResult<u64>;

    /// A signer bound to one of the accounts returned by `request_accounts`.
    fn signer(&self, account: Address) -> RepoResult<Arc<dyn TransactionSigner>>;
}

/// Signs, submits and confirms transactions on behalf of one account.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Submits the transaction and waits for one confirmation.
    async fn send_transaction(&self, tx: SwapTransaction) -> RepoResult<TransactionOutcome>;
}
