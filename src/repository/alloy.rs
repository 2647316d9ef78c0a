use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{
    Address, Bytes, U256,
    aliases::{U24, U160},
};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::instrument;

use super::error::RepositoryError;
use crate::repository::contract::{
    IERC20, IQuoterV2, IUniswapV2Pair, IUniswapV2Router02, IUniswapV3Pool,
};
use crate::repository::{
    EthereumRepository, RepoResult, Slot0, SwapTransaction, TokenMetadata, TransactionOutcome,
    TransactionSigner, WalletProvider,
};

/// Parses a hex private key into a wallet and returns it with its address.
pub fn local_wallet(private_key: &str) -> RepoResult<(EthereumWallet, Address)> {
    let signer = PrivateKeySigner::from_str(private_key)
        .map_err(|e| RepositoryError::ParseError(format!("Invalid private key: {e}")))?;
    let address = signer.address();

    Ok((EthereumWallet::from(signer), address))
}

pub struct AlloyEthereumRepository<P> {
    provider: Arc<P>,
    quoter: Address,
    v2_router: Address,
}

impl<P: Provider + Clone + 'static> AlloyEthereumRepository<P> {
    pub fn new(provider: Arc<P>, quoter: Address, v2_router: Address) -> Self {
        Self {
            provider,
            quoter,
            v2_router,
        }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> EthereumRepository
    for AlloyEthereumRepository<P>
{
    #[instrument(skip(self), err)]
    async fn chain_id(&self) -> RepoResult<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    #[instrument(skip(self), err)]
    async fn get_token_metadata(&self, token: Address) -> RepoResult<TokenMetadata> {
        let contract = IERC20::new(token, self.provider.clone());

        let symbol = contract.symbol().call().await?;
        let name = contract.name().call().await?;
        let decimals = contract.decimals().call().await?;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    #[instrument(skip(self), err)]
    async fn get_erc20_balance(&self, token: Address, owner: Address) -> RepoResult<U256> {
        let contract = IERC20::new(token, self.provider.clone());
        Ok(contract.balanceOf(owner).call().await?)
    }

    #[instrument(skip(self), err)]
    async fn get_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> RepoResult<U256> {
        let contract = IERC20::new(token, self.provider.clone());
        Ok(contract.allowance(owner, spender).call().await?)
    }

    #[instrument(skip(self), err)]
    async fn get_pool_liquidity(&self, pool: Address) -> RepoResult<u128> {
        let contract = IUniswapV3Pool::new(pool, self.provider.clone());

        contract.liquidity().call().await.map_err(|e| {
            tracing::error!("Failed to read liquidity of pool {}: {}", pool, e);
            RepositoryError::from(e)
        })
    }

    #[instrument(skip(self), err)]
    async fn get_pool_slot0(&self, pool: Address) -> RepoResult<Slot0> {
        let contract = IUniswapV3Pool::new(pool, self.provider.clone());

        let slot0 = contract.slot0().call().await?;
        let tick = i32::try_from(slot0.tick)
            .map_err(|e| RepositoryError::ParseError(format!("Invalid pool tick: {e}")))?;

        Ok(Slot0 {
            sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
            tick,
        })
    }

    #[instrument(skip(self), err)]
    async fn get_pair_reserves(&self, pair: Address) -> RepoResult<(U256, U256)> {
        let contract = IUniswapV2Pair::new(pair, self.provider.clone());

        let reserves = contract.getReserves().call().await.map_err(|e| {
            RepositoryError::ContractError(format!("Failed to get reserves of {pair}: {e}"))
        })?;

        Ok((U256::from(reserves.reserve0), U256::from(reserves.reserve1)))
    }

    #[instrument(skip(self), err)]
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> RepoResult<U256> {
        let quoter = IQuoterV2::new(self.quoter, self.provider.clone());

        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::from(fee),
            sqrtPriceLimitX96: U160::ZERO,
        };

        let result = quoter.quoteExactInputSingle(params).call().await?;

        tracing::debug!(
            "Quote exact input {} -> {} (fee {}): {} -> {}, gas {}",
            token_in,
            token_out,
            fee,
            amount_in,
            result.amountOut,
            result.gasEstimate
        );

        Ok(result.amountOut)
    }

    #[instrument(skip(self), err)]
    async fn quote_exact_output_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_out: U256,
    ) -> RepoResult<U256> {
        let quoter = IQuoterV2::new(self.quoter, self.provider.clone());

        let params = IQuoterV2::QuoteExactOutputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amount: amount_out,
            fee: U24::from(fee),
            sqrtPriceLimitX96: U160::ZERO,
        };

        let result = quoter.quoteExactOutputSingle(params).call().await?;

        tracing::debug!(
            "Quote exact output {} -> {} (fee {}): {} <- {}",
            token_in,
            token_out,
            fee,
            result.amountIn,
            amount_out
        );

        Ok(result.amountIn)
    }

    #[instrument(skip(self), err)]
    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> RepoResult<U256> {
        let quoter = IQuoterV2::new(self.quoter, self.provider.clone());
        let result = quoter.quoteExactInput(path, amount_in).call().await?;
        Ok(result.amountOut)
    }

    #[instrument(skip(self), err)]
    async fn quote_exact_output(&self, path: Bytes, amount_out: U256) -> RepoResult<U256> {
        let quoter = IQuoterV2::new(self.quoter, self.provider.clone());
        let result = quoter.quoteExactOutput(path, amount_out).call().await?;
        Ok(result.amountIn)
    }

    #[instrument(skip(self), err)]
    async fn get_v2_amounts_out(
        &self,
        amount_in: U256,
        path: Vec<Address>,
    ) -> RepoResult<Vec<U256>> {
        let router = IUniswapV2Router02::new(self.v2_router, self.provider.clone());

        let amounts = router
            .getAmountsOut(amount_in, path.clone())
            .call()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get amounts out for path {:?}: {}", path, e);
                RepositoryError::from(e)
            })?;

        tracing::debug!("V2 amounts out: {:?}", amounts);
        Ok(amounts)
    }

    #[instrument(skip(self), err)]
    async fn get_v2_amounts_in(
        &self,
        amount_out: U256,
        path: Vec<Address>,
    ) -> RepoResult<Vec<U256>> {
        let router = IUniswapV2Router02::new(self.v2_router, self.provider.clone());

        let amounts = router
            .getAmountsIn(amount_out, path.clone())
            .call()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get amounts in for path {:?}: {}", path, e);
                RepositoryError::from(e)
            })?;

        tracing::debug!("V2 amounts in: {:?}", amounts);
        Ok(amounts)
    }
}

/// Where the connected accounts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSource {
    /// A private key held by this process; the provider carries its wallet filler.
    Local(Address),
    /// Accounts unlocked on the RPC node, signed with `eth_sendTransaction`.
    Node,
}

pub struct AlloyWalletProvider<P> {
    provider: Arc<P>,
    source: WalletSource,
    confirmation_timeout: Duration,
}

impl<P: Provider + Clone + 'static> AlloyWalletProvider<P> {
    pub fn new(provider: Arc<P>, source: WalletSource, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            source,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> WalletProvider for AlloyWalletProvider<P> {
    #[instrument(skip(self), err)]
    async fn request_accounts(&self) -> RepoResult<Vec<Address>> {
        match self.source {
            WalletSource::Local(address) => Ok(vec![address]),
            WalletSource::Node => Ok(self.provider.get_accounts().await?),
        }
    }

    #[instrument(skip(self), err)]
    async fn chain_id(&self) -> RepoResult<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    fn signer(&self, account: Address) -> RepoResult<Arc<dyn TransactionSigner>> {
        match self.source {
            WalletSource::Local(address) if address != account => {
                return Err(RepositoryError::Other(format!(
                    "Account {account} is not managed by the local wallet"
                )));
            }
            _ => {}
        }

        Ok(Arc::new(AlloyTransactionSigner::new(
            self.provider.clone(),
            account,
            self.confirmation_timeout,
        )))
    }
}

pub struct AlloyTransactionSigner<P> {
    provider: Arc<P>,
    from: Address,
    confirmation_timeout: Duration,
}

impl<P: Provider + Clone + 'static> AlloyTransactionSigner<P> {
    pub fn new(provider: Arc<P>, from: Address, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            from,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> TransactionSigner for AlloyTransactionSigner<P> {
    fn address(&self) -> Address {
        self.from
    }

    #[instrument(skip(self, tx), fields(to = %tx.to), err)]
    async fn send_transaction(&self, tx: SwapTransaction) -> RepoResult<TransactionOutcome> {
        let request = TransactionRequest::default()
            .with_from(self.from)
            .with_to(tx.to)
            .with_input(tx.calldata)
            .with_value(tx.value);

        let pending = self.provider.send_transaction(request).await?;
        let tx_hash = *pending.tx_hash();
        tracing::info!("Submitted transaction {}", tx_hash);

        let receipt = pending
            .with_required_confirmations(1)
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| {
                RepositoryError::TransactionError(format!("Transaction {tx_hash} not confirmed: {e}"))
            })?;

        let outcome = TransactionOutcome {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
            success: receipt.status(),
        };

        tracing::info!(
            "Transaction {} confirmed in block {:?} (gas used {}, success {})",
            outcome.tx_hash,
            outcome.block_number,
            outcome.gas_used,
            outcome.success
        );

        Ok(outcome)
    }
}
