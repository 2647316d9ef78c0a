//! Swap execution: from two token identifiers to a confirmed router transaction.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::config::Config;
use crate::repository::contract::IERC20;
use crate::repository::{EthereumRepository, SwapTransaction, TransactionSigner};
use crate::service::pool::{FactoryInfo, FeeAmount, PoolFetcher};
use crate::service::router::{SwapOptions, swap_call_parameters};
use crate::service::token::{TokenLoader, TokenRecord};
use crate::service::token_registry::TokenRegistry;
use crate::service::trade::{AggregateTrade, Trade, TradeBuilder, TradeType, V2Route, V3Route};
use crate::service::types::{Protocol, SwapTokensRequest, SwapTokensResponse};
use crate::service::utils::{calculate_price_impact, format_balance, parse_amount, parse_slippage};
use crate::service::wallet::WalletSession;
use crate::service::{ServiceError, ServiceResult};

/// Swap defaults and Uniswap deployment addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSettings {
    pub amount: String,
    pub slippage_tolerance: Decimal,
    pub fee: FeeAmount,
    pub deadline: Duration,
    pub recipient: Option<Address>,
    pub router: Address,
    pub v3: FactoryInfo,
    pub v2: FactoryInfo,
}

impl SwapSettings {
    pub fn from_config(config: &Config) -> ServiceResult<Self> {
        let swap = &config.swap;

        let recipient = match swap.recipient.trim() {
            "" => None,
            value => Some(Address::from_str(value).map_err(|e| {
                ServiceError::InternalError(format!("Invalid configured recipient: {e}"))
            })?),
        };

        Ok(Self {
            amount: swap.amount.clone(),
            slippage_tolerance: parse_slippage(&swap.slippage_tolerance)?,
            fee: FeeAmount::try_from(swap.fee_tier)?,
            deadline: Duration::from_secs(swap.deadline_secs),
            recipient,
            router: config.uniswap.swap_router_02,
            v3: FactoryInfo {
                factory: config.uniswap.v3_factory,
                init_code_hash: config.uniswap.v3_pool_init_code_hash,
            },
            v2: FactoryInfo {
                factory: config.uniswap.v2_factory,
                init_code_hash: config.uniswap.v2_pair_init_code_hash,
            },
        })
    }
}

/// Executes swaps for one connected account.
pub struct SwapExecutor {
    repository: Arc<dyn EthereumRepository>,
    signer: Arc<dyn TransactionSigner>,
    registry: Arc<TokenRegistry>,
    settings: SwapSettings,
}

impl SwapExecutor {
    pub fn new(
        repository: Arc<dyn EthereumRepository>,
        signer: Arc<dyn TransactionSigner>,
        registry: Arc<TokenRegistry>,
        settings: SwapSettings,
    ) -> Self {
        Self {
            repository,
            signer,
            registry,
            settings,
        }
    }

    /// Loads both tokens, fetches the pool, prices a single-route trade, encodes the
    /// router call, ensures the router allowance and submits the swap. Steps run in
    /// this order and stop at the first failure.
    #[instrument(skip(self, session), fields(account = %session.address), err)]
    pub async fn execute(
        &self,
        session: &WalletSession,
        req: &SwapTokensRequest,
    ) -> ServiceResult<SwapTokensResponse> {
        if self.signer.address() != session.address {
            return Err(ServiceError::InternalError(format!(
                "Signer {} does not belong to session {}",
                self.signer.address(),
                session.short_address()
            )));
        }

        let repository = self.repository.as_ref();
        let owner = session.address;

        // Tokens
        let loader = TokenLoader::new(repository, &self.registry);
        let token_in = loader.load(&req.from_token, session.chain_id, owner).await?;
        let token_out = loader.load(&req.to_token, session.chain_id, owner).await?;

        // Pool, trade and aggregate
        let trade_type = req.trade_type.unwrap_or_default();
        let trade = self
            .build_trade(req, &token_in, &token_out, trade_type)
            .await?;
        let mid_price = trade.mid_price().ok();
        let route = Self::describe_route(&trade);
        let aggregate = AggregateTrade::from_trades(vec![trade])?;

        // Options
        let slippage = match req.slippage_tolerance.as_deref() {
            Some(value) => parse_slippage(value)?,
            None => self.settings.slippage_tolerance,
        };
        let recipient = match req.recipient.as_deref() {
            Some(value) => Address::from_str(value.trim())
                .map_err(|e| ServiceError::InvalidTrade(format!("Invalid recipient: {e}")))?,
            None => self.settings.recipient.unwrap_or(owner),
        };
        let deadline =
            U256::from(chrono::Utc::now().timestamp() as u64 + self.settings.deadline.as_secs());

        let options = SwapOptions {
            slippage_tolerance: slippage,
            recipient,
            deadline,
        };
        let params = swap_call_parameters(&aggregate, &options)?;

        // Priced before any transaction is sent
        let execution_price = aggregate.execution_price()?;
        let price_impact = mid_price
            .and_then(|mid| calculate_price_impact(mid, execution_price))
            .map(|impact| format!("{}%", impact.normalize()))
            .unwrap_or_else(|| "N/A".to_string());

        let maximum_input = aggregate.maximum_amount_in(slippage);
        let minimum_output = aggregate.minimum_amount_out(slippage);

        if token_in.balance < maximum_input {
            return Err(ServiceError::InvalidAmount(format!(
                "Insufficient {} balance: have {}, need {}",
                token_in.symbol,
                format_balance(token_in.balance, token_in.decimals),
                format_balance(maximum_input, token_in.decimals)
            )));
        }

        // Allowance
        let approval_tx_hash = self.ensure_allowance(&token_in, owner, maximum_input).await?;

        // Swap
        let outcome = self
            .signer
            .send_transaction(SwapTransaction {
                to: self.settings.router,
                calldata: params.calldata,
                value: params.value,
            })
            .await?;

        if !outcome.success {
            return Err(ServiceError::SwapReverted(format!(
                "Transaction {} reverted",
                outcome.tx_hash
            )));
        }

        let response = SwapTokensResponse {
            tx_hash: outcome.tx_hash.to_string(),
            approval_tx_hash,
            block_number: outcome.block_number,
            gas_used: outcome.gas_used,
            route,
            input_amount: format_balance(aggregate.input_amount(), token_in.decimals),
            output_amount: format_balance(aggregate.output_amount(), token_out.decimals),
            minimum_output: format_balance(minimum_output, token_out.decimals),
            maximum_input: format_balance(maximum_input, token_in.decimals),
            price_impact,
            exchange_rate: execution_price.normalize().to_string(),
            recipient: recipient.to_string(),
        };

        tracing::info!(
            "Swap confirmed: {} {} -> {} {} ({}), tx={}",
            response.input_amount,
            token_in.symbol,
            response.output_amount,
            token_out.symbol,
            response.route,
            response.tx_hash
        );

        Ok(response)
    }

    async fn build_trade(
        &self,
        req: &SwapTokensRequest,
        token_in: &TokenRecord,
        token_out: &TokenRecord,
        trade_type: TradeType,
    ) -> ServiceResult<Trade> {
        let repository = self.repository.as_ref();
        let fetcher = PoolFetcher::new(repository, self.settings.v3, self.settings.v2);
        let builder = TradeBuilder::new(repository);

        let amount_str = req.amount.as_deref().unwrap_or(&self.settings.amount);
        let amount_decimals = match trade_type {
            TradeType::ExactInput => token_in.decimals,
            TradeType::ExactOutput => token_out.decimals,
        };

        match req.protocol.unwrap_or_default() {
            Protocol::V3 => {
                let fee = match req.fee_tier {
                    Some(fee) => FeeAmount::try_from(fee)?,
                    None => self.settings.fee,
                };

                let pool = fetcher.fetch_pool(token_in, token_out, fee).await?;
                pool.ensure_liquidity()?;

                let amount = parse_amount(amount_str, amount_decimals)?;
                let route = V3Route::new(vec![pool], token_in)?;
                builder.v3_trade(route, amount, trade_type).await
            }
            Protocol::V2 => {
                let pair = fetcher.fetch_pair(token_in, token_out).await?;
                pair.ensure_liquidity()?;

                let amount = parse_amount(amount_str, amount_decimals)?;
                let route = V2Route::new(vec![pair], token_in)?;
                builder.v2_trade(route, amount, trade_type).await
            }
        }
    }

    /// Approves the router for `required` when the current allowance is short.
    async fn ensure_allowance(
        &self,
        token: &TokenRecord,
        owner: Address,
        required: U256,
    ) -> ServiceResult<Option<String>> {
        let router = self.settings.router;
        let allowance = self
            .repository
            .get_allowance(token.address, owner, router)
            .await?;

        if allowance >= required {
            tracing::debug!("Allowance of {} is sufficient: {}", token.symbol, allowance);
            return Ok(None);
        }

        tracing::info!(
            "Approving {} {} for router {}",
            format_balance(required, token.decimals),
            token.symbol,
            router
        );

        let calldata = IERC20::approveCall {
            spender: router,
            amount: required,
        }
        .abi_encode();

        let outcome = self
            .signer
            .send_transaction(SwapTransaction {
                to: token.address,
                calldata: calldata.into(),
                value: U256::ZERO,
            })
            .await?;

        if !outcome.success {
            return Err(ServiceError::TransactionError(format!(
                "Approval {} of {} reverted",
                outcome.tx_hash, token.symbol
            )));
        }

        Ok(Some(outcome.tx_hash.to_string()))
    }

    fn describe_route(trade: &Trade) -> String {
        let symbols: Vec<&str> = trade.path().iter().map(|t| t.symbol.as_str()).collect();
        let via = match trade {
            Trade::V2(_) => "V2".to_string(),
            Trade::V3(route) => {
                let fees: Vec<String> =
                    route.route.pools.iter().map(|p| p.fee.to_string()).collect();
                format!("V3 {}", fees.join("/"))
            }
            Trade::Mixed(_) => "mixed".to_string(),
        };
        format!("{} via {}", symbols.join(" -> "), via)
    }
}
