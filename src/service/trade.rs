//! Routes, trades and the aggregate trade handed to the router encoder.
//!
//! A trade is one priced route. Trades come in three kinds (V2-only, V3-only
//! and mixed) and are combined into an [`AggregateTrade`] by matching on the
//! variant.

use alloy::primitives::{Address, Bytes, U256};
use rmcp::schemars::{self, JsonSchema};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::repository::EthereumRepository;
use crate::service::pool::{FeeAmount, PairSnapshot, PoolSnapshot};
use crate::service::token::TokenRecord;
use crate::service::utils::{
    calculate_exchange_rate, calculate_maximum_input, calculate_minimum_output,
};
use crate::service::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    /// The input amount is fixed; slippage bounds the minimum output.
    #[default]
    ExactInput,
    /// The output amount is fixed; slippage bounds the maximum input.
    ExactOutput,
}

/// Packed V3 path: token (20 bytes), fee (3 bytes), token, ...
pub fn encode_v3_path(tokens: &[Address], fees: &[FeeAmount]) -> Bytes {
    debug_assert_eq!(tokens.len(), fees.len() + 1);

    let mut path = Vec::with_capacity(tokens.len() * 20 + fees.len() * 3);
    for (i, token) in tokens.iter().enumerate() {
        path.extend_from_slice(token.as_slice());
        if let Some(fee) = fees.get(i) {
            path.extend_from_slice(&fee.as_u32().to_be_bytes()[1..]);
        }
    }
    path.into()
}

/// Walks `hops` from `input`, returning the token path. Each hop must contain the current token.
fn walk_path<'h, H>(
    hops: &'h [H],
    input: &TokenRecord,
    counterpart: impl Fn(&'h H, Address) -> Option<&'h TokenRecord>,
) -> ServiceResult<Vec<TokenRecord>> {
    if hops.is_empty() {
        return Err(ServiceError::InvalidTrade("route has no pools".to_string()));
    }

    let mut path = vec![input.clone()];
    for (i, hop) in hops.iter().enumerate() {
        let current = path[path.len() - 1].address;
        let next = counterpart(hop, current).ok_or_else(|| {
            ServiceError::InvalidTrade(format!("pool #{i} of the route does not contain {current}"))
        })?;
        path.push(next.clone());
    }
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Route {
    pub pairs: Vec<PairSnapshot>,
    pub path: Vec<TokenRecord>,
}

impl V2Route {
    pub fn new(pairs: Vec<PairSnapshot>, input: &TokenRecord) -> ServiceResult<Self> {
        let path = walk_path(&pairs, input, |pair, token| pair.counterpart(token))?;
        Ok(Self { pairs, path })
    }

    pub fn path_addresses(&self) -> Vec<Address> {
        self.path.iter().map(|token| token.address).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Route {
    pub pools: Vec<PoolSnapshot>,
    pub path: Vec<TokenRecord>,
}

impl V3Route {
    pub fn new(pools: Vec<PoolSnapshot>, input: &TokenRecord) -> ServiceResult<Self> {
        let path = walk_path(&pools, input, |pool, token| pool.counterpart(token))?;
        Ok(Self { pools, path })
    }

    /// Packed path in trade direction, or reversed for exact-output swaps.
    pub fn encoded_path(&self, trade_type: TradeType) -> Bytes {
        let mut tokens: Vec<Address> = self.path.iter().map(|token| token.address).collect();
        let mut fees: Vec<FeeAmount> = self.pools.iter().map(|pool| pool.fee).collect();

        if trade_type == TradeType::ExactOutput {
            tokens.reverse();
            fees.reverse();
        }
        encode_v3_path(&tokens, &fees)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    V2(PairSnapshot),
    V3(PoolSnapshot),
}

impl Hop {
    fn counterpart(&self, token: Address) -> Option<&TokenRecord> {
        match self {
            Hop::V2(pair) => pair.counterpart(token),
            Hop::V3(pool) => pool.counterpart(token),
        }
    }
}

/// A consecutive run of hops on the same protocol inside a mixed route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSection {
    V2 { path: Vec<Address> },
    V3 { path: Vec<Address>, fees: Vec<FeeAmount> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedRoute {
    pub hops: Vec<Hop>,
    pub path: Vec<TokenRecord>,
}

impl MixedRoute {
    pub fn new(hops: Vec<Hop>, input: &TokenRecord) -> ServiceResult<Self> {
        let path = walk_path(&hops, input, |hop, token| hop.counterpart(token))?;
        Ok(Self { hops, path })
    }

    /// Splits the route into single-protocol sections, each swapped by one router call.
    pub fn sections(&self) -> Vec<RouteSection> {
        let mut sections: Vec<RouteSection> = Vec::new();

        for (i, hop) in self.hops.iter().enumerate() {
            let (from, to) = (self.path[i].address, self.path[i + 1].address);

            match (hop, sections.last_mut()) {
                (Hop::V2(_), Some(RouteSection::V2 { path })) => path.push(to),
                (Hop::V3(pool), Some(RouteSection::V3 { path, fees })) => {
                    path.push(to);
                    fees.push(pool.fee);
                }
                (Hop::V2(_), _) => sections.push(RouteSection::V2 {
                    path: vec![from, to],
                }),
                (Hop::V3(pool), _) => sections.push(RouteSection::V3 {
                    path: vec![from, to],
                    fees: vec![pool.fee],
                }),
            }
        }

        sections
    }
}

/// A route priced for one amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTrade<R> {
    pub route: R,
    pub input_amount: U256,
    pub output_amount: U256,
    pub trade_type: TradeType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trade {
    V2(RouteTrade<V2Route>),
    V3(RouteTrade<V3Route>),
    Mixed(RouteTrade<MixedRoute>),
}

impl Trade {
    pub fn path(&self) -> &[TokenRecord] {
        match self {
            Trade::V2(trade) => &trade.route.path,
            Trade::V3(trade) => &trade.route.path,
            Trade::Mixed(trade) => &trade.route.path,
        }
    }

    pub fn input_token(&self) -> &TokenRecord {
        &self.path()[0]
    }

    pub fn output_token(&self) -> &TokenRecord {
        &self.path()[self.path().len() - 1]
    }

    pub fn amounts(&self) -> (U256, U256) {
        match self {
            Trade::V2(trade) => (trade.input_amount, trade.output_amount),
            Trade::V3(trade) => (trade.input_amount, trade.output_amount),
            Trade::Mixed(trade) => (trade.input_amount, trade.output_amount),
        }
    }

    pub fn trade_type(&self) -> TradeType {
        match self {
            Trade::V2(trade) => trade.trade_type,
            Trade::V3(trade) => trade.trade_type,
            Trade::Mixed(trade) => trade.trade_type,
        }
    }

    /// Mid price of the whole route, output per input, in whole tokens.
    pub fn mid_price(&self) -> ServiceResult<Decimal> {
        let mut price = Decimal::ONE;
        let path = self.path();

        let hop_prices: Vec<ServiceResult<Decimal>> = match self {
            Trade::V2(trade) => trade
                .route
                .pairs
                .iter()
                .enumerate()
                .map(|(i, pair)| pair.mid_price(path[i].address))
                .collect(),
            Trade::V3(trade) => trade
                .route
                .pools
                .iter()
                .enumerate()
                .map(|(i, pool)| pool.mid_price(path[i].address))
                .collect(),
            Trade::Mixed(trade) => trade
                .route
                .hops
                .iter()
                .enumerate()
                .map(|(i, hop)| match hop {
                    Hop::V2(pair) => pair.mid_price(path[i].address),
                    Hop::V3(pool) => pool.mid_price(path[i].address),
                })
                .collect(),
        };

        for hop_price in hop_prices {
            price = price.checked_mul(hop_price?).ok_or_else(|| {
                ServiceError::InternalError("route mid price overflow".to_string())
            })?;
        }
        Ok(price)
    }
}

/// All routes of one swap, grouped by protocol, sharing a trade type and token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTrade {
    pub v2_routes: Vec<RouteTrade<V2Route>>,
    pub v3_routes: Vec<RouteTrade<V3Route>>,
    pub mixed_routes: Vec<RouteTrade<MixedRoute>>,
    pub trade_type: TradeType,
    pub input_token: TokenRecord,
    pub output_token: TokenRecord,
}

impl AggregateTrade {
    pub fn from_trades(trades: Vec<Trade>) -> ServiceResult<Self> {
        let first = trades
            .first()
            .ok_or_else(|| ServiceError::InvalidTrade("no trades to combine".to_string()))?;

        let trade_type = first.trade_type();
        let input_token = first.input_token().clone();
        let output_token = first.output_token().clone();

        let mut aggregate = AggregateTrade {
            v2_routes: Vec::new(),
            v3_routes: Vec::new(),
            mixed_routes: Vec::new(),
            trade_type,
            input_token,
            output_token,
        };

        for trade in trades {
            if trade.trade_type() != trade_type {
                return Err(ServiceError::InvalidTrade(
                    "all trades must share one trade type".to_string(),
                ));
            }
            if trade.input_token().address != aggregate.input_token.address
                || trade.output_token().address != aggregate.output_token.address
            {
                return Err(ServiceError::InvalidTrade(
                    "all trades must swap the same input and output tokens".to_string(),
                ));
            }

            match trade {
                Trade::V2(route) => aggregate.v2_routes.push(route),
                Trade::V3(route) => aggregate.v3_routes.push(route),
                Trade::Mixed(route) => {
                    if route.trade_type == TradeType::ExactOutput {
                        return Err(ServiceError::InvalidTrade(
                            "mixed routes only support exact input".to_string(),
                        ));
                    }
                    aggregate.mixed_routes.push(route);
                }
            }
        }

        Ok(aggregate)
    }

    pub fn route_count(&self) -> usize {
        self.v2_routes.len() + self.v3_routes.len() + self.mixed_routes.len()
    }

    pub fn input_amount(&self) -> U256 {
        self.v2_routes.iter().map(|r| r.input_amount).sum::<U256>()
            + self.v3_routes.iter().map(|r| r.input_amount).sum::<U256>()
            + self.mixed_routes.iter().map(|r| r.input_amount).sum::<U256>()
    }

    pub fn output_amount(&self) -> U256 {
        self.v2_routes.iter().map(|r| r.output_amount).sum::<U256>()
            + self.v3_routes.iter().map(|r| r.output_amount).sum::<U256>()
            + self.mixed_routes.iter().map(|r| r.output_amount).sum::<U256>()
    }

    /// Bound on the total output for exact-input trades; the quoted output otherwise.
    pub fn minimum_amount_out(&self, slippage: Decimal) -> U256 {
        match self.trade_type {
            TradeType::ExactInput => calculate_minimum_output(self.output_amount(), slippage),
            TradeType::ExactOutput => self.output_amount(),
        }
    }

    /// Bound on the total input for exact-output trades; the quoted input otherwise.
    pub fn maximum_amount_in(&self, slippage: Decimal) -> U256 {
        match self.trade_type {
            TradeType::ExactInput => self.input_amount(),
            TradeType::ExactOutput => calculate_maximum_input(self.input_amount(), slippage),
        }
    }

    /// Output per input in whole tokens.
    pub fn execution_price(&self) -> ServiceResult<Decimal> {
        calculate_exchange_rate(
            self.input_amount(),
            self.output_amount(),
            self.input_token.decimals,
            self.output_token.decimals,
        )
    }
}

/// Prices routes through the quoter and the V2 router.
pub struct TradeBuilder<'a> {
    repository: &'a dyn EthereumRepository,
}

impl<'a> TradeBuilder<'a> {
    pub fn new(repository: &'a dyn EthereumRepository) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, route), fields(hops = route.pools.len()), err)]
    pub async fn v3_trade(
        &self,
        route: V3Route,
        amount: U256,
        trade_type: TradeType,
    ) -> ServiceResult<Trade> {
        let input = route.path[0].address;
        let output = route.path[route.path.len() - 1].address;

        let quoted = match (route.pools.as_slice(), trade_type) {
            ([pool], TradeType::ExactInput) => {
                self.repository
                    .quote_exact_input_single(input, output, pool.fee.as_u32(), amount)
                    .await?
            }
            ([pool], TradeType::ExactOutput) => {
                self.repository
                    .quote_exact_output_single(input, output, pool.fee.as_u32(), amount)
                    .await?
            }
            (_, TradeType::ExactInput) => {
                self.repository
                    .quote_exact_input(route.encoded_path(trade_type), amount)
                    .await?
            }
            (_, TradeType::ExactOutput) => {
                self.repository
                    .quote_exact_output(route.encoded_path(trade_type), amount)
                    .await?
            }
        };

        let (input_amount, output_amount) = Self::amounts(amount, quoted, trade_type)?;
        Ok(Trade::V3(RouteTrade {
            route,
            input_amount,
            output_amount,
            trade_type,
        }))
    }

    #[instrument(skip(self, route), fields(hops = route.pairs.len()), err)]
    pub async fn v2_trade(
        &self,
        route: V2Route,
        amount: U256,
        trade_type: TradeType,
    ) -> ServiceResult<Trade> {
        let path = route.path_addresses();

        let quoted = match trade_type {
            TradeType::ExactInput => self
                .repository
                .get_v2_amounts_out(amount, path)
                .await?
                .last()
                .copied(),
            TradeType::ExactOutput => self
                .repository
                .get_v2_amounts_in(amount, path)
                .await?
                .first()
                .copied(),
        }
        .ok_or_else(|| ServiceError::InvalidTrade("router returned no amounts".to_string()))?;

        let (input_amount, output_amount) = Self::amounts(amount, quoted, trade_type)?;
        Ok(Trade::V2(RouteTrade {
            route,
            input_amount,
            output_amount,
            trade_type,
        }))
    }

    /// Exact-input only: each section is quoted with the previous section's output.
    #[instrument(skip(self, route), fields(hops = route.hops.len()), err)]
    pub async fn mixed_trade(&self, route: MixedRoute, amount_in: U256) -> ServiceResult<Trade> {
        let mut amount = amount_in;

        for section in route.sections() {
            amount = match section {
                RouteSection::V2 { path } => self
                    .repository
                    .get_v2_amounts_out(amount, path)
                    .await?
                    .last()
                    .copied()
                    .ok_or_else(|| {
                        ServiceError::InvalidTrade("router returned no amounts".to_string())
                    })?,
                RouteSection::V3 { path, fees } if fees.len() == 1 => {
                    self.repository
                        .quote_exact_input_single(path[0], path[1], fees[0].as_u32(), amount)
                        .await?
                }
                RouteSection::V3 { path, fees } => {
                    self.repository
                        .quote_exact_input(encode_v3_path(&path, &fees), amount)
                        .await?
                }
            };
        }

        let (input_amount, output_amount) = Self::amounts(amount_in, amount, TradeType::ExactInput)?;
        Ok(Trade::Mixed(RouteTrade {
            route,
            input_amount,
            output_amount,
            trade_type: TradeType::ExactInput,
        }))
    }

    fn amounts(specified: U256, quoted: U256, trade_type: TradeType) -> ServiceResult<(U256, U256)> {
        if quoted.is_zero() {
            return Err(ServiceError::InsufficientLiquidity(format!(
                "quote for {specified} returned zero"
            )));
        }

        Ok(match trade_type {
            TradeType::ExactInput => (specified, quoted),
            TradeType::ExactOutput => (quoted, specified),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const DAI: Address = address!("0x6B175474E89094C44Da98b954EedeAC495271d0F");

    fn token(address: Address, symbol: &str, decimals: u8) -> TokenRecord {
        TokenRecord {
            chain_id: 1,
            address,
            decimals,
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            balance: U256::ZERO,
        }
    }

    fn pool(a: TokenRecord, b: TokenRecord, fee: FeeAmount) -> PoolSnapshot {
        let (t0, t1) = if a.sorts_before(&b) { (a, b) } else { (b, a) };
        PoolSnapshot::new(Address::ZERO, t0, t1, fee, U256::from(1u64) << 96usize, 1_000, 0)
            .unwrap()
    }

    fn pair(a: TokenRecord, b: TokenRecord) -> PairSnapshot {
        let (t0, t1) = if a.sorts_before(&b) { (a, b) } else { (b, a) };
        PairSnapshot {
            address: Address::ZERO,
            token0: t0,
            token1: t1,
            reserve0: U256::from(1_000_000u64),
            reserve1: U256::from(1_000_000u64),
        }
    }

    fn usdc() -> TokenRecord {
        token(USDC, "USDC", 6)
    }
    fn weth() -> TokenRecord {
        token(WETH, "WETH", 18)
    }
    fn dai() -> TokenRecord {
        token(DAI, "DAI", 18)
    }

    fn v3_trade(trade_type: TradeType) -> Trade {
        let route = V3Route::new(vec![pool(weth(), usdc(), FeeAmount::Low)], &weth()).unwrap();
        Trade::V3(RouteTrade {
            route,
            input_amount: U256::from(100u64),
            output_amount: U256::from(200u64),
            trade_type,
        })
    }

    fn v2_trade() -> Trade {
        let route = V2Route::new(vec![pair(weth(), usdc())], &weth()).unwrap();
        Trade::V2(RouteTrade {
            route,
            input_amount: U256::from(50u64),
            output_amount: U256::from(90u64),
            trade_type: TradeType::ExactInput,
        })
    }

    fn mixed_trade(trade_type: TradeType) -> Trade {
        let route = MixedRoute::new(
            vec![
                Hop::V2(pair(weth(), dai())),
                Hop::V3(pool(dai(), usdc(), FeeAmount::Lowest)),
            ],
            &weth(),
        )
        .unwrap();
        Trade::Mixed(RouteTrade {
            route,
            input_amount: U256::from(10u64),
            output_amount: U256::from(19u64),
            trade_type,
        })
    }

    #[test]
    fn test_encode_v3_path_layout() {
        let path = encode_v3_path(&[WETH, USDC], &[FeeAmount::Medium]);

        assert_eq!(path.len(), 43);
        assert_eq!(&path[..20], WETH.as_slice());
        assert_eq!(&path[20..23], &[0x00, 0x0b, 0xb8]);
        assert_eq!(&path[23..], USDC.as_slice());
    }

    #[test]
    fn test_route_path_follows_input() {
        let route = V3Route::new(
            vec![pool(weth(), dai(), FeeAmount::Low), pool(dai(), usdc(), FeeAmount::Lowest)],
            &weth(),
        )
        .unwrap();

        let symbols: Vec<&str> = route.path.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["WETH", "DAI", "USDC"]);

        let reversed = route.encoded_path(TradeType::ExactOutput);
        assert_eq!(&reversed[..20], USDC.as_slice());
        assert_eq!(&reversed[20..23], &100u32.to_be_bytes()[1..]);
    }

    #[test]
    fn test_disconnected_route_is_rejected() {
        let result = V3Route::new(vec![pool(dai(), usdc(), FeeAmount::Low)], &weth());
        assert!(matches!(result, Err(ServiceError::InvalidTrade(_))));

        let empty = V2Route::new(vec![], &weth());
        assert!(empty.is_err());
    }

    #[test]
    fn test_mixed_route_sections() {
        let route = MixedRoute::new(
            vec![
                Hop::V2(pair(weth(), dai())),
                Hop::V3(pool(dai(), usdc(), FeeAmount::Lowest)),
                Hop::V3(pool(usdc(), weth(), FeeAmount::Low)),
            ],
            &weth(),
        )
        .unwrap();

        assert_eq!(
            route.sections(),
            vec![
                RouteSection::V2 { path: vec![WETH, DAI] },
                RouteSection::V3 {
                    path: vec![DAI, USDC, WETH],
                    fees: vec![FeeAmount::Lowest, FeeAmount::Low],
                },
            ]
        );
    }

    #[test]
    fn test_aggregate_partitions_by_variant() {
        let aggregate = AggregateTrade::from_trades(vec![
            v3_trade(TradeType::ExactInput),
            v2_trade(),
            mixed_trade(TradeType::ExactInput),
        ])
        .unwrap();

        assert_eq!(aggregate.v2_routes.len(), 1);
        assert_eq!(aggregate.v3_routes.len(), 1);
        assert_eq!(aggregate.mixed_routes.len(), 1);
        assert_eq!(aggregate.route_count(), 3);
        assert_eq!(aggregate.input_amount(), U256::from(160u64));
        assert_eq!(aggregate.output_amount(), U256::from(309u64));
        assert_eq!(aggregate.trade_type, TradeType::ExactInput);
        assert_eq!(aggregate.input_token.symbol, "WETH");
        assert_eq!(aggregate.output_token.symbol, "USDC");
    }

    #[test]
    fn test_aggregate_rejects_inconsistent_trades() {
        assert!(AggregateTrade::from_trades(vec![]).is_err());

        let mixed_types =
            AggregateTrade::from_trades(vec![v3_trade(TradeType::ExactOutput), v2_trade()]);
        assert!(mixed_types.is_err());

        let exact_output_mixed =
            AggregateTrade::from_trades(vec![mixed_trade(TradeType::ExactOutput)]);
        assert!(exact_output_mixed.is_err());

        let reversed = V2Route::new(vec![pair(weth(), usdc())], &usdc()).unwrap();
        let other_direction = Trade::V2(RouteTrade {
            route: reversed,
            input_amount: U256::from(1u64),
            output_amount: U256::from(1u64),
            trade_type: TradeType::ExactInput,
        });
        assert!(AggregateTrade::from_trades(vec![v2_trade(), other_direction]).is_err());
    }

    #[test]
    fn test_slippage_bounds_follow_trade_type() {
        let slippage = Decimal::new(5, 1);

        let exact_in = AggregateTrade::from_trades(vec![v2_trade()]).unwrap();
        assert_eq!(exact_in.minimum_amount_out(slippage), U256::from(89u64));
        assert_eq!(exact_in.maximum_amount_in(slippage), U256::from(50u64));

        let exact_out =
            AggregateTrade::from_trades(vec![v3_trade(TradeType::ExactOutput)]).unwrap();
        assert_eq!(exact_out.minimum_amount_out(slippage), U256::from(200u64));
        assert_eq!(exact_out.maximum_amount_in(slippage), U256::from(100u64));
    }

    #[test]
    fn test_trade_mid_price_multiplies_hops() {
        // WETH/DAI reserves are balanced; the DAI/USDC pool has a raw price of 1,
        // so only the 18 vs 6 decimals move the route price.
        let price = mixed_trade(TradeType::ExactInput).mid_price().unwrap();
        assert_eq!(price, Decimal::from(1_000_000_000_000u64));
    }
}
