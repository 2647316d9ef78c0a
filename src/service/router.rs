//! SwapRouter02 call parameters for an aggregate trade.
//!
//! Every route becomes one or more router calls; the calls are wrapped in
//! `multicall(deadline, data)` so the whole swap shares a single deadline.

use alloy::primitives::{Address, Bytes, U256, address, aliases::{U24, U160}};
use alloy::sol_types::SolCall;
use rust_decimal::Decimal;

use crate::repository::contract::ISwapRouter02;
use crate::service::trade::{
    AggregateTrade, RouteSection, RouteTrade, TradeType, V2Route, V3Route, encode_v3_path,
};
use crate::service::utils::{calculate_maximum_input, calculate_minimum_output};
use crate::service::{ServiceError, ServiceResult};

/// Router sentinel recipient: keep the output inside the router for the next call.
pub const ADDRESS_THIS: Address = address!("0x0000000000000000000000000000000000000002");

/// Router sentinel amount: spend the router's whole balance of the input token.
pub const CONTRACT_BALANCE: U256 = U256::ZERO;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOptions {
    /// Percent, e.g. `0.5` for 0.5%.
    pub slippage_tolerance: Decimal,
    pub recipient: Address,
    /// Unix timestamp after which the router reverts.
    pub deadline: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameters {
    pub calldata: Bytes,
    pub value: U256,
}

/// Encodes the router calls that execute `trade` under `options`.
pub fn swap_call_parameters(
    trade: &AggregateTrade,
    options: &SwapOptions,
) -> ServiceResult<MethodParameters> {
    if trade.route_count() == 0 {
        return Err(ServiceError::InvalidTrade("trade has no routes".to_string()));
    }

    let mut calls: Vec<Bytes> = Vec::with_capacity(trade.route_count());

    for route in &trade.v2_routes {
        calls.push(encode_v2_swap(route, options));
    }
    for route in &trade.v3_routes {
        calls.push(encode_v3_swap(route, options));
    }
    for route in &trade.mixed_routes {
        if route.trade_type != TradeType::ExactInput {
            return Err(ServiceError::InvalidTrade(
                "mixed routes only support exact input".to_string(),
            ));
        }

        let min_out = calculate_minimum_output(route.output_amount, options.slippage_tolerance);
        calls.extend(encode_mixed_swap(
            route.route.sections(),
            route.input_amount,
            min_out,
            options.recipient,
        ));
    }

    let calldata = ISwapRouter02::multicallCall {
        deadline: options.deadline,
        data: calls,
    }
    .abi_encode();

    Ok(MethodParameters {
        calldata: calldata.into(),
        // ERC20 in, ERC20 out: nothing to wrap
        value: U256::ZERO,
    })
}

fn encode_v2_swap(route: &RouteTrade<V2Route>, options: &SwapOptions) -> Bytes {
    let path = route.route.path_addresses();

    let call = match route.trade_type {
        TradeType::ExactInput => ISwapRouter02::swapExactTokensForTokensCall {
            amountIn: route.input_amount,
            amountOutMin: calculate_minimum_output(
                route.output_amount,
                options.slippage_tolerance,
            ),
            path,
            to: options.recipient,
        }
        .abi_encode(),
        TradeType::ExactOutput => ISwapRouter02::swapTokensForExactTokensCall {
            amountOut: route.output_amount,
            amountInMax: calculate_maximum_input(route.input_amount, options.slippage_tolerance),
            path,
            to: options.recipient,
        }
        .abi_encode(),
    };

    call.into()
}

fn encode_v3_swap(route: &RouteTrade<V3Route>, options: &SwapOptions) -> Bytes {
    let tokens = &route.route.path;
    let recipient = options.recipient;

    let call = match (route.route.pools.as_slice(), route.trade_type) {
        ([pool], TradeType::ExactInput) => ISwapRouter02::exactInputSingleCall {
            params: ISwapRouter02::ExactInputSingleParams {
                tokenIn: tokens[0].address,
                tokenOut: tokens[1].address,
                fee: U24::from(pool.fee.as_u32()),
                recipient,
                amountIn: route.input_amount,
                amountOutMinimum: calculate_minimum_output(
                    route.output_amount,
                    options.slippage_tolerance,
                ),
                sqrtPriceLimitX96: U160::ZERO,
            },
        }
        .abi_encode(),
        ([pool], TradeType::ExactOutput) => ISwapRouter02::exactOutputSingleCall {
            params: ISwapRouter02::ExactOutputSingleParams {
                tokenIn: tokens[0].address,
                tokenOut: tokens[1].address,
                fee: U24::from(pool.fee.as_u32()),
                recipient,
                amountOut: route.output_amount,
                amountInMaximum: calculate_maximum_input(
                    route.input_amount,
                    options.slippage_tolerance,
                ),
                sqrtPriceLimitX96: U160::ZERO,
            },
        }
        .abi_encode(),
        (_, TradeType::ExactInput) => ISwapRouter02::exactInputCall {
            params: ISwapRouter02::ExactInputParams {
                path: route.route.encoded_path(TradeType::ExactInput),
                recipient,
                amountIn: route.input_amount,
                amountOutMinimum: calculate_minimum_output(
                    route.output_amount,
                    options.slippage_tolerance,
                ),
            },
        }
        .abi_encode(),
        (_, TradeType::ExactOutput) => ISwapRouter02::exactOutputCall {
            params: ISwapRouter02::ExactOutputParams {
                path: route.route.encoded_path(TradeType::ExactOutput),
                recipient,
                amountOut: route.output_amount,
                amountInMaximum: calculate_maximum_input(
                    route.input_amount,
                    options.slippage_tolerance,
                ),
            },
        }
        .abi_encode(),
    };

    call.into()
}

/// One router call per section. Only the last section pays the recipient and
/// enforces the minimum output; later sections spend what the router holds.
fn encode_mixed_swap(
    sections: Vec<RouteSection>,
    amount_in: U256,
    min_out: U256,
    recipient: Address,
) -> Vec<Bytes> {
    let last = sections.len().saturating_sub(1);

    sections
        .into_iter()
        .enumerate()
        .map(|(i, section)| {
            let amount_in = if i == 0 { amount_in } else { CONTRACT_BALANCE };
            let (to, min_out) = if i == last {
                (recipient, min_out)
            } else {
                (ADDRESS_THIS, U256::ZERO)
            };

            let call = match section {
                RouteSection::V2 { path } => ISwapRouter02::swapExactTokensForTokensCall {
                    amountIn: amount_in,
                    amountOutMin: min_out,
                    path,
                    to,
                }
                .abi_encode(),
                RouteSection::V3 { path, fees } => ISwapRouter02::exactInputCall {
                    params: ISwapRouter02::ExactInputParams {
                        path: encode_v3_path(&path, &fees),
                        recipient: to,
                        amountIn: amount_in,
                        amountOutMinimum: min_out,
                    },
                }
                .abi_encode(),
            };

            Bytes::from(call)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::pool::{FeeAmount, PairSnapshot, PoolSnapshot};
    use crate::service::token::TokenRecord;
    use crate::service::trade::{Hop, MixedRoute, Trade};

    const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const DAI: Address = address!("0x6B175474E89094C44Da98b954EedeAC495271d0F");
    const RECIPIENT: Address = address!("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

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
            reserve0: U256::from(1_000u64),
            reserve1: U256::from(1_000u64),
        }
    }

    fn weth() -> TokenRecord {
        token(WETH, "WETH", 18)
    }
    fn usdc() -> TokenRecord {
        token(USDC, "USDC", 6)
    }
    fn dai() -> TokenRecord {
        token(DAI, "DAI", 18)
    }

    fn options() -> SwapOptions {
        SwapOptions {
            slippage_tolerance: Decimal::new(5, 1),
            recipient: RECIPIENT,
            deadline: U256::from(1_700_000_000u64),
        }
    }

    fn decode_multicall(params: &MethodParameters) -> ISwapRouter02::multicallCall {
        ISwapRouter02::multicallCall::abi_decode(&params.calldata).unwrap()
    }

    #[test]
    fn test_single_pool_exact_input_encodes_exact_input_single() {
        let route = V3Route::new(vec![pool(weth(), usdc(), FeeAmount::Medium)], &weth()).unwrap();
        let trade = AggregateTrade::from_trades(vec![Trade::V3(RouteTrade {
            route,
            input_amount: U256::from(1_000u64),
            output_amount: U256::from(2_000u64),
            trade_type: TradeType::ExactInput,
        })])
        .unwrap();

        let params = swap_call_parameters(&trade, &options()).unwrap();
        assert_eq!(params.value, U256::ZERO);
        assert_eq!(&params.calldata[..4], &ISwapRouter02::multicallCall::SELECTOR);

        let multicall = decode_multicall(&params);
        assert_eq!(multicall.deadline, U256::from(1_700_000_000u64));
        assert_eq!(multicall.data.len(), 1);

        let call = ISwapRouter02::exactInputSingleCall::abi_decode(&multicall.data[0]).unwrap();
        assert_eq!(call.params.tokenIn, WETH);
        assert_eq!(call.params.tokenOut, USDC);
        assert_eq!(call.params.fee, U24::from(3000u32));
        assert_eq!(call.params.recipient, RECIPIENT);
        assert_eq!(call.params.amountIn, U256::from(1_000u64));
        assert_eq!(call.params.amountOutMinimum, U256::from(1_990u64));
    }

    #[test]
    fn test_multi_hop_exact_output_uses_reversed_path() {
        let route = V3Route::new(
            vec![pool(weth(), dai(), FeeAmount::Low), pool(dai(), usdc(), FeeAmount::Lowest)],
            &weth(),
        )
        .unwrap();
        let trade = AggregateTrade::from_trades(vec![Trade::V3(RouteTrade {
            route,
            input_amount: U256::from(1_000u64),
            output_amount: U256::from(500u64),
            trade_type: TradeType::ExactOutput,
        })])
        .unwrap();

        let multicall = decode_multicall(&swap_call_parameters(&trade, &options()).unwrap());
        let call = ISwapRouter02::exactOutputCall::abi_decode(&multicall.data[0]).unwrap();

        assert_eq!(&call.params.path[..20], USDC.as_slice());
        assert_eq!(&call.params.path[call.params.path.len() - 20..], WETH.as_slice());
        assert_eq!(call.params.amountOut, U256::from(500u64));
        assert_eq!(call.params.amountInMaximum, U256::from(1_005u64));
    }

    #[test]
    fn test_v2_route_encodes_router_v2_call() {
        let route = V2Route::new(vec![pair(weth(), usdc())], &weth()).unwrap();
        let trade = AggregateTrade::from_trades(vec![Trade::V2(RouteTrade {
            route,
            input_amount: U256::from(100u64),
            output_amount: U256::from(1_000u64),
            trade_type: TradeType::ExactInput,
        })])
        .unwrap();

        let multicall = decode_multicall(&swap_call_parameters(&trade, &options()).unwrap());
        assert_eq!(
            &multicall.data[0][..4],
            &ISwapRouter02::swapExactTokensForTokensCall::SELECTOR
        );

        let call =
            ISwapRouter02::swapExactTokensForTokensCall::abi_decode(&multicall.data[0]).unwrap();
        assert_eq!(call.path, vec![WETH, USDC]);
        assert_eq!(call.amountOutMin, U256::from(995u64));
        assert_eq!(call.to, RECIPIENT);
    }

    #[test]
    fn test_mixed_route_chains_sections_through_router() {
        let route = MixedRoute::new(
            vec![
                Hop::V2(pair(weth(), dai())),
                Hop::V3(pool(dai(), usdc(), FeeAmount::Lowest)),
            ],
            &weth(),
        )
        .unwrap();
        let trade = AggregateTrade::from_trades(vec![Trade::Mixed(RouteTrade {
            route,
            input_amount: U256::from(1_000u64),
            output_amount: U256::from(2_000u64),
            trade_type: TradeType::ExactInput,
        })])
        .unwrap();

        let multicall = decode_multicall(&swap_call_parameters(&trade, &options()).unwrap());
        assert_eq!(multicall.data.len(), 2);

        let first =
            ISwapRouter02::swapExactTokensForTokensCall::abi_decode(&multicall.data[0]).unwrap();
        assert_eq!(first.amountIn, U256::from(1_000u64));
        assert_eq!(first.amountOutMin, U256::ZERO);
        assert_eq!(first.to, ADDRESS_THIS);

        let second = ISwapRouter02::exactInputCall::abi_decode(&multicall.data[1]).unwrap();
        assert_eq!(second.params.amountIn, CONTRACT_BALANCE);
        assert_eq!(second.params.amountOutMinimum, U256::from(1_990u64));
        assert_eq!(second.params.recipient, RECIPIENT);
        assert_eq!(&second.params.path[..20], DAI.as_slice());
    }

    #[test]
    fn test_every_route_becomes_one_call() {
        let v3 = V3Route::new(vec![pool(weth(), usdc(), FeeAmount::Low)], &weth()).unwrap();
        let v2 = V2Route::new(vec![pair(weth(), usdc())], &weth()).unwrap();
        let trade = AggregateTrade::from_trades(vec![
            Trade::V3(RouteTrade {
                route: v3,
                input_amount: U256::from(60u64),
                output_amount: U256::from(120u64),
                trade_type: TradeType::ExactInput,
            }),
            Trade::V2(RouteTrade {
                route: v2,
                input_amount: U256::from(40u64),
                output_amount: U256::from(79u64),
                trade_type: TradeType::ExactInput,
            }),
        ])
        .unwrap();

        let multicall = decode_multicall(&swap_call_parameters(&trade, &options()).unwrap());
        assert_eq!(multicall.data.len(), 2);
        // V2 routes are encoded first
        assert_eq!(
            &multicall.data[0][..4],
            &ISwapRouter02::swapExactTokensForTokensCall::SELECTOR
        );
        assert_eq!(
            &multicall.data[1][..4],
            &ISwapRouter02::exactInputSingleCall::SELECTOR
        );
    }
}
