//! Pool addressing and on-chain pool state reconstruction.
//!
//! Pool addresses are derived with CREATE2 from the factory, so the token
//! order passed in never changes the result. A V3 snapshot carries a two-entry
//! liquidity distribution (+L at the lowest usable tick, -L at the highest)
//! instead of the pool's real tick map; quoting goes through the on-chain
//! quoter, so the snapshot only feeds the liquidity check and the mid price.

use std::fmt;

use alloy::primitives::{Address, B256, U256, U512, keccak256};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::repository::EthereumRepository;
use crate::service::token::TokenRecord;
use crate::service::utils::u256_to_decimal;
use crate::service::{ServiceError, ServiceResult};

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// Fixed-point precision used when turning `sqrtPriceX96` into a decimal price.
const PRICE_PRECISION: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeAmount {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeAmount {
    /// Fee in hundredths of a basis point.
    pub fn as_u32(self) -> u32 {
        match self {
            FeeAmount::Lowest => 100,
            FeeAmount::Low => 500,
            FeeAmount::Medium => 3000,
            FeeAmount::High => 10000,
        }
    }

    pub fn tick_spacing(self) -> i32 {
        match self {
            FeeAmount::Lowest => 1,
            FeeAmount::Low => 10,
            FeeAmount::Medium => 60,
            FeeAmount::High => 200,
        }
    }
}

impl TryFrom<u32> for FeeAmount {
    type Error = ServiceError;

    fn try_from(fee: u32) -> Result<Self, Self::Error> {
        match fee {
            100 => Ok(FeeAmount::Lowest),
            500 => Ok(FeeAmount::Low),
            3000 => Ok(FeeAmount::Medium),
            10000 => Ok(FeeAmount::High),
            other => Err(ServiceError::UnsupportedFeeTier(format!(
                "{other} (expected 100, 500, 3000 or 10000)"
            ))),
        }
    }
}

impl fmt::Display for FeeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", Decimal::new(self.as_u32() as i64, 4).normalize())
    }
}

/// Closest tick to `tick` that is a multiple of `tick_spacing` and inside `[MIN_TICK, MAX_TICK]`.
pub fn nearest_usable_tick(tick: i32, tick_spacing: i32) -> i32 {
    debug_assert!(tick_spacing > 0);

    // floor(tick / spacing + 1/2): halves round toward positive infinity
    let rounded = (2 * tick + tick_spacing).div_euclid(2 * tick_spacing) * tick_spacing;
    if rounded < MIN_TICK {
        rounded + tick_spacing
    } else if rounded > MAX_TICK {
        rounded - tick_spacing
    } else {
        rounded
    }
}

/// Orders two token addresses the way Uniswap factories do.
pub fn sort_tokens(token_a: Address, token_b: Address) -> ServiceResult<(Address, Address)> {
    if token_a == token_b {
        return Err(ServiceError::InvalidTrade(format!(
            "cannot build a pool of {token_a} with itself"
        )));
    }

    Ok(if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    })
}

/// Factory address and pool init-code hash of one Uniswap deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryInfo {
    pub factory: Address,
    pub init_code_hash: B256,
}

/// V3 pool address: CREATE2 with `salt = keccak256(abi.encode(token0, token1, fee))`.
pub fn compute_pool_address(
    factory: FactoryInfo,
    token_a: Address,
    token_b: Address,
    fee: FeeAmount,
) -> ServiceResult<Address> {
    let (token0, token1) = sort_tokens(token_a, token_b)?;

    let mut encoded = [0u8; 96];
    encoded[12..32].copy_from_slice(token0.as_slice());
    encoded[44..64].copy_from_slice(token1.as_slice());
    encoded[64..96].copy_from_slice(&U256::from(fee.as_u32()).to_be_bytes::<32>());

    let salt = keccak256(encoded);
    Ok(factory.factory.create2(salt.0, factory.init_code_hash.0))
}

/// V2 pair address: CREATE2 with `salt = keccak256(token0 ++ token1)`.
pub fn compute_pair_address(
    factory: FactoryInfo,
    token_a: Address,
    token_b: Address,
) -> ServiceResult<Address> {
    let (token0, token1) = sort_tokens(token_a, token_b)?;

    let mut packed = [0u8; 40];
    packed[..20].copy_from_slice(token0.as_slice());
    packed[20..].copy_from_slice(token1.as_slice());

    let salt = keccak256(packed);
    Ok(factory.factory.create2(salt.0, factory.init_code_hash.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickLiquidity {
    pub index: i32,
    pub liquidity_net: i128,
    pub liquidity_gross: u128,
}

/// Two-point stand-in for a pool's tick map: all liquidity spans the full usable range.
pub fn synthetic_ticks(liquidity: u128, fee: FeeAmount) -> ServiceResult<[TickLiquidity; 2]> {
    let net = i128::try_from(liquidity).map_err(|_| {
        ServiceError::InternalError(format!("pool liquidity {liquidity} exceeds i128"))
    })?;
    let spacing = fee.tick_spacing();

    Ok([
        TickLiquidity {
            index: nearest_usable_tick(MIN_TICK, spacing),
            liquidity_net: net,
            liquidity_gross: liquidity,
        },
        TickLiquidity {
            index: nearest_usable_tick(MAX_TICK, spacing),
            liquidity_net: -net,
            liquidity_gross: liquidity,
        },
    ])
}

/// 10^exp as a decimal for |exp| <= 28.
fn pow10(exp: i32) -> Option<Decimal> {
    match exp {
        0..=28 => Some(Decimal::from_i128_with_scale(10i128.pow(exp as u32), 0)),
        -28..=-1 => Some(Decimal::new(1, exp.unsigned_abs())),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub address: Address,
    pub token0: TokenRecord,
    pub token1: TokenRecord,
    pub fee: FeeAmount,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
    pub ticks: [TickLiquidity; 2],
}

impl PoolSnapshot {
    pub fn new(
        address: Address,
        token0: TokenRecord,
        token1: TokenRecord,
        fee: FeeAmount,
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
    ) -> ServiceResult<Self> {
        if !token0.sorts_before(&token1) {
            return Err(ServiceError::InternalError(format!(
                "pool tokens out of order: {} >= {}",
                token0.address, token1.address
            )));
        }

        Ok(Self {
            address,
            token0,
            token1,
            fee,
            sqrt_price_x96,
            liquidity,
            tick,
            ticks: synthetic_ticks(liquidity, fee)?,
        })
    }

    /// The other token of the pair, if `token` belongs to this pool.
    pub fn counterpart(&self, token: Address) -> Option<&TokenRecord> {
        if self.token0.address == token {
            Some(&self.token1)
        } else if self.token1.address == token {
            Some(&self.token0)
        } else {
            None
        }
    }

    /// Active liquidity at `tick` according to the tick entries.
    pub fn liquidity_at(&self, tick: i32) -> u128 {
        let net: i128 = self
            .ticks
            .iter()
            .filter(|entry| entry.index <= tick)
            .map(|entry| entry.liquidity_net)
            .sum();
        u128::try_from(net).unwrap_or(0)
    }

    /// Price of token0 in units of token1, adjusted for decimals.
    pub fn token0_price(&self) -> ServiceResult<Decimal> {
        let sqrt = U512::from(self.sqrt_price_x96);
        let scale = U512::from(10u64).pow(U512::from(PRICE_PRECISION));
        let scaled: U512 = (sqrt * sqrt * scale) >> 192usize;

        let overflow = || {
            ServiceError::InternalError(format!(
                "price of pool {} does not fit a decimal",
                self.address
            ))
        };

        if scaled.bit_len() > 256 {
            return Err(overflow());
        }
        let raw = U256::from_be_slice(&scaled.to_be_bytes::<64>()[32..]);
        let raw_price = u256_to_decimal(raw, PRICE_PRECISION as u8).map_err(|_| overflow())?;

        let shift = self.token0.decimals as i32 - self.token1.decimals as i32;
        pow10(shift)
            .and_then(|factor| raw_price.checked_mul(factor))
            .ok_or_else(overflow)
    }

    /// Mid price as output-per-input when selling `token_in` into the pool.
    pub fn mid_price(&self, token_in: Address) -> ServiceResult<Decimal> {
        let price = self.token0_price()?;

        if token_in == self.token0.address {
            Ok(price)
        } else if token_in == self.token1.address {
            Decimal::ONE.checked_div(price).ok_or_else(|| {
                ServiceError::InsufficientLiquidity(format!("pool {} has zero price", self.address))
            })
        } else {
            Err(ServiceError::InvalidTrade(format!(
                "token {token_in} is not part of pool {}",
                self.address
            )))
        }
    }

    /// Fails when the snapshot shows no usable liquidity at the current tick.
    pub fn ensure_liquidity(&self) -> ServiceResult<()> {
        if self.liquidity == 0 || self.liquidity_at(self.tick) == 0 {
            return Err(ServiceError::InsufficientLiquidity(format!(
                "{}/{} {} pool at {} has no liquidity in range",
                self.token0.symbol, self.token1.symbol, self.fee, self.address
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSnapshot {
    pub address: Address,
    pub token0: TokenRecord,
    pub token1: TokenRecord,
    pub reserve0: U256,
    pub reserve1: U256,
}

impl PairSnapshot {
    pub fn counterpart(&self, token: Address) -> Option<&TokenRecord> {
        if self.token0.address == token {
            Some(&self.token1)
        } else if self.token1.address == token {
            Some(&self.token0)
        } else {
            None
        }
    }

    /// Reserves as `(reserve_in, reserve_out)` when selling `token_in`.
    pub fn reserves_for(&self, token_in: Address) -> ServiceResult<(U256, U256)> {
        if token_in == self.token0.address {
            Ok((self.reserve0, self.reserve1))
        } else if token_in == self.token1.address {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(ServiceError::InvalidTrade(format!(
                "token {token_in} is not part of pair {}",
                self.address
            )))
        }
    }

    /// Mid price as output-per-input when selling `token_in` into the pair.
    pub fn mid_price(&self, token_in: Address) -> ServiceResult<Decimal> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        let (decimals_in, decimals_out) = if token_in == self.token0.address {
            (self.token0.decimals, self.token1.decimals)
        } else {
            (self.token1.decimals, self.token0.decimals)
        };

        crate::service::utils::calculate_exchange_rate(
            reserve_in,
            reserve_out,
            decimals_in,
            decimals_out,
        )
    }

    pub fn ensure_liquidity(&self) -> ServiceResult<()> {
        if self.reserve0.is_zero() || self.reserve1.is_zero() {
            return Err(ServiceError::InsufficientLiquidity(format!(
                "{}/{} pair at {} has empty reserves",
                self.token0.symbol, self.token1.symbol, self.address
            )));
        }
        Ok(())
    }
}

/// Reads pool and pair state for token pairs.
pub struct PoolFetcher<'a> {
    repository: &'a dyn EthereumRepository,
    v3: FactoryInfo,
    v2: FactoryInfo,
}

impl<'a> PoolFetcher<'a> {
    pub fn new(repository: &'a dyn EthereumRepository, v3: FactoryInfo, v2: FactoryInfo) -> Self {
        Self { repository, v3, v2 }
    }

    /// Orders the tokens, derives the pool address, then reads liquidity and slot0 in sequence.
    #[instrument(skip(self, token_a, token_b), fields(a = %token_a.symbol, b = %token_b.symbol), err)]
    pub async fn fetch_pool(
        &self,
        token_a: &TokenRecord,
        token_b: &TokenRecord,
        fee: FeeAmount,
    ) -> ServiceResult<PoolSnapshot> {
        let (token0, token1) = if token_a.sorts_before(token_b) {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };

        let address = compute_pool_address(self.v3, token0.address, token1.address, fee)?;

        let liquidity = self.repository.get_pool_liquidity(address).await?;
        let slot0 = self.repository.get_pool_slot0(address).await?;

        tracing::info!(
            "Fetched {}/{} {} pool {}: liquidity={}, tick={}",
            token0.symbol,
            token1.symbol,
            fee,
            address,
            liquidity,
            slot0.tick
        );

        PoolSnapshot::new(
            address,
            token0.clone(),
            token1.clone(),
            fee,
            slot0.sqrt_price_x96,
            liquidity,
            slot0.tick,
        )
    }

    #[instrument(skip(self, token_a, token_b), fields(a = %token_a.symbol, b = %token_b.symbol), err)]
    pub async fn fetch_pair(
        &self,
        token_a: &TokenRecord,
        token_b: &TokenRecord,
    ) -> ServiceResult<PairSnapshot> {
        let (token0, token1) = if token_a.sorts_before(token_b) {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };

        let address = compute_pair_address(self.v2, token0.address, token1.address)?;
        let (reserve0, reserve1) = self.repository.get_pair_reserves(address).await?;

        tracing::info!(
            "Fetched {}/{} pair {}: reserves=({}, {})",
            token0.symbol,
            token1.symbol,
            address,
            reserve0,
            reserve1
        );

        Ok(PairSnapshot {
            address,
            token0: token0.clone(),
            token1: token1.clone(),
            reserve0,
            reserve1,
        })
    }
}
