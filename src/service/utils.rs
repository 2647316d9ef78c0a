//! Amount formatting, slippage arithmetic and the small display helpers.
//!
//! Amounts travel as `U256` in the token's smallest unit; `Decimal` is only
//! used for human-readable values and percentages.

use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::ServiceResult;
use super::error::ServiceError;

/// Shortens an address for display: first 6 characters, `...`, last 4 characters.
///
/// Strings shorter than 10 characters are returned unchanged.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 10 {
        return address.to_string();
    }

    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Extracts a short display message from a serialized error.
///
/// Looks at `reason` first, then `error.message`. Returns `None` when neither is a
/// non-empty string.
pub fn parse_error_msg(error: &Value) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);

    error
        .get("reason")
        .and_then(non_empty)
        .or_else(|| error.get("error")?.get("message").and_then(non_empty))
}

/// Serializes `error` and runs [`parse_error_msg`] over it.
pub fn error_message<E: Serialize + ?Sized>(error: &E) -> Option<String> {
    serde_json::to_value(error)
        .ok()
        .and_then(|value| parse_error_msg(&value))
}

/// Convert a raw token amount into a `Decimal` of whole tokens
pub fn u256_to_decimal(value: U256, decimals: u8) -> ServiceResult<Decimal> {
    let formatted = format_balance(value, decimals);
    Decimal::from_str(&formatted).map_err(|e| {
        ServiceError::InvalidAmount(format!("{formatted} does not fit a decimal: {e}"))
    })
}

/// Parse a human-readable amount (e.g. "1.5") into the token's smallest unit.
///
/// Rejects empty, negative and zero amounts, and amounts with more fractional
/// digits than the token supports.
///
/// # Examples
/// - "1" with 18 decimals -> 1000000000000000000
/// - "100.5" with 6 decimals -> 100500000
pub fn parse_amount(amount: &str, decimals: u8) -> ServiceResult<U256> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));

    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(ServiceError::InvalidAmount(format!(
            "'{amount}' is not a positive decimal number"
        )));
    }

    if fraction.len() > decimals as usize {
        return Err(ServiceError::InvalidAmount(format!(
            "'{amount}' has more than {decimals} fractional digits"
        )));
    }

    let digits = format!("{whole}{fraction:0<width$}", width = decimals as usize);
    let raw = U256::from_str_radix(&digits, 10)
        .map_err(|e| ServiceError::InvalidAmount(format!("'{amount}' is out of range: {e}")))?;

    if raw.is_zero() {
        return Err(ServiceError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }

    Ok(raw)
}

/// Format an amount from the smallest unit with trailing zeros removed
pub fn format_balance(balance: U256, decimals: u8) -> String {
    let (whole, remainder) = match U256::from(10u64).checked_pow(U256::from(decimals)) {
        Some(divisor) => (balance / divisor, balance % divisor),
        // 10^78 and above exceed U256::MAX, so the whole part is zero
        None => (U256::ZERO, balance),
    };

    if remainder.is_zero() {
        return whole.to_string();
    }

    let padded = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
    format!("{whole}.{}", padded.trim_end_matches('0'))
}

/// Parse a slippage tolerance given in percent ("0.5" for 0.5%).
pub fn parse_slippage(slippage: &str) -> ServiceResult<Decimal> {
    let value = Decimal::from_str(slippage.trim())
        .map_err(|e| ServiceError::InvalidSlippage(format!("'{slippage}': {e}")))?;

    if value.is_sign_negative() || value >= Decimal::ONE_HUNDRED {
        return Err(ServiceError::InvalidSlippage(format!(
            "{value}% is outside [0, 100)"
        )));
    }

    Ok(value)
}

/// Multiplies `amount` by a non-negative decimal factor, rounding down.
fn scale_amount(amount: U256, factor: Decimal) -> U256 {
    let mantissa = factor.mantissa();
    if mantissa < 0 {
        return U256::ZERO;
    }

    let numerator = U256::from(mantissa as u128);
    let denominator = U256::from(10u64).pow(U256::from(factor.scale()));
    amount.saturating_mul(numerator) / denominator
}

/// Minimum acceptable output for an exact-input trade: `amount * (100 - slippage) / 100`
pub fn calculate_minimum_output(amount_out: U256, slippage: Decimal) -> U256 {
    let factor = (Decimal::ONE_HUNDRED - slippage) / Decimal::ONE_HUNDRED;
    scale_amount(amount_out, factor)
}

/// Maximum input for an exact-output trade: `amount * (100 + slippage) / 100`
pub fn calculate_maximum_input(amount_in: U256, slippage: Decimal) -> U256 {
    let factor = (Decimal::ONE_HUNDRED + slippage) / Decimal::ONE_HUNDRED;
    scale_amount(amount_in, factor)
}

/// Units of output token received per unit of input token
pub fn calculate_exchange_rate(
    amount_in: U256,
    amount_out: U256,
    decimals_in: u8,
    decimals_out: u8,
) -> ServiceResult<Decimal> {
    let amount_in = u256_to_decimal(amount_in, decimals_in)?;
    let amount_out = u256_to_decimal(amount_out, decimals_out)?;

    if amount_in.is_zero() {
        return Err(ServiceError::InvalidAmount("Division by zero".to_string()));
    }

    amount_out.checked_div(amount_in).ok_or_else(|| {
        ServiceError::InvalidAmount(format!("{amount_out} / {amount_in} overflows a decimal"))
    })
}

/// Percentage by which the execution price falls short of the mid price.
///
/// Both prices are output-per-input. The result includes the pool fee.
pub fn calculate_price_impact(mid_price: Decimal, execution_price: Decimal) -> Option<Decimal> {
    if mid_price.is_zero() {
        return None;
    }

    let impact = mid_price
        .checked_sub(execution_price)?
        .checked_div(mid_price)?
        .checked_mul(Decimal::ONE_HUNDRED)?;
    Some(impact.round_dp(4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_address_should_work() {
        let address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
        assert_eq!(short_address(address), "0xd8dA...6045");
    }

    #[test]
    fn test_short_address_at_minimum_length() {
        assert_eq!(short_address("0123456789"), "012345...6789");
        assert_eq!(short_address("short"), "short");
    }

    #[test]
    fn test_parse_error_msg_prefers_reason() {
        let error = json!({
            "reason": "insufficient funds",
            "error": { "message": "nested" }
        });
        assert_eq!(parse_error_msg(&error).as_deref(), Some("insufficient funds"));
    }

    #[test]
    fn test_parse_error_msg_falls_back_to_nested_message() {
        let error = json!({ "code": -32603, "error": { "message": "execution reverted" } });
        assert_eq!(parse_error_msg(&error).as_deref(), Some("execution reverted"));
    }

    #[test]
    fn test_parse_error_msg_without_fields_is_none() {
        assert_eq!(parse_error_msg(&json!({ "code": 4001 })), None);
        assert_eq!(parse_error_msg(&json!("plain string")), None);
        assert_eq!(parse_error_msg(&json!({ "reason": "" })), None);
    }

    #[test]
    fn test_error_message_reads_service_error_reason() {
        let err = ServiceError::wallet_not_installed();
        assert_eq!(error_message(&err).as_deref(), Some("Install a wallet!"));
    }

    #[test]
    fn test_u256_to_decimal_usdc_should_work() {
        let raw = U256::from(1000500000u64);
        let usdc = u256_to_decimal(raw, 6).unwrap();
        assert_eq!(usdc.to_string(), "1000.5");
    }

    #[test]
    fn test_parse_amount_eth_should_work() {
        let amount = parse_amount("1.5", 18).unwrap();
        assert_eq!(amount, U256::from(1_500_000_000_000_000_000u128));
    }

    #[test]
    fn test_parse_amount_one_unit() {
        assert_eq!(parse_amount("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_amount(".5", 1).unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert!(parse_amount("", 18).is_err());
        assert!(parse_amount("-1", 18).is_err());
        assert!(parse_amount("0", 18).is_err());
        assert!(parse_amount("1e18", 18).is_err());
        assert!(parse_amount("0.0000001", 6).is_err());
    }

    #[test]
    fn test_format_balance_should_work() {
        assert_eq!(format_balance(U256::from(100500000u64), 6), "100.5");
        assert_eq!(format_balance(U256::from(1_000_000_000_000_000_000u128), 18), "1");
        assert_eq!(format_balance(U256::from(5u64), 3), "0.005");
    }

    #[test]
    fn test_parse_slippage_bounds() {
        assert_eq!(parse_slippage("0.5").unwrap(), Decimal::new(5, 1));
        assert!(parse_slippage("-1").is_err());
        assert!(parse_slippage("100").is_err());
        assert!(parse_slippage("abc").is_err());
    }

    #[test]
    fn test_calculate_minimum_output_should_work() {
        // 1000 tokens with 0.5% slippage = 995 minimum
        let minimum = calculate_minimum_output(U256::from(1000u64), Decimal::new(5, 1));
        assert_eq!(minimum, U256::from(995u64));
    }

    #[test]
    fn test_calculate_minimum_output_rounds_down() {
        let minimum = calculate_minimum_output(U256::from(999u64), Decimal::new(5, 1));
        assert_eq!(minimum, U256::from(994u64));
    }

    #[test]
    fn test_calculate_maximum_input_should_work() {
        let maximum = calculate_maximum_input(U256::from(1000u64), Decimal::new(5, 1));
        assert_eq!(maximum, U256::from(1005u64));
    }

    #[test]
    fn test_calculate_exchange_rate_should_work() {
        // 1 WETH = 2000 USDC
        let amount_in = U256::from(1_000_000_000_000_000_000u128);
        let amount_out = U256::from(2_000_000_000u64);

        let rate = calculate_exchange_rate(amount_in, amount_out, 18, 6).unwrap();
        assert_eq!(rate, Decimal::from(2000));
    }

    #[test]
    fn test_calculate_price_impact() {
        let impact = calculate_price_impact(Decimal::from(2000), Decimal::from(1990)).unwrap();
        assert_eq!(impact, Decimal::new(5, 1));
        assert_eq!(calculate_price_impact(Decimal::ZERO, Decimal::ONE), None);
    }

    #[test]
    fn test_calculate_exchange_rate_overflow_is_an_error() {
        // 1 wei in, 10^28 units of a zero-decimal token out
        let amount_out = U256::from(10u64).pow(U256::from(28u64));

        let result = calculate_exchange_rate(U256::from(1u64), amount_out, 18, 0);
        assert!(matches!(result, Err(ServiceError::InvalidAmount(_))));
    }

    #[test]
    fn test_calculate_price_impact_overflow_is_none() {
        assert_eq!(calculate_price_impact(Decimal::new(1, 28), Decimal::MAX), None);
    }

    #[test]
    fn test_format_balance_beyond_u256_decimals() {
        // U256::MAX has 78 digits
        assert_eq!(format_balance(U256::MAX, 78), format!("0.{}", U256::MAX));
        assert_eq!(format_balance(U256::from(5u64), 80), format!("0.{}5", "0".repeat(79)));
        assert_eq!(format_balance(U256::ZERO, 255), "0");
    }

    #[test]
    fn test_parse_amount_beyond_u256_decimals() {
        assert!(matches!(parse_amount("1", 78), Err(ServiceError::InvalidAmount(_))));
        assert_eq!(
            parse_amount(&format!("0.{}1", "0".repeat(77)), 78).unwrap(),
            U256::from(1u64)
        );
    }
}
