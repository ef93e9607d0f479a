//! Rendering of fixed-point on-chain quantities as human-readable amounts

use alloy::primitives::{
    utils::{format_units, parse_units, ParseUnits},
    U256,
};
use contracts_common::constants::{QUANTITY_DECIMALS, UNIT_LABEL};

use crate::errors::ScriptError;

/// Render `quantity * rate` as an integer USD amount, next to the quantity
/// itself, e.g. `"100.0 = 200 USD"`.
///
/// `quantity` carries 18 decimals, `rate` carries `quote_decimals` decimals.
/// The USD amount is truncated, never rounded.
pub fn convert_to_usd(
    quantity: U256,
    rate: U256,
    quote_decimals: u8,
) -> Result<String, ScriptError> {
    let product = quantity.checked_mul(rate).ok_or_else(|| {
        ScriptError::InvalidQuantity(format!("{quantity} * {rate} overflows"))
    })?;

    let usd = product / pow10(QUANTITY_DECIMALS)? / pow10(quote_decimals)?;

    Ok(format!("{} = {} USD", format_quantity(quantity)?, usd))
}

/// Render a quantity with its unit label, e.g. `"1.0 L-USD"`
pub fn convert_units(quantity: U256) -> Result<String, ScriptError> {
    Ok(format!("{} {}", format_quantity(quantity)?, UNIT_LABEL))
}

/// Render an 18-decimal quantity as a decimal string.
///
/// Trailing zeros are dropped but at least one fractional digit is kept, so
/// `10^18` renders as `1.0` and `5 * 10^17` as `0.5`.
pub fn format_quantity(quantity: U256) -> Result<String, ScriptError> {
    let formatted = format_units(quantity, QUANTITY_DECIMALS)
        .map_err(|e| ScriptError::InvalidQuantity(e.to_string()))?;

    let Some((integer, fraction)) = formatted.split_once('.') else {
        return Ok(format!("{formatted}.0"));
    };

    let fraction = fraction.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };
    Ok(format!("{integer}.{fraction}"))
}

/// Parse a non-negative decimal amount, e.g. `"1.5"`, into an 18-decimal
/// quantity
pub fn parse_quantity(amount: &str) -> Result<U256, ScriptError> {
    match parse_units(amount.trim(), QUANTITY_DECIMALS) {
        Ok(ParseUnits::U256(quantity)) => Ok(quantity),
        Ok(ParseUnits::I256(_)) => Err(ScriptError::InvalidQuantity(format!(
            "{amount} is negative"
        ))),
        Err(e) => Err(ScriptError::InvalidQuantity(format!("{amount}: {e}"))),
    }
}

/// `10^exponent`, failing if it does not fit in 256 bits
fn pow10(exponent: u8) -> Result<U256, ScriptError> {
    U256::from(10)
        .checked_pow(U256::from(exponent))
        .ok_or_else(|| ScriptError::InvalidQuantity(format!("10^{exponent} overflows")))
}
