//! Wei arithmetic and JSON-RPC wire quantities.
//!
//! Amounts are carried as wei (`u128`) everywhere inside the crate; the UI
//! deals in decimal ether strings and the RPC wire deals in `0x`-prefixed
//! hex quantities, so both conversions live here.

use crate::error::Web3Error;

/// Base unit for all cached and submitted amounts.
pub type Wei = u128;

/// Number of wei in one ether (18 decimals).
pub const WEI_PER_ETHER: Wei = 1_000_000_000_000_000_000;

const ETHER_DECIMALS: usize = 18;

/// Parse a decimal ether string ("0.4", "1", "12.5") into wei.
///
/// Rejects empty input, negative amounts, malformed digits and fractions
/// finer than 18 decimals.
pub fn parse_ether(input: &str) -> Result<Wei, Web3Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Err(Web3Error::Validation(format!("not a number: {:?}", input)));
    }
    if trimmed.starts_with('-') || trimmed.starts_with('+') {
        return Err(Web3Error::Validation(format!(
            "amount must be an unsigned decimal: {}",
            input
        )));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if frac.len() > ETHER_DECIMALS {
        return Err(Web3Error::Validation(format!(
            "more than {} decimal places: {}",
            ETHER_DECIMALS, input
        )));
    }

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<Wei>()
            .map_err(|_| Web3Error::Validation(format!("not a number: {}", input)))?
            .checked_mul(WEI_PER_ETHER)
            .ok_or_else(|| Web3Error::Validation(format!("amount overflows: {}", input)))?
    };

    let frac_wei = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow((ETHER_DECIMALS - frac.len()) as u32);
        frac.parse::<Wei>()
            .map_err(|_| Web3Error::Validation(format!("not a number: {}", input)))?
            * scale
    };

    whole_wei
        .checked_add(frac_wei)
        .ok_or_else(|| Web3Error::Validation(format!("amount overflows: {}", input)))
}

/// Format wei as a decimal ether string, trailing zeros trimmed.
///
/// Whole amounts keep a single decimal ("1.0") to match how the UI has
/// always displayed balances.
pub fn format_ether(wei: Wei) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;
    if frac == 0 {
        return format!("{}.0", whole);
    }
    let frac_str = format!("{:018}", frac);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Encode an unsigned value as a JSON-RPC hex quantity ("0x1a").
pub fn to_quantity(value: Wei) -> String {
    format!("{:#x}", value)
}

/// Decode a JSON-RPC hex quantity into wei.
pub fn from_quantity(quantity: &str) -> Result<Wei, Web3Error> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(|| Web3Error::Network(format!("quantity missing 0x prefix: {}", quantity)))?;
    if digits.is_empty() {
        return Err(Web3Error::Network(format!("empty quantity: {}", quantity)));
    }
    Wei::from_str_radix(digits, 16)
        .map_err(|e| Web3Error::Network(format!("bad quantity {}: {}", quantity, e)))
}

/// Decode a hex quantity into a u64 (block numbers, counts).
pub fn from_quantity_u64(quantity: &str) -> Result<u64, Web3Error> {
    let value = from_quantity(quantity)?;
    u64::try_from(value).map_err(|_| Web3Error::Network(format!("quantity out of range: {}", quantity)))
}
