//! Human-readable currency amounts.
//!
//! Spend ceilings are easier to configure as `"$0.10"` than as `100000`
//! token base units. [`MoneyAmount`] parses the former and converts it to the
//! latter given the token's decimals.
//!
//! # Supported Formats
//!
//! - Plain numbers: `"100"`, `"0.01"`
//! - With currency symbols: `"$10.50"`
//! - With thousand separators: `"1,000"`, `"1,000,000.50"`
//!
//! ```rust
//! use x402_types::util::money_amount::MoneyAmount;
//! use alloy_primitives::U256;
//!
//! let amount = MoneyAmount::parse("$0.10").unwrap();
//! assert_eq!(amount.as_token_amount(6).unwrap(), U256::from(100_000u64));
//! ```

use alloy_primitives::U256;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("static regex"));

/// A parsed non-negative decimal amount, keeping the input precision.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

impl MoneyAmount {
    /// Number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value without its decimal point; `"12.34"` gives `1234`.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts to token base units, e.g. `0.10` at 6 decimals is `100000`.
    ///
    /// Fails when the input carries more decimal places than the token.
    pub fn as_token_amount(&self, decimals: u32) -> Result<U256, MoneyAmountParseError> {
        let scale = self.scale();
        if scale > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: decimals,
            });
        }
        let multiplier = U256::from(10u64).pow(U256::from(decimals - scale));
        Ok(U256::from(self.mantissa()) * multiplier)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        constants::MIN_STR,
        constants::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision { money: u32, token: u32 },
}

mod constants {
    use super::*;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

impl MoneyAmount {
    /// Parses a currency string, stripping symbols, separators and whitespace.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = NON_NUMERIC.replace_all(input, "");
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < *constants::MIN || parsed > *constants::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }

        Ok(MoneyAmount(parsed))
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_symbols_and_separators() {
        let amount = MoneyAmount::parse("$1,000.50").unwrap();
        assert_eq!(amount.scale(), 2);
        assert_eq!(amount.mantissa(), 100050);
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(matches!(
            MoneyAmount::parse("-1"),
            Err(MoneyAmountParseError::Negative)
        ));
        assert!(matches!(
            MoneyAmount::parse("abc"),
            Err(MoneyAmountParseError::InvalidFormat)
        ));
    }

    #[test]
    fn test_token_amount_conversion() {
        let amount = MoneyAmount::parse("2").unwrap();
        assert_eq!(amount.as_token_amount(6).unwrap(), U256::from(2_000_000u64));
        let too_precise = MoneyAmount::parse("0.0000001").unwrap();
        assert!(matches!(
            too_precise.as_token_amount(6),
            Err(MoneyAmountParseError::WrongPrecision { money: 7, token: 6 })
        ));
    }
}
