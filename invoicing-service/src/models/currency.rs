//! Currencies and conversion to the INR reporting currency.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Currencies an invoice can be raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "Other")]
    Other,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Other => "Other",
        }
    }

    /// GST and TDS only exist for domestic (INR) billing.
    pub fn is_domestic(&self) -> bool {
        matches!(self, Currency::Inr)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurrencyError {
    #[error("exchange rate is required for {0} amounts")]
    MissingRate(Currency),

    #[error("exchange rate must be a positive number, got {0}")]
    InvalidRate(Decimal),

    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },
}

/// Largest absolute amount accepted anywhere in the ledger.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

/// Money is kept at paise precision, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rejects amounts whose magnitude exceeds [`MAX_AMOUNT`].
pub fn check_amount(field: &'static str, value: Decimal) -> Result<Decimal, CurrencyError> {
    if value.abs() > MAX_AMOUNT {
        return Err(CurrencyError::OutOfRange { field });
    }
    Ok(value)
}

/// A validated, strictly positive conversion rate to INR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    pub fn new(rate: Decimal) -> Result<Self, CurrencyError> {
        if rate > Decimal::ZERO && rate <= MAX_AMOUNT {
            Ok(Self(rate))
        } else {
            Err(CurrencyError::InvalidRate(rate))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `amount` converted and rounded to paise.
    pub fn convert(&self, amount: Decimal) -> Result<Decimal, CurrencyError> {
        let converted = amount
            .checked_mul(self.0)
            .ok_or(CurrencyError::OutOfRange { field: "amount" })?;
        check_amount("amount", round_money(converted))
    }
}

/// INR-equivalent of `amount`. INR amounts pass through untouched; every
/// other currency needs a valid rate.
pub fn to_inr(
    amount: Decimal,
    currency: Currency,
    rate: Option<Decimal>,
) -> Result<Decimal, CurrencyError> {
    let amount = check_amount("amount", amount)?;
    if currency.is_domestic() {
        return Ok(amount);
    }
    let rate = rate.ok_or(CurrencyError::MissingRate(currency))?;
    ExchangeRate::new(rate)?.convert(amount)
}
