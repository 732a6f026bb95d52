//! Derivation of installment terms and the payment state they imply.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::InvoicingError;
use crate::models::{
    round_money, Currency, ExchangeRate, Invoice, Term, TermStatus, TermTax, MAX_AMOUNT,
};

pub const DEFAULT_GST_PERCENTAGE: Decimal = dec!(18);

/// Term as submitted by a caller, before derivation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTerm {
    #[serde(default)]
    pub term_id: Option<String>,
    #[serde(default)]
    pub term_name: Option<String>,
    #[serde(default)]
    pub base_amount: Option<Decimal>,
    #[serde(default)]
    pub gst_percentage: Option<Decimal>,
    #[serde(default)]
    pub gst_amount: Option<Decimal>,
    #[serde(default)]
    pub tds_amount: Option<Decimal>,
    #[serde(default)]
    pub term_total: Option<Decimal>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub total_in_inr: Option<Decimal>,
    #[serde(default)]
    pub status: Option<TermStatus>,
}

/// The inputs a stored term was derived from, for re-deriving it.
impl From<&Term> for RawTerm {
    fn from(term: &Term) -> Self {
        let mut raw = RawTerm {
            term_id: Some(term.term_id.clone()),
            term_name: Some(term.term_name.clone()),
            base_amount: Some(term.base_amount),
            status: Some(term.status),
            ..Default::default()
        };
        match term.tax {
            TermTax::Domestic {
                gst_percentage,
                tds_amount,
                ..
            } => {
                raw.gst_percentage = Some(gst_percentage);
                raw.tds_amount = Some(tds_amount);
            }
            TermTax::Foreign { exchange_rate, .. } => {
                raw.term_total = Some(term.term_total);
                raw.exchange_rate = Some(exchange_rate);
            }
        }
        raw
    }
}

fn amount(
    value: Option<Decimal>,
    field: &str,
    index: usize,
) -> Result<Option<Decimal>, InvoicingError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(InvoicingError::validation(
            format!("terms[{}].{} must be a non-negative number", index, field),
        )),
        Some(v) if v > MAX_AMOUNT => Err(InvoicingError::validation(format!(
            "terms[{}].{} is out of range",
            index, field
        ))),
        other => Ok(other),
    }
}

fn required(value: Option<Decimal>, field: &str, index: usize) -> Result<Decimal, InvoicingError> {
    amount(value, field, index)?.ok_or_else(|| {
        InvoicingError::validation(format!("terms[{}].{} is required", index, field))
    })
}

fn term_name(raw: &RawTerm, index: usize) -> Result<String, InvoicingError> {
    match raw.term_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(InvoicingError::validation(format!(
            "terms[{}].term_name is required",
            index
        ))),
    }
}

fn term_rate(
    raw: &RawTerm,
    fallback: Option<Decimal>,
    index: usize,
) -> Result<ExchangeRate, InvoicingError> {
    let rate = raw.exchange_rate.or(fallback).ok_or_else(|| {
        InvoicingError::validation(format!("terms[{}].exchange_rate is required", index))
    })?;
    ExchangeRate::new(rate)
        .map_err(|e| InvoicingError::validation(format!("terms[{}]: {}", index, e)))
}

fn out_of_range(index: usize) -> InvoicingError {
    InvoicingError::validation(format!("terms[{}] amounts are out of range", index))
}

fn new_term_id(raw: &RawTerm) -> String {
    raw.term_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Derive one term for an invoice in `currency`.
///
/// INR: `gst = base * pct / 100`, `total = base + gst - tds`.
/// Otherwise the total is taken as given (falling back to the base amount)
/// and converted with the term's rate, or `fallback_rate` when it has none.
/// Derived amounts are rounded to paise.
pub fn derive_term(
    raw: &RawTerm,
    currency: Currency,
    fallback_rate: Option<Decimal>,
    index: usize,
) -> Result<Term, InvoicingError> {
    let term_name = term_name(raw, index)?;
    let base_amount = required(raw.base_amount, "base_amount", index)?;

    let (tax, term_total) = if currency.is_domestic() {
        let gst_percentage = amount(raw.gst_percentage, "gst_percentage", index)?
            .unwrap_or(DEFAULT_GST_PERCENTAGE);
        let tds_amount = amount(raw.tds_amount, "tds_amount", index)?.unwrap_or(Decimal::ZERO);
        let gst_amount = base_amount
            .checked_mul(gst_percentage)
            .map(|v| round_money(v / Decimal::ONE_HUNDRED))
            .ok_or_else(|| out_of_range(index))?;
        let term_total = (base_amount + gst_amount)
            .checked_sub(tds_amount)
            .ok_or_else(|| out_of_range(index))?;
        (
            TermTax::Domestic {
                gst_percentage,
                gst_amount,
                tds_amount,
            },
            term_total,
        )
    } else {
        let term_total = amount(raw.term_total, "term_total", index)?.unwrap_or(base_amount);
        let rate = term_rate(raw, fallback_rate, index)?;
        let total_in_inr = rate
            .convert(term_total)
            .map_err(|_| out_of_range(index))?;
        (
            TermTax::Foreign {
                exchange_rate: rate.value(),
                total_in_inr,
            },
            term_total,
        )
    };

    Ok(Term {
        term_id: new_term_id(raw),
        term_name,
        base_amount,
        tax,
        term_total,
        status: raw.status.unwrap_or_default(),
    })
}

/// Derive every term; the first malformed one rejects the whole list.
pub fn derive_terms(
    raw: &[RawTerm],
    currency: Currency,
    fallback_rate: Option<Decimal>,
) -> Result<Vec<Term>, InvoicingError> {
    raw.iter()
        .enumerate()
        .map(|(index, term)| derive_term(term, currency, fallback_rate, index))
        .collect()
}

/// Accept terms exactly as submitted. Every derived field must be present;
/// nothing is recomputed.
pub fn accept_terms(raw: &[RawTerm], currency: Currency) -> Result<Vec<Term>, InvoicingError> {
    raw.iter()
        .enumerate()
        .map(|(index, raw)| {
            let term_name = term_name(raw, index)?;
            let base_amount = required(raw.base_amount, "base_amount", index)?;
            let term_total = required(raw.term_total, "term_total", index)?;
            let tax = if currency.is_domestic() {
                TermTax::Domestic {
                    gst_percentage: required(raw.gst_percentage, "gst_percentage", index)?,
                    gst_amount: required(raw.gst_amount, "gst_amount", index)?,
                    tds_amount: required(raw.tds_amount, "tds_amount", index)?,
                }
            } else {
                TermTax::Foreign {
                    exchange_rate: term_rate(raw, None, index)?.value(),
                    total_in_inr: required(raw.total_in_inr, "total_in_inr", index)?,
                }
            };
            Ok(Term {
                term_id: new_term_id(raw),
                term_name,
                base_amount,
                tax,
                term_total,
                status: raw.status.unwrap_or_default(),
            })
        })
        .collect()
}

/// Sum of the INR-equivalent totals of terms still pending.
pub fn pending_in_inr(terms: &[Term]) -> Decimal {
    terms
        .iter()
        .filter(|t| t.is_pending())
        .map(Term::inr_total)
        .sum()
}

/// An invoice is complete once it has terms and all of them are paid.
pub fn is_completed(terms: &[Term]) -> bool {
    !terms.is_empty() && terms.iter().all(|t| t.status == TermStatus::Paid)
}

pub fn refresh_payment_state(invoice: &mut Invoice) {
    invoice.pending_payment_in_inr = pending_in_inr(&invoice.terms);
    invoice.is_completed = is_completed(&invoice.terms);
}
