use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment state of one installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermStatus {
    Pending,
    Paid,
}

impl TermStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermStatus::Pending => "Pending",
            TermStatus::Paid => "Paid",
        }
    }
}

impl Default for TermStatus {
    fn default() -> Self {
        TermStatus::Pending
    }
}

/// Currency-dependent part of a term. Domestic terms carry GST/TDS, foreign
/// terms carry their conversion to INR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum TermTax {
    Domestic {
        gst_percentage: Decimal,
        gst_amount: Decimal,
        tds_amount: Decimal,
    },
    Foreign {
        exchange_rate: Decimal,
        total_in_inr: Decimal,
    },
}

/// One installment of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub term_id: String,
    pub term_name: String,
    pub base_amount: Decimal,
    pub tax: TermTax,
    /// In the invoice currency.
    pub term_total: Decimal,
    #[serde(default)]
    pub status: TermStatus,
}

impl Term {
    pub fn inr_total(&self) -> Decimal {
        match self.tax {
            TermTax::Domestic { .. } => self.term_total,
            TermTax::Foreign { total_in_inr, .. } => total_in_inr,
        }
    }

    pub fn gst_amount(&self) -> Decimal {
        match self.tax {
            TermTax::Domestic { gst_amount, .. } => gst_amount,
            TermTax::Foreign { .. } => Decimal::ZERO,
        }
    }

    pub fn tds_amount(&self) -> Decimal {
        match self.tax {
            TermTax::Domestic { tds_amount, .. } => tds_amount,
            TermTax::Foreign { .. } => Decimal::ZERO,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TermStatus::Pending
    }
}
