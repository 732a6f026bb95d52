//! Invoice document. Final and proforma invoices share one shape and one
//! collection, told apart by `kind`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::opt_chrono_datetime_as_bson_datetime;
use super::{Currency, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Final,
    Proforma,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Final => "final",
            InvoiceKind::Proforma => "proforma",
        }
    }
}

/// Lifecycle of a proforma invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProformaStatus {
    Active,
    Close,
    Lost,
}

impl ProformaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProformaStatus::Active => "Active",
            ProformaStatus::Close => "Close",
            ProformaStatus::Lost => "Lost",
        }
    }
}

/// Which closure figure is authoritative depends on the currency: INR
/// invoices carry domestic tax totals, everything else carries the INR
/// conversion of the closure amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum Billing {
    Domestic {
        gst_number: String,
        total_gst_amount: Decimal,
        total_tds_amount: Decimal,
    },
    Foreign {
        base_closure_amount_inr: Decimal,
        exchange_rate: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub alternate_emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub kind: InvoiceKind,
    pub invoice_no: String,
    pub currency: Currency,
    pub billing: Billing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub company_name: String,
    pub contact: Contact,
    #[serde(default)]
    pub standards: Vec<String>,
    /// In the invoice currency.
    pub base_closure_amount: Decimal,
    pub total_base_amount: Decimal,
    pub pending_payment_in_inr: Decimal,
    pub is_completed: bool,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proforma_status: Option<ProformaStatus>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub invoice_date: Option<DateTime<Utc>>,
    /// `invoice_date` when known, otherwise `created_at`. Every date filter
    /// and monthly bucket reads this field.
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub booked_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Closure amount in INR, read from whichever field is authoritative for
    /// the invoice currency.
    pub fn inr_closure(&self) -> Decimal {
        match &self.billing {
            Billing::Domestic { .. } => self.base_closure_amount,
            Billing::Foreign {
                base_closure_amount_inr,
                ..
            } => *base_closure_amount_inr,
        }
    }

    pub fn stored_gst_total(&self) -> Option<Decimal> {
        match &self.billing {
            Billing::Domestic {
                total_gst_amount, ..
            } => Some(*total_gst_amount),
            Billing::Foreign { .. } => None,
        }
    }

    pub fn stored_tds_total(&self) -> Option<Decimal> {
        match &self.billing {
            Billing::Domestic {
                total_tds_amount, ..
            } => Some(*total_tds_amount),
            Billing::Foreign { .. } => None,
        }
    }

    pub fn term_gst_total(&self) -> Decimal {
        self.terms.iter().map(Term::gst_amount).sum()
    }

    pub fn term_tds_total(&self) -> Decimal {
        self.terms.iter().map(Term::tds_amount).sum()
    }

    pub fn has_pending_terms(&self) -> bool {
        self.terms.iter().any(Term::is_pending)
    }

    /// True when at least one standard appears in both lists.
    pub fn shares_standard_with(&self, standards: &[String]) -> bool {
        self.standards.iter().any(|s| standards.contains(s))
    }

    pub fn is_final(&self) -> bool {
        self.kind == InvoiceKind::Final
    }
}
