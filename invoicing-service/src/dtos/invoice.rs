use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    Attachment, Billing, Contact, Currency, Invoice, InvoiceKind, ProformaStatus, Term, TermStatus,
};
use crate::services::term_ledger::RawTerm;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, message = "Invoice number is required"))]
    pub invoice_no: String,
    pub currency: Currency,
    #[serde(default)]
    pub agent_id: Option<String>,
    /// When absent a company named `company_name` is created.
    #[serde(default)]
    pub company_id: Option<String>,
    #[validate(length(min = 1, message = "Company name is required"))]
    pub company_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub alternate_emails: Vec<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    // INR only
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub total_gst_amount: Option<Decimal>,
    #[serde(default)]
    pub total_tds_amount: Option<Decimal>,
    // non-INR only
    #[serde(default)]
    pub base_closure_amount_inr: Option<Decimal>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    pub base_closure_amount: Decimal,
    #[serde(default)]
    pub total_base_amount: Option<Decimal>,
    #[serde(default)]
    pub standards: Vec<String>,
    #[serde(default)]
    pub invoice_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terms: Vec<RawTerm>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Proforma invoices only; defaults to Active.
    #[serde(default)]
    pub proforma_status: Option<ProformaStatus>,
}

/// Partial update. Terms are stored as submitted unless
/// `recompute_derived` is set.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, message = "Invoice number cannot be empty"))]
    pub invoice_no: Option<String>,
    pub currency: Option<Currency>,
    pub agent_id: Option<String>,
    pub company_id: Option<String>,
    #[validate(length(min = 1, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub alternate_emails: Option<Vec<String>>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub gst_number: Option<String>,
    pub total_gst_amount: Option<Decimal>,
    pub total_tds_amount: Option<Decimal>,
    pub base_closure_amount_inr: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub base_closure_amount: Option<Decimal>,
    pub total_base_amount: Option<Decimal>,
    pub standards: Option<Vec<String>>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub terms: Option<Vec<RawTerm>>,
    #[serde(default)]
    pub recompute_derived: bool,
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTermStatusRequest {
    pub status: TermStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProformaStatusRequest {
    pub status: ProformaStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTargetRequest {
    pub target: Decimal,
}

/// Query string of the invoice listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceQuery {
    pub search: Option<String>,
    /// `pending` or `completed`.
    pub status: Option<String>,
    pub proforma_status: Option<ProformaStatus>,
    pub currency: Option<Currency>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub agent_id: Option<String>,
    pub company_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub kind: InvoiceKind,
    pub invoice_no: String,
    pub currency: Currency,
    pub billing: Billing,
    /// INR-equivalent of the closure amount.
    pub closure_amount_inr: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub company_name: String,
    pub contact: Contact,
    pub standards: Vec<String>,
    pub base_closure_amount: Decimal,
    pub total_base_amount: Decimal,
    pub pending_payment_in_inr: Decimal,
    pub is_completed: bool,
    pub terms: Vec<Term>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proforma_status: Option<ProformaStatus>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<DateTime<Utc>>,
    pub booked_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            closure_amount_inr: invoice.inr_closure(),
            id: invoice.id,
            kind: invoice.kind,
            invoice_no: invoice.invoice_no,
            currency: invoice.currency,
            billing: invoice.billing,
            agent_id: invoice.agent_id,
            company_id: invoice.company_id,
            company_name: invoice.company_name,
            contact: invoice.contact,
            standards: invoice.standards,
            base_closure_amount: invoice.base_closure_amount,
            total_base_amount: invoice.total_base_amount,
            pending_payment_in_inr: invoice.pending_payment_in_inr,
            is_completed: invoice.is_completed,
            terms: invoice.terms,
            proforma_status: invoice.proforma_status,
            attachments: invoice.attachments,
            invoice_date: invoice.invoice_date,
            booked_at: invoice.booked_at,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithRelatedResponse {
    pub invoice: InvoiceResponse,
    /// Other invoices for the same company sharing at least one standard.
    pub related: Vec<InvoiceResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub limit: i64,
    pub offset: u64,
}
