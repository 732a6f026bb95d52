use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::InvoiceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_name: String,
    pub status: String,
    pub invoice_count: i64,
    #[serde(default)]
    pub invoice_ids: Vec<String>,
    pub proforma_invoice_count: i64,
    #[serde(default)]
    pub proforma_invoice_ids: Vec<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub const DEFAULT_STATUS: &'static str = "Active";

    pub fn new(id: String, company_name: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            company_name,
            status: Self::DEFAULT_STATUS.to_string(),
            invoice_count: 0,
            invoice_ids: Vec::new(),
            proforma_invoice_count: 0,
            proforma_invoice_ids: Vec::new(),
            created_at: now,
        }
    }

    /// Company created on the fly for an invoice that named no company id.
    pub fn founded_by(
        id: String,
        company_name: String,
        kind: InvoiceKind,
        invoice_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        let mut company = Self::new(id, company_name, now);
        company.ids_mut(kind).push(invoice_id);
        company.sync_counts();
        company
    }

    pub fn ids_mut(&mut self, kind: InvoiceKind) -> &mut Vec<String> {
        match kind {
            InvoiceKind::Final => &mut self.invoice_ids,
            InvoiceKind::Proforma => &mut self.proforma_invoice_ids,
        }
    }

    pub fn sync_counts(&mut self) {
        self.invoice_count = self.invoice_ids.len() as i64;
        self.proforma_invoice_count = self.proforma_invoice_ids.len() as i64;
    }
}

/// Field names of the back-reference list and its counter for `kind`.
pub fn association_fields(kind: InvoiceKind) -> (&'static str, &'static str) {
    match kind {
        InvoiceKind::Final => ("invoice_ids", "invoice_count"),
        InvoiceKind::Proforma => ("proforma_invoice_ids", "proforma_invoice_count"),
    }
}
