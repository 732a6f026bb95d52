//! Persistence seam shared by the MongoDB and in-memory backends.
//!
//! Every counter update is a single atomic operation on one document: the
//! back-reference list is edited and the counter recomputed from its length
//! in the same write, so concurrent writers cannot lose updates and the
//! counter can never go negative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use rust_decimal::Decimal;

use super::error::StoreError;
use crate::models::{
    Agent, Certification, Company, Currency, Invoice, InvoiceKind, Manager, ProformaStatus,
    Standard, TermStatus,
};

/// Offset pagination, as used by every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: u64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 200;

    pub fn new(limit: i64, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(50, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Pending,
    Completed,
}

/// Free-text search over company name, invoice number and standards.
/// `agent_ids` are the agents whose name matched the same needle.
#[derive(Debug, Clone, Default)]
pub struct TextSearch {
    pub needle: String,
    pub agent_ids: Vec<String>,
}

/// Invoice selection criteria. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub kind: Option<InvoiceKind>,
    pub text: Option<TextSearch>,
    pub payment: Option<PaymentState>,
    pub has_pending_terms: Option<bool>,
    pub proforma_status: Option<ProformaStatus>,
    pub currency: Option<Currency>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub agent_id: Option<String>,
    pub agent_ids: Option<Vec<String>>,
    pub company_id: Option<String>,
    /// Matches invoices sharing at least one of these standards.
    pub standards_any: Option<Vec<String>>,
    pub exclude_id: Option<String>,
    /// Inclusive lower bound on `booked_at`.
    pub booked_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `booked_at`.
    pub booked_to: Option<DateTime<Utc>>,
}

impl InvoiceFilter {
    pub fn of_kind(kind: InvoiceKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn booked_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.booked_from = Some(from);
        self.booked_to = Some(to);
        self
    }

    /// In-process evaluation, mirroring `to_document`.
    pub fn matches(&self, invoice: &Invoice) -> bool {
        if self.kind.is_some_and(|k| k != invoice.kind) {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.needle.to_lowercase();
            let hit = invoice.company_name.to_lowercase().contains(&needle)
                || invoice.invoice_no.to_lowercase().contains(&needle)
                || invoice
                    .standards
                    .iter()
                    .any(|s| s.to_lowercase().contains(&needle))
                || invoice
                    .agent_id
                    .as_ref()
                    .is_some_and(|a| text.agent_ids.contains(a));
            if !hit {
                return false;
            }
        }
        match self.payment {
            Some(PaymentState::Pending) if invoice.is_completed => return false,
            Some(PaymentState::Completed) if !invoice.is_completed => return false,
            _ => {}
        }
        if self
            .has_pending_terms
            .is_some_and(|want| want != invoice.has_pending_terms())
        {
            return false;
        }
        if self.proforma_status.is_some() && self.proforma_status != invoice.proforma_status {
            return false;
        }
        if self.currency.is_some_and(|c| c != invoice.currency) {
            return false;
        }
        if self.city.is_some() && self.city != invoice.contact.city {
            return false;
        }
        if self.country.is_some() && self.country != invoice.contact.country {
            return false;
        }
        if self.agent_id.is_some() && self.agent_id != invoice.agent_id {
            return false;
        }
        if let Some(ids) = &self.agent_ids {
            if !invoice.agent_id.as_ref().is_some_and(|a| ids.contains(a)) {
                return false;
            }
        }
        if self.company_id.is_some() && self.company_id != invoice.company_id {
            return false;
        }
        if let Some(standards) = &self.standards_any {
            if !invoice.shares_standard_with(standards) {
                return false;
            }
        }
        if self.exclude_id.as_deref() == Some(invoice.id.as_str()) {
            return false;
        }
        if self.booked_from.is_some_and(|from| invoice.booked_at < from) {
            return false;
        }
        if self.booked_to.is_some_and(|to| invoice.booked_at >= to) {
            return false;
        }
        true
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {};
        let mut all_of: Vec<Bson> = Vec::new();

        if let Some(kind) = self.kind {
            filter.insert("kind", kind.as_str());
        }
        if let Some(text) = &self.text {
            let pattern = doc! { "$regex": escape_regex(&text.needle), "$options": "i" };
            all_of.push(Bson::Document(doc! {
                "$or": [
                    { "company_name": pattern.clone() },
                    { "invoice_no": pattern.clone() },
                    { "standards": pattern },
                    { "agent_id": { "$in": text.agent_ids.clone() } },
                ]
            }));
        }
        match self.payment {
            Some(PaymentState::Pending) => {
                filter.insert("is_completed", doc! { "$ne": true });
            }
            Some(PaymentState::Completed) => {
                filter.insert("is_completed", true);
            }
            None => {}
        }
        match self.has_pending_terms {
            Some(true) => {
                filter.insert("terms.status", TermStatus::Pending.as_str());
            }
            Some(false) => {
                filter.insert("terms.status", doc! { "$ne": TermStatus::Pending.as_str() });
            }
            None => {}
        }
        if let Some(status) = self.proforma_status {
            filter.insert("proforma_status", status.as_str());
        }
        if let Some(currency) = self.currency {
            filter.insert("currency", currency.as_str());
        }
        if let Some(city) = &self.city {
            filter.insert("contact.city", city.clone());
        }
        if let Some(country) = &self.country {
            filter.insert("contact.country", country.clone());
        }
        if let Some(agent_id) = &self.agent_id {
            all_of.push(Bson::Document(doc! { "agent_id": agent_id.clone() }));
        }
        if let Some(ids) = &self.agent_ids {
            all_of.push(Bson::Document(doc! { "agent_id": { "$in": ids.clone() } }));
        }
        if let Some(company_id) = &self.company_id {
            filter.insert("company_id", company_id.clone());
        }
        if let Some(standards) = &self.standards_any {
            filter.insert("standards", doc! { "$in": standards.clone() });
        }
        if let Some(id) = &self.exclude_id {
            filter.insert("_id", doc! { "$ne": id.clone() });
        }
        let mut booked = doc! {};
        if let Some(from) = self.booked_from {
            booked.insert("$gte", BsonDateTime::from_chrono(from));
        }
        if let Some(to) = self.booked_to {
            booked.insert("$lt", BsonDateTime::from_chrono(to));
        }
        if !booked.is_empty() {
            filter.insert("booked_at", booked);
        }
        if !all_of.is_empty() {
            filter.insert("$and", all_of);
        }
        filter
    }
}

fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub manager_id: Option<String>,
    pub name_contains: Option<String>,
}

impl AgentFilter {
    pub fn matches(&self, agent: &Agent) -> bool {
        if self.manager_id.is_some() && self.manager_id != agent.manager_id {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            if !agent
                .agent_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }

    pub fn to_document(&self) -> Document {
        let mut filter = doc! {};
        if let Some(manager_id) = &self.manager_id {
            filter.insert("manager_id", manager_id.clone());
        }
        if let Some(needle) = &self.name_contains {
            filter.insert(
                "agent_name",
                doc! { "$regex": escape_regex(needle), "$options": "i" },
            );
        }
        filter
    }
}

/// Profile fields an agent update may touch. Target and counters are
/// deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct AgentPatch {
    pub agent_name: Option<String>,
    pub agent_email: Option<String>,
    pub agent_number: Option<String>,
    pub manager_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyPatch {
    pub company_name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ManagerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StandardPatch {
    pub standard_name: Option<String>,
    pub description: Option<String>,
}

/// Builds a `$set` document from the populated fields of a patch.
pub(crate) fn set_fields(fields: &[(&str, &Option<String>)]) -> Document {
    let mut set = doc! {};
    for (name, value) in fields {
        if let Some(v) = value {
            set.insert(*name, v.clone());
        }
    }
    set
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // Invoices
    /// Fails with `Duplicate` when `(kind, invoice_no)` is taken.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError>;
    /// Returns false when no invoice has that id.
    async fn replace_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError>;
    async fn delete_invoice(&self, id: &str) -> Result<bool, StoreError>;
    /// Newest first.
    async fn find_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Option<Page>,
    ) -> Result<Vec<Invoice>, StoreError>;
    async fn count_invoices(&self, filter: &InvoiceFilter) -> Result<u64, StoreError>;
    /// Sets one term's status and recomputes the invoice's pending amount
    /// and completion flag in the same write. `None` when the invoice or
    /// term does not exist.
    async fn set_term_status(
        &self,
        invoice_id: &str,
        term_id: &str,
        status: TermStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError>;
    async fn set_proforma_status(
        &self,
        invoice_id: &str,
        status: ProformaStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError>;

    // Agents
    /// Fails with `Duplicate` when the email is taken.
    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError>;
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError>;
    async fn find_agents(
        &self,
        filter: &AgentFilter,
        page: Option<Page>,
    ) -> Result<Vec<Agent>, StoreError>;
    async fn update_agent(
        &self,
        id: &str,
        patch: &AgentPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Agent>, StoreError>;
    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError>;
    /// Idempotent. Returns false when the agent does not exist.
    async fn link_agent_invoice(
        &self,
        agent_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Idempotent. Returns false when the agent does not exist.
    async fn unlink_agent_invoice(
        &self,
        agent_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Adds `amount` to `target_achieved` and records `invoice_id` as
    /// credited, in one write. Crediting an invoice that is already recorded
    /// changes nothing, so the write is safe to replay. Returns false when
    /// the agent does not exist.
    async fn credit_target(
        &self,
        agent_id: &str,
        invoice_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Appends `{change_id, previous_target, previous_achieved, changed_at}`
    /// to the history and sets the new target in one write. A `change_id`
    /// already in the history leaves the agent untouched.
    async fn set_agent_target(
        &self,
        agent_id: &str,
        target: Decimal,
        change_id: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<Option<Agent>, StoreError>;
    /// Idempotent. Returns false when the agent does not exist.
    async fn link_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Idempotent. Returns false when the agent does not exist.
    async fn unlink_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // Companies
    async fn insert_company(&self, company: &Company) -> Result<(), StoreError>;
    async fn get_company(&self, id: &str) -> Result<Option<Company>, StoreError>;
    async fn find_companies(&self, page: Option<Page>) -> Result<Vec<Company>, StoreError>;
    async fn count_companies(&self) -> Result<u64, StoreError>;
    async fn update_company(
        &self,
        id: &str,
        patch: &CompanyPatch,
    ) -> Result<Option<Company>, StoreError>;
    async fn delete_company(&self, id: &str) -> Result<bool, StoreError>;
    async fn link_company_invoice(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Result<bool, StoreError>;
    async fn unlink_company_invoice(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Result<bool, StoreError>;

    // Certifications
    async fn insert_certification(&self, certification: &Certification)
        -> Result<(), StoreError>;
    async fn get_certification(&self, id: &str) -> Result<Option<Certification>, StoreError>;
    /// Newest first, optionally restricted to one agent.
    async fn find_certifications(
        &self,
        agent_id: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<Certification>, StoreError>;
    async fn count_certifications(&self, agent_id: Option<&str>) -> Result<u64, StoreError>;
    /// Returns false when no certification has that id.
    async fn replace_certification(
        &self,
        certification: &Certification,
    ) -> Result<bool, StoreError>;
    async fn delete_certification(&self, id: &str) -> Result<bool, StoreError>;

    // Managers
    async fn insert_manager(&self, manager: &Manager) -> Result<(), StoreError>;
    async fn get_manager(&self, id: &str) -> Result<Option<Manager>, StoreError>;
    async fn find_managers(&self, page: Option<Page>) -> Result<Vec<Manager>, StoreError>;
    async fn update_manager(
        &self,
        id: &str,
        patch: &ManagerPatch,
    ) -> Result<Option<Manager>, StoreError>;
    async fn delete_manager(&self, id: &str) -> Result<bool, StoreError>;

    // Standards
    async fn insert_standard(&self, standard: &Standard) -> Result<(), StoreError>;
    async fn get_standard(&self, id: &str) -> Result<Option<Standard>, StoreError>;
    async fn find_standards(&self, page: Option<Page>) -> Result<Vec<Standard>, StoreError>;
    async fn update_standard(
        &self,
        id: &str,
        patch: &StandardPatch,
    ) -> Result<Option<Standard>, StoreError>;
    async fn delete_standard(&self, id: &str) -> Result<bool, StoreError>;

    // Leases
    /// Takes the lease unless another holder owns an unexpired one. A holder
    /// that already owns the lease takes it again.
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StoreError>;
}
