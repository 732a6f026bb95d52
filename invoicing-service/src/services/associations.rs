//! Agent and company back-references of invoices.
//!
//! The invoice document is the source of truth. Back-references are edited
//! with single-document atomic updates, and a missing agent or company only
//! produces a warning.

use super::error::{ConsistencyWarning, StoreError, WarningKind};
use super::invoicing::InvoicingService;
use crate::models::{Company, Invoice, InvoiceKind};

pub(super) fn association_failed(side: &str, id: &str, err: StoreError) -> ConsistencyWarning {
    ConsistencyWarning::new(
        WarningKind::AssociationFailed,
        format!("Failed to update {} {}: {}", side, id, err),
    )
}

pub(super) fn missing_agent(agent_id: &str) -> ConsistencyWarning {
    ConsistencyWarning::new(
        WarningKind::MissingAgent,
        format!("Agent {} not found; association skipped", agent_id),
    )
}

fn missing_company(company_id: &str) -> ConsistencyWarning {
    ConsistencyWarning::new(
        WarningKind::MissingCompany,
        format!("Company {} not found; association skipped", company_id),
    )
}

impl InvoicingService {
    /// Links a freshly inserted invoice. When `new_company` is set the
    /// company named by the invoice is created with this invoice as its
    /// first entry.
    pub(crate) async fn attach(&self, invoice: &Invoice, new_company: bool) -> Vec<ConsistencyWarning> {
        let mut warnings = Vec::new();

        if let Some(agent_id) = invoice.agent_id.as_deref() {
            if invoice.is_final() {
                warnings.extend(self.link_agent(agent_id, &invoice.id).await);
            }
        }

        if let Some(company_id) = invoice.company_id.as_deref() {
            if new_company {
                warnings.extend(self.found_company(company_id, invoice).await);
            } else {
                warnings.extend(self.link_company(company_id, invoice.kind, &invoice.id).await);
            }
        }

        warnings
    }

    /// Removes the invoice from its agent and company lists.
    pub(crate) async fn detach(&self, invoice: &Invoice) -> Vec<ConsistencyWarning> {
        let mut warnings = Vec::new();

        if let Some(agent_id) = invoice.agent_id.as_deref() {
            if invoice.is_final() {
                warnings.extend(self.unlink_agent(agent_id, &invoice.id).await);
            }
        }
        if let Some(company_id) = invoice.company_id.as_deref() {
            warnings.extend(
                self.unlink_company(company_id, invoice.kind, &invoice.id)
                    .await,
            );
        }

        warnings
    }

    /// Moves back-references from `before`'s agent/company to `after`'s.
    /// Sides that did not change are left alone.
    pub(crate) async fn reassign(&self, before: &Invoice, after: &Invoice) -> Vec<ConsistencyWarning> {
        let mut warnings = Vec::new();

        if before.agent_id != after.agent_id && after.is_final() {
            if let Some(old) = before.agent_id.as_deref() {
                warnings.extend(self.unlink_agent(old, &before.id).await);
            }
            if let Some(new) = after.agent_id.as_deref() {
                warnings.extend(self.link_agent(new, &after.id).await);
            }
            tracing::info!(
                invoice_id = %after.id,
                from = ?before.agent_id,
                to = ?after.agent_id,
                "Invoice reassigned to another agent"
            );
        }

        if before.company_id != after.company_id {
            if let Some(old) = before.company_id.as_deref() {
                warnings.extend(self.unlink_company(old, before.kind, &before.id).await);
            }
            if let Some(new) = after.company_id.as_deref() {
                warnings.extend(self.link_company(new, after.kind, &after.id).await);
            }
        }

        warnings
    }

    async fn link_agent(&self, agent_id: &str, invoice_id: &str) -> Option<ConsistencyWarning> {
        let store = self.store();
        let now = self.clock.now();
        match self
            .call("link_agent_invoice", move || {
                store.link_agent_invoice(agent_id, invoice_id, now)
            })
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(missing_agent(agent_id)),
            Err(e) => Some(association_failed("agent", agent_id, e)),
        }
    }

    async fn unlink_agent(&self, agent_id: &str, invoice_id: &str) -> Option<ConsistencyWarning> {
        let store = self.store();
        let now = self.clock.now();
        match self
            .call("unlink_agent_invoice", move || {
                store.unlink_agent_invoice(agent_id, invoice_id, now)
            })
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(missing_agent(agent_id)),
            Err(e) => Some(association_failed("agent", agent_id, e)),
        }
    }

    async fn link_company(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Option<ConsistencyWarning> {
        let store = self.store();
        match self
            .call("link_company_invoice", move || {
                store.link_company_invoice(company_id, kind, invoice_id)
            })
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(missing_company(company_id)),
            Err(e) => Some(association_failed("company", company_id, e)),
        }
    }

    async fn unlink_company(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Option<ConsistencyWarning> {
        let store = self.store();
        match self
            .call("unlink_company_invoice", move || {
                store.unlink_company_invoice(company_id, kind, invoice_id)
            })
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(missing_company(company_id)),
            Err(e) => Some(association_failed("company", company_id, e)),
        }
    }

    async fn found_company(&self, company_id: &str, invoice: &Invoice) -> Option<ConsistencyWarning> {
        let company = Company::founded_by(
            company_id.to_string(),
            invoice.company_name.clone(),
            invoice.kind,
            invoice.id.clone(),
            self.clock.now(),
        );
        let store = self.store();
        let company = &company;
        match self
            .insert_once(
                "insert_company",
                move || store.insert_company(company),
                move || store.get_company(company_id),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(
                    company_id = %company_id,
                    company_name = %invoice.company_name,
                    "Company created for invoice"
                );
                None
            }
            Err(e) => Some(association_failed("company", company_id, e)),
        }
    }
}
