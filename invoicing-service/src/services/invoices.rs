//! Invoice and proforma invoice lifecycle.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, instrument, warn};

use super::error::{ConsistencyWarning, InvoicingError, Outcome, WarningKind};
use super::invoicing::{report_warnings, InvoicingService};
use super::metrics;
use super::store::{AgentFilter, InvoiceFilter, Page, PaymentState, TextSearch};
use super::term_ledger::{self, RawTerm};
use crate::dtos::invoice::{CreateInvoiceRequest, InvoiceQuery, UpdateInvoiceRequest};
use crate::models::{
    to_inr, Billing, Contact, Currency, ExchangeRate, Invoice, InvoiceKind, ProformaStatus, Term,
    TermStatus, MAX_AMOUNT,
};

/// Largest accepted gap between a caller-supplied INR closure and the one
/// derived from the exchange rate.
const INR_TOLERANCE: Decimal = dec!(0.01);

/// A page of results together with the size of the full selection.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: Page,
}

/// Billing-related fields as they arrive from a create or a merged update.
struct BillingInput<'a> {
    currency: Currency,
    gst_number: Option<&'a str>,
    total_gst_amount: Option<Decimal>,
    total_tds_amount: Option<Decimal>,
    base_closure_amount: Decimal,
    base_closure_amount_inr: Option<Decimal>,
    exchange_rate: Option<Decimal>,
}

fn non_negative(value: Option<Decimal>, field: &str) -> Result<Option<Decimal>, InvoicingError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(InvoicingError::validation(format!(
            "{} must be a non-negative number",
            field
        ))),
        Some(v) if v > MAX_AMOUNT => Err(InvoicingError::validation(format!(
            "{} is out of range",
            field
        ))),
        other => Ok(other),
    }
}

fn build_billing(input: &BillingInput<'_>) -> Result<Billing, InvoicingError> {
    non_negative(Some(input.base_closure_amount), "base_closure_amount")?;

    if input.currency.is_domestic() {
        if input.exchange_rate.is_some() || input.base_closure_amount_inr.is_some() {
            return Err(InvoicingError::validation(
                "exchange_rate and base_closure_amount_inr apply only to non-INR invoices",
            ));
        }
        let gst_number = match input.gst_number.map(str::trim) {
            Some(gst) if !gst.is_empty() => gst.to_string(),
            _ => {
                return Err(InvoicingError::validation(
                    "gst_number is required for INR invoices",
                ))
            }
        };
        let total_gst_amount = non_negative(input.total_gst_amount, "total_gst_amount")?
            .ok_or_else(|| {
                InvoicingError::validation("total_gst_amount is required for INR invoices")
            })?;
        let total_tds_amount = non_negative(input.total_tds_amount, "total_tds_amount")?
            .ok_or_else(|| {
                InvoicingError::validation("total_tds_amount is required for INR invoices")
            })?;
        return Ok(Billing::Domestic {
            gst_number,
            total_gst_amount,
            total_tds_amount,
        });
    }

    if input.gst_number.is_some()
        || input.total_gst_amount.is_some()
        || input.total_tds_amount.is_some()
    {
        return Err(InvoicingError::validation(
            "GST and TDS fields apply only to INR invoices",
        ));
    }
    let rate = ExchangeRate::new(input.exchange_rate.ok_or_else(|| {
        InvoicingError::validation(format!(
            "exchange_rate is required for {} invoices",
            input.currency
        ))
    })?)?;
    let derived = to_inr(input.base_closure_amount, input.currency, Some(rate.value()))?;
    if let Some(given) = input.base_closure_amount_inr {
        if (given - derived).abs() > INR_TOLERANCE {
            return Err(InvoicingError::validation(format!(
                "base_closure_amount_inr {} does not match base_closure_amount x exchange_rate = {}",
                given, derived
            )));
        }
    }
    Ok(Billing::Foreign {
        base_closure_amount_inr: derived,
        exchange_rate: rate.value(),
    })
}

fn invoice_rate(billing: &Billing) -> Option<Decimal> {
    match billing {
        Billing::Foreign { exchange_rate, .. } => Some(*exchange_rate),
        Billing::Domestic { .. } => None,
    }
}

fn default_total_base(terms: &[Term], base_closure_amount: Decimal) -> Decimal {
    if terms.is_empty() {
        base_closure_amount
    } else {
        terms.iter().map(|t| t.base_amount).sum()
    }
}

fn entity_name(kind: InvoiceKind) -> &'static str {
    match kind {
        InvoiceKind::Final => "Invoice",
        InvoiceKind::Proforma => "Proforma invoice",
    }
}

fn outcome_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

impl InvoicingService {
    pub async fn create_invoice(
        &self,
        input: &CreateInvoiceRequest,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        self.create(InvoiceKind::Final, input).await
    }

    pub async fn create_proforma(
        &self,
        input: &CreateInvoiceRequest,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        self.create(InvoiceKind::Proforma, input).await
    }

    #[instrument(skip(self, input), fields(kind = kind.as_str(), invoice_no = %input.invoice_no))]
    async fn create(
        &self,
        kind: InvoiceKind,
        input: &CreateInvoiceRequest,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        let (invoice, new_company) = self.new_invoice(kind, input)?;

        // Insert, association and accrual run under the lease so the overlap
        // check sees every earlier invoice for the same agent and company.
        let lease = match (&invoice.agent_id, &invoice.company_id) {
            (Some(agent_id), Some(company_id)) if invoice.is_final() && !new_company => {
                Some(self.acquire_lease(agent_id, company_id).await?)
            }
            _ => None,
        };

        let result = self.persist_new(invoice, new_company).await;
        if let Some(lease) = lease {
            self.release_lease(lease).await;
        }

        metrics::record_invoice_write(kind.as_str(), "create", outcome_label(&result));
        let outcome = result?;
        report_warnings(&outcome.data.id, &outcome.warnings);
        info!(invoice_id = %outcome.data.id, "Invoice created");
        Ok(outcome)
    }

    fn new_invoice(
        &self,
        kind: InvoiceKind,
        input: &CreateInvoiceRequest,
    ) -> Result<(Invoice, bool), InvoicingError> {
        let billing = build_billing(&BillingInput {
            currency: input.currency,
            gst_number: input.gst_number.as_deref(),
            total_gst_amount: input.total_gst_amount,
            total_tds_amount: input.total_tds_amount,
            base_closure_amount: input.base_closure_amount,
            base_closure_amount_inr: input.base_closure_amount_inr,
            exchange_rate: input.exchange_rate,
        })?;
        let terms = term_ledger::derive_terms(&input.terms, input.currency, invoice_rate(&billing))?;
        let total_base_amount = non_negative(input.total_base_amount, "total_base_amount")?
            .unwrap_or_else(|| default_total_base(&terms, input.base_closure_amount));

        let proforma_status = match kind {
            InvoiceKind::Proforma => Some(input.proforma_status.unwrap_or(ProformaStatus::Active)),
            InvoiceKind::Final if input.proforma_status.is_some() => {
                return Err(InvoicingError::validation(
                    "proforma_status applies only to proforma invoices",
                ))
            }
            InvoiceKind::Final => None,
        };

        let new_company = input.company_id.is_none();
        let company_id = input
            .company_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let now = self.clock.now();
        let mut invoice = Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            invoice_no: input.invoice_no.trim().to_string(),
            currency: input.currency,
            billing,
            agent_id: input.agent_id.clone(),
            company_id: Some(company_id),
            company_name: input.company_name.trim().to_string(),
            contact: Contact {
                email: input.email.clone(),
                alternate_emails: input.alternate_emails.clone(),
                phone: input.phone.clone(),
                city: input.city.clone(),
                country: input.country.clone(),
                address: input.address.clone(),
                website: input.website.clone(),
            },
            standards: input.standards.clone(),
            base_closure_amount: input.base_closure_amount,
            total_base_amount,
            pending_payment_in_inr: Decimal::ZERO,
            is_completed: false,
            terms,
            proforma_status,
            attachments: input.attachments.clone(),
            invoice_date: input.invoice_date,
            booked_at: input.invoice_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        term_ledger::refresh_payment_state(&mut invoice);
        Ok((invoice, new_company))
    }

    async fn persist_new(
        &self,
        invoice: Invoice,
        new_company: bool,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        let store = self.store();
        let inserted = &invoice;
        self.insert_once(
            "insert_invoice",
            move || store.insert_invoice(inserted),
            move || store.get_invoice(&inserted.id),
        )
        .await?;

        let mut warnings = self.attach(&invoice, new_company).await;

        if invoice.is_final() {
            if let Err(e) = self.maybe_accrue_target(&invoice).await {
                warnings.push(ConsistencyWarning::new(
                    WarningKind::AccrualFailed,
                    format!("Target accrual failed: {}", e),
                ));
            }
        }

        Ok(Outcome::new(invoice, warnings))
    }

    /// Fetches an invoice of the given kind.
    pub async fn get_invoice(&self, kind: InvoiceKind, id: &str) -> Result<Invoice, InvoicingError> {
        let store = self.store();
        self.call("get_invoice", move || store.get_invoice(id))
            .await?
            .filter(|invoice| invoice.kind == kind)
            .ok_or_else(|| InvoicingError::not_found(entity_name(kind), id))
    }

    /// The invoice plus every other invoice of the same kind for the same
    /// company that shares at least one standard with it.
    #[instrument(skip(self))]
    pub async fn get_invoice_with_related(
        &self,
        kind: InvoiceKind,
        id: &str,
    ) -> Result<(Invoice, Vec<Invoice>), InvoicingError> {
        let invoice = self.get_invoice(kind, id).await?;
        let Some(company_id) = invoice.company_id.clone() else {
            return Ok((invoice, Vec::new()));
        };
        if invoice.standards.is_empty() {
            return Ok((invoice, Vec::new()));
        }

        let filter = InvoiceFilter {
            kind: Some(kind),
            company_id: Some(company_id),
            standards_any: Some(invoice.standards.clone()),
            exclude_id: Some(invoice.id.clone()),
            ..Default::default()
        };
        let store = self.store();
        let filter = &filter;
        let related = self
            .call("find_invoices", move || store.find_invoices(filter, None))
            .await?;
        Ok((invoice, related))
    }

    #[instrument(skip(self, query))]
    pub async fn filter_invoices(
        &self,
        kind: InvoiceKind,
        query: &InvoiceQuery,
    ) -> Result<Listing<Invoice>, InvoicingError> {
        let payment = match query.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("all") => None,
            Some("pending") => Some(PaymentState::Pending),
            Some("completed") => Some(PaymentState::Completed),
            Some(other) => {
                return Err(InvoicingError::validation(format!(
                    "Unknown status filter '{}'; expected pending or completed",
                    other
                )))
            }
        };
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from >= to {
                return Err(InvoicingError::validation("from must be earlier than to"));
            }
        }

        let text = match query.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let agents = AgentFilter {
                    name_contains: Some(needle.to_string()),
                    ..Default::default()
                };
                let store = self.store();
                let agents = &agents;
                let matched = self
                    .call("find_agents", move || store.find_agents(agents, None))
                    .await?;
                Some(TextSearch {
                    needle: needle.to_string(),
                    agent_ids: matched.into_iter().map(|a| a.id).collect(),
                })
            }
            _ => None,
        };

        let filter = InvoiceFilter {
            kind: Some(kind),
            text,
            payment,
            proforma_status: query.proforma_status,
            currency: query.currency,
            city: query.city.clone(),
            country: query.country.clone(),
            agent_id: query.agent_id.clone(),
            company_id: query.company_id.clone(),
            booked_from: query.from,
            booked_to: query.to,
            ..Default::default()
        };
        let page = Page::new(query.limit, query.offset);
        self.list_page(&filter, page).await
    }

    pub(crate) async fn list_page(
        &self,
        filter: &InvoiceFilter,
        page: Page,
    ) -> Result<Listing<Invoice>, InvoicingError> {
        let store = self.store();
        let total = self
            .call("count_invoices", move || store.count_invoices(filter))
            .await?;
        let items = self
            .call("find_invoices", move || store.find_invoices(filter, Some(page)))
            .await?;
        Ok(Listing { items, total, page })
    }

    /// Applies a partial update. Terms are stored as submitted unless
    /// `recompute_derived` asks for them to be derived again.
    #[instrument(skip(self, patch), fields(kind = kind.as_str()))]
    pub async fn update_invoice(
        &self,
        kind: InvoiceKind,
        id: &str,
        patch: &UpdateInvoiceRequest,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        let result = self.apply_update(kind, id, patch).await;
        metrics::record_invoice_write(kind.as_str(), "update", outcome_label(&result));
        let outcome = result?;
        report_warnings(id, &outcome.warnings);
        info!(invoice_id = %id, "Invoice updated");
        Ok(outcome)
    }

    async fn apply_update(
        &self,
        kind: InvoiceKind,
        id: &str,
        patch: &UpdateInvoiceRequest,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        let before = self.get_invoice(kind, id).await?;
        let after = self.merge_patch(&before, patch)?;

        let mut warnings = self.reassign(&before, &after).await;

        let store = self.store();
        let replaced = {
            let after = &after;
            self.call("replace_invoice", move || store.replace_invoice(after))
                .await
        };
        match replaced {
            Ok(true) => Ok(Outcome::new(after, warnings)),
            Ok(false) => {
                self.reassign(&after, &before).await;
                Err(InvoicingError::not_found(entity_name(kind), id))
            }
            Err(e) => {
                // Put the back-references where they were; the invoice is unchanged.
                warnings = self.reassign(&after, &before).await;
                if !warnings.is_empty() {
                    report_warnings(id, &warnings);
                }
                Err(e.into())
            }
        }
    }

    fn merge_patch(
        &self,
        before: &Invoice,
        patch: &UpdateInvoiceRequest,
    ) -> Result<Invoice, InvoicingError> {
        if patch.currency.is_some_and(|c| c != before.currency) {
            return Err(InvoicingError::validation(
                "currency cannot be changed after creation",
            ));
        }
        let currency = before.currency;
        let base_closure_amount = patch
            .base_closure_amount
            .unwrap_or(before.base_closure_amount);

        let billing_input = match &before.billing {
            Billing::Domestic {
                gst_number,
                total_gst_amount,
                total_tds_amount,
            } => BillingInput {
                currency,
                gst_number: Some(patch.gst_number.as_deref().unwrap_or(gst_number)),
                total_gst_amount: Some(patch.total_gst_amount.unwrap_or(*total_gst_amount)),
                total_tds_amount: Some(patch.total_tds_amount.unwrap_or(*total_tds_amount)),
                base_closure_amount,
                base_closure_amount_inr: patch.base_closure_amount_inr,
                exchange_rate: patch.exchange_rate,
            },
            Billing::Foreign { exchange_rate, .. } => BillingInput {
                currency,
                gst_number: patch.gst_number.as_deref(),
                total_gst_amount: patch.total_gst_amount,
                total_tds_amount: patch.total_tds_amount,
                base_closure_amount,
                base_closure_amount_inr: patch.base_closure_amount_inr,
                exchange_rate: Some(patch.exchange_rate.unwrap_or(*exchange_rate)),
            },
        };
        let billing = build_billing(&billing_input)?;

        let terms = match (&patch.terms, patch.recompute_derived) {
            (Some(raw), true) => term_ledger::derive_terms(raw, currency, invoice_rate(&billing))?,
            (Some(raw), false) => term_ledger::accept_terms(raw, currency)?,
            (None, true) => {
                let raw: Vec<RawTerm> = before.terms.iter().map(RawTerm::from).collect();
                term_ledger::derive_terms(&raw, currency, invoice_rate(&billing))?
            }
            (None, false) => before.terms.clone(),
        };

        let mut after = before.clone();
        after.billing = billing;
        after.base_closure_amount = base_closure_amount;
        after.terms = terms;
        if let Some(total) = non_negative(patch.total_base_amount, "total_base_amount")? {
            after.total_base_amount = total;
        }
        if let Some(invoice_no) = &patch.invoice_no {
            after.invoice_no = invoice_no.trim().to_string();
        }
        if let Some(agent_id) = &patch.agent_id {
            after.agent_id = Some(agent_id.clone());
        }
        if let Some(company_id) = &patch.company_id {
            after.company_id = Some(company_id.clone());
        }
        if let Some(name) = &patch.company_name {
            after.company_name = name.trim().to_string();
        }
        if let Some(standards) = &patch.standards {
            after.standards = standards.clone();
        }
        if let Some(attachments) = &patch.attachments {
            after.attachments = attachments.clone();
        }
        if let Some(date) = patch.invoice_date {
            after.invoice_date = Some(date);
        }
        after.booked_at = after.invoice_date.unwrap_or(after.created_at);

        let contact = &mut after.contact;
        if let Some(email) = &patch.email {
            contact.email = email.clone();
        }
        if let Some(alternates) = &patch.alternate_emails {
            contact.alternate_emails = alternates.clone();
        }
        for (field, value) in [
            (&mut contact.phone, &patch.phone),
            (&mut contact.city, &patch.city),
            (&mut contact.country, &patch.country),
            (&mut contact.address, &patch.address),
            (&mut contact.website, &patch.website),
        ] {
            if value.is_some() {
                *field = value.clone();
            }
        }

        term_ledger::refresh_payment_state(&mut after);
        after.updated_at = self.clock.now();
        Ok(after)
    }

    /// Deletes an invoice after removing it from its agent and company.
    #[instrument(skip(self), fields(kind = kind.as_str()))]
    pub async fn delete_invoice(
        &self,
        kind: InvoiceKind,
        id: &str,
    ) -> Result<Outcome<Invoice>, InvoicingError> {
        let result = self.remove(kind, id).await;
        metrics::record_invoice_write(kind.as_str(), "delete", outcome_label(&result));
        let outcome = result?;
        report_warnings(id, &outcome.warnings);
        info!(invoice_id = %id, "Invoice deleted");
        Ok(outcome)
    }

    async fn remove(&self, kind: InvoiceKind, id: &str) -> Result<Outcome<Invoice>, InvoicingError> {
        // Read first: the agent and company ids are needed for cleanup.
        let invoice = self.get_invoice(kind, id).await?;
        let warnings = self.detach(&invoice).await;

        let store = self.store();
        let deleted = match self
            .call("delete_invoice", move || store.delete_invoice(id))
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                // The invoice is still stored: point its agent and company back at it.
                let restored = self.attach(&invoice, false).await;
                report_warnings(id, &restored);
                return Err(e.into());
            }
        };
        if !deleted {
            warn!(invoice_id = %id, "Invoice disappeared before it could be deleted");
        }
        Ok(Outcome::new(invoice, warnings))
    }

    /// Sets one term's payment status and recomputes the invoice's pending
    /// amount and completion flag.
    #[instrument(skip(self))]
    pub async fn update_term_status(
        &self,
        invoice_id: &str,
        term_id: &str,
        status: TermStatus,
    ) -> Result<Invoice, InvoicingError> {
        let invoice = self.get_invoice(InvoiceKind::Final, invoice_id).await?;
        let term = invoice
            .terms
            .iter()
            .find(|t| t.term_id == term_id)
            .ok_or_else(|| InvoicingError::not_found("Term", term_id))?;
        if term.status == TermStatus::Paid && status == TermStatus::Pending {
            warn!(
                invoice_id = %invoice_id,
                term_id = %term_id,
                "Re-opening a paid term"
            );
        }

        let store = self.store();
        let now = self.clock.now();
        let updated = self
            .call("set_term_status", move || {
                store.set_term_status(invoice_id, term_id, status, now)
            })
            .await?
            .ok_or_else(|| InvoicingError::not_found("Term", term_id))?;

        metrics::record_invoice_write(InvoiceKind::Final.as_str(), "term_status", "success");
        info!(
            invoice_id = %invoice_id,
            term_id = %term_id,
            status = status.as_str(),
            pending_in_inr = %updated.pending_payment_in_inr,
            "Term status updated"
        );
        Ok(updated)
    }

    /// Terms of an invoice that are still awaiting payment.
    pub async fn pending_terms(&self, invoice_id: &str) -> Result<Vec<Term>, InvoicingError> {
        let invoice = self.get_invoice(InvoiceKind::Final, invoice_id).await?;
        Ok(invoice.terms.into_iter().filter(Term::is_pending).collect())
    }

    #[instrument(skip(self))]
    pub async fn set_proforma_status(
        &self,
        id: &str,
        status: ProformaStatus,
    ) -> Result<Invoice, InvoicingError> {
        self.get_invoice(InvoiceKind::Proforma, id).await?;

        let store = self.store();
        let now = self.clock.now();
        let updated = self
            .call("set_proforma_status", move || {
                store.set_proforma_status(id, status, now)
            })
            .await?
            .ok_or_else(|| InvoicingError::not_found("Proforma invoice", id))?;

        metrics::record_invoice_write(InvoiceKind::Proforma.as_str(), "status", "success");
        info!(invoice_id = %id, status = status.as_str(), "Proforma status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domestic<'a>(gst: Option<&'a str>) -> BillingInput<'a> {
        BillingInput {
            currency: Currency::Inr,
            gst_number: gst,
            total_gst_amount: Some(dec!(180)),
            total_tds_amount: Some(Decimal::ZERO),
            base_closure_amount: dec!(1000),
            base_closure_amount_inr: None,
            exchange_rate: None,
        }
    }

    fn foreign(rate: Option<Decimal>) -> BillingInput<'static> {
        BillingInput {
            currency: Currency::Usd,
            gst_number: None,
            total_gst_amount: None,
            total_tds_amount: None,
            base_closure_amount: dec!(100),
            base_closure_amount_inr: None,
            exchange_rate: rate,
        }
    }

    #[test]
    fn test_domestic_billing_requires_gst_number() {
        assert!(build_billing(&domestic(Some("29ABCDE1234F1Z5"))).is_ok());
        assert!(matches!(
            build_billing(&domestic(None)),
            Err(InvoicingError::Validation(_))
        ));
        assert!(build_billing(&domestic(Some("  "))).is_err());
    }

    #[test]
    fn test_domestic_billing_rejects_foreign_fields() {
        let mut input = domestic(Some("29ABCDE1234F1Z5"));
        input.exchange_rate = Some(dec!(83));
        assert!(build_billing(&input).is_err());
    }

    #[test]
    fn test_foreign_billing_derives_inr_closure() {
        let billing = build_billing(&foreign(Some(dec!(83)))).unwrap();
        assert_eq!(
            billing,
            Billing::Foreign {
                base_closure_amount_inr: dec!(8300),
                exchange_rate: dec!(83)
            }
        );
    }

    #[test]
    fn test_foreign_billing_rate_is_mandatory_and_positive() {
        assert!(build_billing(&foreign(None)).is_err());
        assert!(build_billing(&foreign(Some(Decimal::ZERO))).is_err());
        assert!(build_billing(&foreign(Some(dec!(-2)))).is_err());
    }

    #[test]
    fn test_foreign_billing_checks_supplied_inr_amount() {
        let mut input = foreign(Some(dec!(83)));
        input.base_closure_amount_inr = Some(dec!(8300));
        assert!(build_billing(&input).is_ok());

        input.base_closure_amount_inr = Some(dec!(9000));
        assert!(build_billing(&input).is_err());
    }

    #[test]
    fn test_supplied_inr_amount_must_match_rounded_conversion() {
        let mut input = foreign(Some(dec!(83.33)));
        input.base_closure_amount = dec!(0.3);
        // 0.3 x 83.33 = 24.999 -> 25.00
        input.base_closure_amount_inr = Some(dec!(25.00));
        assert_eq!(
            build_billing(&input).unwrap(),
            Billing::Foreign {
                base_closure_amount_inr: dec!(25.00),
                exchange_rate: dec!(83.33)
            }
        );

        input.base_closure_amount_inr = Some(dec!(25.02));
        assert!(build_billing(&input).is_err());
    }

    #[test]
    fn test_oversized_closure_is_rejected() {
        let mut input = domestic(Some("29ABCDE1234F1Z5"));
        input.base_closure_amount = MAX_AMOUNT + Decimal::ONE;
        assert!(matches!(
            build_billing(&input),
            Err(InvoicingError::Validation(_))
        ));
    }

    #[test]
    fn test_foreign_billing_rejects_gst_fields() {
        let mut input = foreign(Some(dec!(83)));
        input.total_gst_amount = Some(dec!(10));
        assert!(build_billing(&input).is_err());
    }
}
