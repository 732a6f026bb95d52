//! Read-only aggregations over final invoices.
//!
//! Every figure is taken in INR through `Invoice::inr_closure`, and every
//! date bucket reads `booked_at`. The pure functions at the top do the
//! arithmetic; the service methods below only select the invoices.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::instrument;

use super::error::InvoicingError;
use super::invoices::Listing;
use super::invoicing::InvoicingService;
use super::store::{AgentFilter, InvoiceFilter, Page, PaymentState};
use crate::models::{round_money, Agent, Currency, Invoice, InvoiceKind};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// How repeat billing for the same scope is collapsed in monthly figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    /// One closure per (company, standard).
    CompanyStandard,
    /// One closure per (agent, company, standard); used for manager rollups
    /// where two agents may close the same company and standard.
    AgentCompanyStandard,
}

/// `achieved / target * 100`, rounded to two decimals; 0 when there is no
/// target.
pub fn percentage(achieved: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(achieved * Decimal::ONE_HUNDRED / target)
}

/// Number of distinct (company, standard) pairs. Invoices without a company
/// or without standards contribute nothing.
pub fn unique_pair_count(invoices: &[Invoice]) -> usize {
    let mut pairs: HashSet<(&str, &str)> = HashSet::new();
    for invoice in invoices {
        let Some(company) = invoice.company_id.as_deref() else {
            continue;
        };
        for standard in &invoice.standards {
            pairs.insert((company, standard.as_str()));
        }
    }
    pairs.len()
}

/// Pending INR amounts of incomplete invoices, per invoice currency.
pub fn pending_by_currency(invoices: &[Invoice]) -> BTreeMap<Currency, Decimal> {
    let mut totals = BTreeMap::new();
    for invoice in invoices.iter().filter(|i| !i.is_completed) {
        *totals.entry(invoice.currency).or_insert(Decimal::ZERO) += invoice.pending_payment_in_inr;
    }
    totals
}

/// A stored tax total that does not agree with the sum over its terms. Both
/// sides are paise-exact, so any difference is reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub invoice_id: String,
    pub invoice_no: String,
    pub stored: Decimal,
    pub from_terms: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GstRow {
    pub invoice_id: String,
    pub invoice_no: String,
    pub company_name: String,
    pub booked_at: DateTime<Utc>,
    pub total_gst_amount: Decimal,
    pub term_gst_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GstReport {
    pub total_gst_amount: Decimal,
    pub rows: Vec<GstRow>,
    pub discrepancies: Vec<Discrepancy>,
}

/// GST per INR invoice from the stored totals, with term sums alongside.
pub fn gst_report(invoices: &[Invoice]) -> GstReport {
    let mut rows = Vec::new();
    let mut discrepancies = Vec::new();
    for invoice in invoices {
        let Some(stored) = invoice.stored_gst_total() else {
            continue;
        };
        let from_terms = invoice.term_gst_total();
        if !invoice.terms.is_empty() && stored != from_terms {
            discrepancies.push(Discrepancy {
                invoice_id: invoice.id.clone(),
                invoice_no: invoice.invoice_no.clone(),
                stored,
                from_terms,
            });
        }
        rows.push(GstRow {
            invoice_id: invoice.id.clone(),
            invoice_no: invoice.invoice_no.clone(),
            company_name: invoice.company_name.clone(),
            booked_at: invoice.booked_at,
            total_gst_amount: stored,
            term_gst_amount: from_terms,
        });
    }
    GstReport {
        total_gst_amount: rows.iter().map(|r| r.total_gst_amount).sum(),
        rows,
        discrepancies,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TdsGroup {
    pub company_id: Option<String>,
    pub company_name: String,
    pub standards: Vec<String>,
    pub invoice_count: usize,
    pub total_tds_amount: Decimal,
    pub term_tds_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TdsReport {
    pub total_tds_amount: Decimal,
    pub term_tds_amount: Decimal,
    pub groups: Vec<TdsGroup>,
    pub discrepancies: Vec<Discrepancy>,
}

/// TDS of INR invoices grouped by company and standard set. Both the stored
/// totals and the per-term sums are reported; disagreeing invoices are
/// listed rather than reconciled.
pub fn tds_report(invoices: &[Invoice]) -> TdsReport {
    let mut groups: BTreeMap<(String, Vec<String>), TdsGroup> = BTreeMap::new();
    let mut discrepancies = Vec::new();

    for invoice in invoices {
        let Some(stored) = invoice.stored_tds_total() else {
            continue;
        };
        let from_terms = invoice.term_tds_total();
        if !invoice.terms.is_empty() && stored != from_terms {
            discrepancies.push(Discrepancy {
                invoice_id: invoice.id.clone(),
                invoice_no: invoice.invoice_no.clone(),
                stored,
                from_terms,
            });
        }

        let mut standards = invoice.standards.clone();
        standards.sort();
        let company_key = invoice
            .company_id
            .clone()
            .unwrap_or_else(|| invoice.company_name.clone());
        let group = groups
            .entry((company_key, standards.clone()))
            .or_insert_with(|| TdsGroup {
                company_id: invoice.company_id.clone(),
                company_name: invoice.company_name.clone(),
                standards,
                invoice_count: 0,
                total_tds_amount: Decimal::ZERO,
                term_tds_amount: Decimal::ZERO,
            });
        group.invoice_count += 1;
        group.total_tds_amount += stored;
        group.term_tds_amount += from_terms;
    }

    let groups: Vec<TdsGroup> = groups.into_values().collect();
    TdsReport {
        total_tds_amount: groups.iter().map(|g| g.total_tds_amount).sum(),
        term_tds_amount: groups.iter().map(|g| g.term_tds_amount).sum(),
        groups,
        discrepancies,
    }
}

/// INR closure per calendar month of `year`, index 0 being January.
///
/// Within a month the earliest invoice for a scope key counts and later
/// ones for the same key do not. An invoice counts in full when at least
/// one of its keys is new; invoices without standards always count.
pub fn monthly_closures(invoices: &[Invoice], year: i32, scope: DedupScope) -> [Decimal; 12] {
    let mut ordered: Vec<&Invoice> = invoices
        .iter()
        .filter(|i| i.is_final() && i.booked_at.year() == year)
        .collect();
    ordered.sort_by(|a, b| a.booked_at.cmp(&b.booked_at).then_with(|| a.id.cmp(&b.id)));

    let mut totals = [Decimal::ZERO; 12];
    let mut seen: Vec<HashSet<(Option<&str>, Option<&str>, &str)>> = vec![HashSet::new(); 12];

    for invoice in ordered {
        let month = invoice.booked_at.month0() as usize;
        let amount = invoice.inr_closure();
        if invoice.standards.is_empty() {
            totals[month] += amount;
            continue;
        }
        let agent = match scope {
            DedupScope::CompanyStandard => None,
            DedupScope::AgentCompanyStandard => invoice.agent_id.as_deref(),
        };
        let company = invoice.company_id.as_deref();
        let mut fresh = false;
        for standard in &invoice.standards {
            fresh |= seen[month].insert((agent, company, standard.as_str()));
        }
        if fresh {
            totals[month] += amount;
        }
    }
    totals
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAmount {
    pub month: u32,
    pub month_name: &'static str,
    pub amount: Decimal,
}

fn monthly_rows(totals: [Decimal; 12]) -> Vec<MonthlyAmount> {
    totals
        .iter()
        .enumerate()
        .map(|(i, amount)| MonthlyAmount {
            month: i as u32 + 1,
            month_name: MONTH_NAMES[i],
            amount: *amount,
        })
        .collect()
}

/// Achievement against a target for one month.
#[derive(Debug, Clone, Serialize)]
pub struct TargetPoint {
    pub month: u32,
    pub month_name: &'static str,
    pub target: Decimal,
    pub achieved: Decimal,
    pub percentage: Decimal,
}

fn target_rows(totals: [Decimal; 12], target: Decimal) -> Vec<TargetPoint> {
    totals
        .iter()
        .enumerate()
        .map(|(i, achieved)| TargetPoint {
            month: i as u32 + 1,
            month_name: MONTH_NAMES[i],
            target,
            achieved: *achieved,
            percentage: percentage(*achieved, target),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentClosure {
    pub agent_id: String,
    pub agent_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerPerformance {
    pub manager_id: String,
    pub manager_name: String,
    pub agent_count: usize,
    pub target: Decimal,
    pub achieved: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentProgress {
    pub agent_id: String,
    pub agent_name: String,
    pub target: Decimal,
    pub achieved: Decimal,
    pub percentage: Decimal,
}

impl From<&Agent> for AgentProgress {
    fn from(agent: &Agent) -> Self {
        Self {
            agent_id: agent.id.clone(),
            agent_name: agent.agent_name.clone(),
            target: agent.target,
            achieved: agent.target_achieved,
            percentage: percentage(agent.target_achieved, agent.target),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardTotals {
    pub proforma_invoice_count: u64,
    pub company_count: u64,
    pub unique_invoice_count: usize,
    pub total_gst_amount: Decimal,
    pub total_tds_amount: Decimal,
    pub pending_by_currency: BTreeMap<Currency, Decimal>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub totals: DashboardTotals,
    pub recent_invoices: Vec<Invoice>,
    pub recent_pending_invoices: Vec<Invoice>,
}

fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), InvoicingError> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let end = year
        .checked_add(1)
        .and_then(|next| Utc.with_ymd_and_hms(next, 1, 1, 0, 0, 0).single());
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(InvoicingError::validation(format!("Invalid year {}", year))),
    }
}

fn check_month(month: u32) -> Result<usize, InvoicingError> {
    if (1..=12).contains(&month) {
        Ok(month as usize - 1)
    } else {
        Err(InvoicingError::validation(format!(
            "month must be between 1 and 12, got {}",
            month
        )))
    }
}

impl InvoicingService {
    async fn final_invoices(&self, filter: InvoiceFilter) -> Result<Vec<Invoice>, InvoicingError> {
        let filter = InvoiceFilter {
            kind: Some(InvoiceKind::Final),
            ..filter
        };
        let store = self.store();
        let filter = &filter;
        Ok(self
            .call("find_invoices", move || store.find_invoices(filter, None))
            .await?)
    }

    async fn invoices_in_year(
        &self,
        year: i32,
        agent_ids: Option<Vec<String>>,
    ) -> Result<Vec<Invoice>, InvoicingError> {
        let (from, to) = year_bounds(year)?;
        self.final_invoices(InvoiceFilter {
            agent_ids,
            ..InvoiceFilter::default().booked_between(from, to)
        })
        .await
    }

    async fn agents_matching(&self, filter: AgentFilter) -> Result<Vec<Agent>, InvoicingError> {
        let store = self.store();
        let filter = &filter;
        Ok(self
            .call("find_agents", move || store.find_agents(filter, None))
            .await?)
    }

    async fn agents_of_manager(&self, manager_id: &str) -> Result<Vec<Agent>, InvoicingError> {
        self.agents_matching(AgentFilter {
            manager_id: Some(manager_id.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Distinct (company, standard) pairs across final invoices.
    pub async fn unique_invoice_count(&self) -> Result<usize, InvoicingError> {
        let invoices = self.final_invoices(InvoiceFilter::default()).await?;
        Ok(unique_pair_count(&invoices))
    }

    #[instrument(skip(self))]
    pub async fn pending_totals(&self) -> Result<BTreeMap<Currency, Decimal>, InvoicingError> {
        let invoices = self
            .final_invoices(InvoiceFilter {
                payment: Some(PaymentState::Pending),
                ..Default::default()
            })
            .await?;
        Ok(pending_by_currency(&invoices))
    }

    #[instrument(skip(self))]
    pub async fn gst_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<GstReport, InvoicingError> {
        let invoices = self
            .final_invoices(InvoiceFilter {
                currency: Some(Currency::Inr),
                booked_from: from,
                booked_to: to,
                ..Default::default()
            })
            .await?;
        let report = gst_report(&invoices);
        for d in &report.discrepancies {
            tracing::warn!(
                invoice_id = %d.invoice_id,
                stored = %d.stored,
                from_terms = %d.from_terms,
                "Stored GST total disagrees with its terms"
            );
            super::metrics::record_warning(super::error::WarningKind::GstMismatch.as_str());
        }
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn tds_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<TdsReport, InvoicingError> {
        let invoices = self
            .final_invoices(InvoiceFilter {
                currency: Some(Currency::Inr),
                booked_from: from,
                booked_to: to,
                ..Default::default()
            })
            .await?;
        let report = tds_report(&invoices);
        for d in &report.discrepancies {
            tracing::warn!(
                invoice_id = %d.invoice_id,
                stored = %d.stored,
                from_terms = %d.from_terms,
                "Stored TDS total disagrees with its terms"
            );
            super::metrics::record_warning(super::error::WarningKind::TdsMismatch.as_str());
        }
        Ok(report)
    }

    /// Deduplicated closures per month for the whole business or one agent.
    #[instrument(skip(self))]
    pub async fn monthly_closure(
        &self,
        year: i32,
        agent_id: Option<&str>,
    ) -> Result<Vec<MonthlyAmount>, InvoicingError> {
        let agents = agent_id.map(|id| vec![id.to_string()]);
        let invoices = self.invoices_in_year(year, agents).await?;
        Ok(monthly_rows(monthly_closures(
            &invoices,
            year,
            DedupScope::CompanyStandard,
        )))
    }

    /// Every agent's closure in one month, largest first.
    #[instrument(skip(self))]
    pub async fn agentwise_closures(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<AgentClosure>, InvoicingError> {
        let index = check_month(month)?;
        let agents = self.agents_matching(AgentFilter::default()).await?;
        let invoices = self.invoices_in_year(year, None).await?;

        let mut by_agent: HashMap<&str, Vec<Invoice>> = HashMap::new();
        for invoice in &invoices {
            if let Some(agent_id) = invoice.agent_id.as_deref() {
                by_agent.entry(agent_id).or_default().push(invoice.clone());
            }
        }

        let mut rows: Vec<AgentClosure> = agents
            .iter()
            .map(|agent| {
                let amount = by_agent
                    .get(agent.id.as_str())
                    .map(|own| monthly_closures(own, year, DedupScope::CompanyStandard)[index])
                    .unwrap_or(Decimal::ZERO);
                AgentClosure {
                    agent_id: agent.id.clone(),
                    agent_name: agent.agent_name.clone(),
                    amount,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.agent_name.cmp(&b.agent_name))
        });
        Ok(rows)
    }

    /// One agent's monthly achievement against its target.
    #[instrument(skip(self))]
    pub async fn agent_monthly_performance(
        &self,
        agent_id: &str,
        year: i32,
    ) -> Result<Vec<TargetPoint>, InvoicingError> {
        let agent = self.get_agent(agent_id).await?;
        let invoices = self
            .invoices_in_year(year, Some(vec![agent.id.clone()]))
            .await?;
        let totals = monthly_closures(&invoices, year, DedupScope::CompanyStandard);
        Ok(target_rows(totals, agent.target))
    }

    /// Closure per month across a manager's agents.
    #[instrument(skip(self))]
    pub async fn manager_monthly_closure(
        &self,
        manager_id: &str,
        year: i32,
    ) -> Result<Vec<MonthlyAmount>, InvoicingError> {
        self.get_manager(manager_id).await?;
        let agents = self.agents_of_manager(manager_id).await?;
        let totals = self.manager_totals(&agents, year).await?;
        Ok(monthly_rows(totals))
    }

    /// Twelve points of a manager's achievement against the sum of its
    /// agents' targets.
    #[instrument(skip(self))]
    pub async fn manager_target_graph(
        &self,
        manager_id: &str,
        year: i32,
    ) -> Result<Vec<TargetPoint>, InvoicingError> {
        self.get_manager(manager_id).await?;
        let agents = self.agents_of_manager(manager_id).await?;
        let target: Decimal = agents.iter().map(|a| a.target).sum();
        let totals = self.manager_totals(&agents, year).await?;
        Ok(target_rows(totals, target))
    }

    async fn manager_totals(
        &self,
        agents: &[Agent],
        year: i32,
    ) -> Result<[Decimal; 12], InvoicingError> {
        if agents.is_empty() {
            return Ok([Decimal::ZERO; 12]);
        }
        let ids = agents.iter().map(|a| a.id.clone()).collect();
        let invoices = self.invoices_in_year(year, Some(ids)).await?;
        Ok(monthly_closures(
            &invoices,
            year,
            DedupScope::AgentCompanyStandard,
        ))
    }

    /// Every manager's achievement for one month.
    #[instrument(skip(self))]
    pub async fn overall_manager_performance(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<ManagerPerformance>, InvoicingError> {
        let index = check_month(month)?;
        let managers = self.list_managers(None).await?;
        let invoices = self.invoices_in_year(year, None).await?;
        let agents = self.agents_matching(AgentFilter::default()).await?;

        let mut rows = Vec::with_capacity(managers.len());
        for manager in managers {
            let team: Vec<&Agent> = agents
                .iter()
                .filter(|a| a.manager_id.as_deref() == Some(manager.id.as_str()))
                .collect();
            let team_ids: HashSet<&str> = team.iter().map(|a| a.id.as_str()).collect();
            let own: Vec<Invoice> = invoices
                .iter()
                .filter(|i| i.agent_id.as_deref().is_some_and(|a| team_ids.contains(a)))
                .cloned()
                .collect();
            let achieved = monthly_closures(&own, year, DedupScope::AgentCompanyStandard)[index];
            let target: Decimal = team.iter().map(|a| a.target).sum();
            rows.push(ManagerPerformance {
                manager_id: manager.id,
                manager_name: manager.name,
                agent_count: team.len(),
                target,
                achieved,
                percentage: percentage(achieved, target),
            });
        }
        Ok(rows)
    }

    pub async fn agent_progress(&self, agent_id: &str) -> Result<AgentProgress, InvoicingError> {
        let agent = self.get_agent(agent_id).await?;
        Ok(AgentProgress::from(&agent))
    }

    /// Final invoices with at least one pending term, newest first.
    pub async fn pending_invoices(&self, page: Page) -> Result<Listing<Invoice>, InvoicingError> {
        let filter = InvoiceFilter {
            kind: Some(InvoiceKind::Final),
            has_pending_terms: Some(true),
            ..Default::default()
        };
        self.list_page(&filter, page).await
    }

    /// Invoices with pending terms keyed by standard. An invoice with several
    /// standards is listed under each of them.
    #[instrument(skip(self))]
    pub async fn pending_by_standard(&self) -> Result<BTreeMap<String, Vec<Invoice>>, InvoicingError> {
        let invoices = self
            .final_invoices(InvoiceFilter {
                has_pending_terms: Some(true),
                ..Default::default()
            })
            .await?;
        let mut groups: BTreeMap<String, Vec<Invoice>> = BTreeMap::new();
        for invoice in invoices {
            for standard in &invoice.standards {
                groups
                    .entry(standard.clone())
                    .or_default()
                    .push(invoice.clone());
            }
        }
        Ok(groups)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, InvoicingError> {
        let store = self.store();

        let proforma = InvoiceFilter::of_kind(InvoiceKind::Proforma);
        let proforma = &proforma;
        let proforma_invoice_count = self
            .call("count_invoices", move || store.count_invoices(proforma))
            .await?;
        let company_count = self
            .call("count_companies", move || store.count_companies())
            .await?;

        let invoices = self.final_invoices(InvoiceFilter::default()).await?;
        let gst = gst_report(&invoices);
        let tds = tds_report(&invoices);

        let recent = InvoiceFilter::of_kind(InvoiceKind::Final);
        let recent_pending = InvoiceFilter {
            payment: Some(PaymentState::Pending),
            ..InvoiceFilter::of_kind(InvoiceKind::Final)
        };
        let (recent, recent_pending) = (&recent, &recent_pending);
        let three = Page::new(3, 0);
        let recent_invoices = self
            .call("find_invoices", move || store.find_invoices(recent, Some(three)))
            .await?;
        let recent_pending_invoices = self
            .call("find_invoices", move || {
                store.find_invoices(recent_pending, Some(three))
            })
            .await?;

        Ok(Dashboard {
            totals: DashboardTotals {
                proforma_invoice_count,
                company_count,
                unique_invoice_count: unique_pair_count(&invoices),
                total_gst_amount: gst.total_gst_amount,
                total_tds_amount: tds.total_tds_amount,
                pending_by_currency: pending_by_currency(&invoices),
            },
            recent_invoices,
            recent_pending_invoices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Billing, Contact, Term, TermStatus, TermTax};
    use rust_decimal_macros::dec;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn invoice(
        id: &str,
        company: &str,
        standards: &[&str],
        amount: Decimal,
        when: DateTime<Utc>,
    ) -> Invoice {
        Invoice {
            id: id.to_string(),
            kind: InvoiceKind::Final,
            invoice_no: format!("INV-{}", id),
            currency: Currency::Inr,
            billing: Billing::Domestic {
                gst_number: "29ABCDE1234F1Z5".into(),
                total_gst_amount: Decimal::ZERO,
                total_tds_amount: Decimal::ZERO,
            },
            agent_id: Some("agent-1".into()),
            company_id: Some(company.to_string()),
            company_name: company.to_uppercase(),
            contact: Contact::default(),
            standards: standards.iter().map(|s| s.to_string()).collect(),
            base_closure_amount: amount,
            total_base_amount: amount,
            pending_payment_in_inr: Decimal::ZERO,
            is_completed: false,
            terms: Vec::new(),
            proforma_status: None,
            attachments: Vec::new(),
            invoice_date: Some(when),
            booked_at: when,
            created_at: when,
            updated_at: when,
        }
    }

    fn domestic_term(gst: Decimal, tds: Decimal) -> Term {
        Term {
            term_id: uuid::Uuid::new_v4().to_string(),
            term_name: "Advance".into(),
            base_amount: dec!(1000),
            tax: TermTax::Domestic {
                gst_percentage: dec!(18),
                gst_amount: gst,
                tds_amount: tds,
            },
            term_total: dec!(1000) + gst - tds,
            status: TermStatus::Pending,
        }
    }

    fn domestic_billing(gst: Decimal, tds: Decimal) -> Billing {
        Billing::Domestic {
            gst_number: "G".into(),
            total_gst_amount: gst,
            total_tds_amount: tds,
        }
    }

    #[test]
    fn test_percentage_of_zero_target_is_zero() {
        assert_eq!(percentage(dec!(500), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage(dec!(500), dec!(-10)), Decimal::ZERO);
        assert_eq!(percentage(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(percentage(dec!(2), dec!(3)), dec!(66.67));
        assert_eq!(percentage(dec!(1500), dec!(1000)), dec!(150));
    }

    #[test]
    fn test_unique_pairs_ignore_repeat_billing() {
        let when = at(2024, 3, 1);
        let invoices = vec![
            invoice("a", "c1", &["ISO9001"], dec!(100), when),
            invoice("b", "c1", &["ISO9001", "ISO14001"], dec!(100), when),
            invoice("c", "c2", &["ISO9001"], dec!(100), when),
            invoice("d", "c3", &[], dec!(100), when),
        ];
        assert_eq!(unique_pair_count(&invoices), 3);
    }

    #[test]
    fn test_pending_totals_skip_completed_invoices() {
        let when = at(2024, 3, 1);
        let mut invoices = vec![
            invoice("a", "c1", &[], Decimal::ZERO, when),
            invoice("b", "c1", &[], Decimal::ZERO, when),
            invoice("c", "c1", &[], Decimal::ZERO, when),
        ];
        for (invoice, (pending, done)) in invoices
            .iter_mut()
            .zip([(dec!(100), false), (Decimal::ZERO, true), (dec!(50), false)])
        {
            invoice.pending_payment_in_inr = pending;
            invoice.is_completed = done;
        }

        let totals = pending_by_currency(&invoices);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[&Currency::Inr], dec!(150));
    }

    #[test]
    fn test_pending_totals_are_split_by_currency() {
        let when = at(2024, 3, 1);
        let mut usd = invoice("a", "c1", &[], dec!(100), when);
        usd.currency = Currency::Usd;
        usd.pending_payment_in_inr = dec!(8300);
        let mut inr = invoice("b", "c1", &[], dec!(100), when);
        inr.pending_payment_in_inr = dec!(500);

        let totals = pending_by_currency(&[usd, inr]);
        assert_eq!(totals[&Currency::Usd], dec!(8300));
        assert_eq!(totals[&Currency::Inr], dec!(500));
    }

    #[test]
    fn test_monthly_closure_dedups_within_month_only() {
        let invoices = vec![
            invoice("a", "c1", &["ISO9001"], dec!(1000), at(2024, 3, 2)),
            invoice("b", "c1", &["ISO9001"], dec!(500), at(2024, 3, 20)),
            invoice("c", "c1", &["ISO9001"], dec!(700), at(2024, 4, 5)),
            invoice("d", "c1", &["ISO9001", "ISO14001"], dec!(300), at(2024, 3, 25)),
            invoice("e", "c2", &[], dec!(50), at(2024, 3, 25)),
            invoice("f", "c1", &["ISO9001"], dec!(999), at(2023, 3, 2)),
        ];

        let totals = monthly_closures(&invoices, 2024, DedupScope::CompanyStandard);
        assert_eq!(totals[2], dec!(1350));
        assert_eq!(totals[3], dec!(700));
        assert_eq!(totals.iter().sum::<Decimal>(), dec!(2050));
    }

    #[test]
    fn test_monthly_closure_of_small_amounts_is_exact() {
        let invoices = vec![
            invoice("a", "c1", &[], dec!(0.1), at(2024, 5, 1)),
            invoice("b", "c2", &[], dec!(0.2), at(2024, 5, 2)),
        ];
        let totals = monthly_closures(&invoices, 2024, DedupScope::CompanyStandard);
        assert_eq!(totals[4], dec!(0.3));
    }

    #[test]
    fn test_manager_scope_keeps_agents_apart() {
        let first = invoice("a", "c1", &["ISO9001"], dec!(1000), at(2024, 6, 1));
        let mut second = invoice("b", "c1", &["ISO9001"], dec!(400), at(2024, 6, 2));
        second.agent_id = Some("agent-2".into());
        let invoices = vec![first, second];

        assert_eq!(
            monthly_closures(&invoices, 2024, DedupScope::CompanyStandard)[5],
            dec!(1000)
        );
        assert_eq!(
            monthly_closures(&invoices, 2024, DedupScope::AgentCompanyStandard)[5],
            dec!(1400)
        );
    }

    #[test]
    fn test_monthly_closure_reads_inr_amount_for_foreign_invoices() {
        let mut usd = invoice("a", "c1", &["ISO9001"], dec!(100), at(2024, 1, 10));
        usd.currency = Currency::Usd;
        usd.billing = Billing::Foreign {
            base_closure_amount_inr: dec!(8300),
            exchange_rate: dec!(83),
        };
        assert_eq!(
            monthly_closures(&[usd], 2024, DedupScope::CompanyStandard)[0],
            dec!(8300)
        );
    }

    #[test]
    fn test_gst_report_flags_mismatched_totals() {
        let when = at(2024, 2, 1);
        let mut good = invoice("a", "c1", &[], dec!(1000), when);
        good.terms = vec![domestic_term(dec!(180), Decimal::ZERO)];
        good.billing = domestic_billing(dec!(180), Decimal::ZERO);
        let mut bad = invoice("b", "c1", &[], dec!(1000), when);
        bad.terms = vec![domestic_term(dec!(180), Decimal::ZERO)];
        bad.billing = domestic_billing(dec!(200), Decimal::ZERO);

        let report = gst_report(&[good, bad]);
        assert_eq!(report.total_gst_amount, dec!(380));
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].invoice_id, "b");
        assert_eq!(report.discrepancies[0].from_terms, dec!(180));
    }

    #[test]
    fn test_gst_report_flags_a_single_paisa() {
        let mut invoice = invoice("a", "c1", &[], dec!(1000), at(2024, 2, 1));
        invoice.terms = vec![
            domestic_term(dec!(0.1), Decimal::ZERO),
            domestic_term(dec!(0.2), Decimal::ZERO),
        ];
        invoice.billing = domestic_billing(dec!(0.3), Decimal::ZERO);
        assert!(gst_report(std::slice::from_ref(&invoice)).discrepancies.is_empty());

        invoice.billing = domestic_billing(dec!(0.31), Decimal::ZERO);
        assert_eq!(gst_report(&[invoice]).discrepancies.len(), 1);
    }

    #[test]
    fn test_tds_report_groups_by_company_and_standards() {
        let when = at(2024, 2, 1);
        let mut a = invoice("a", "c1", &["ISO14001", "ISO9001"], dec!(1000), when);
        a.terms = vec![domestic_term(dec!(180), dec!(100))];
        a.billing = domestic_billing(dec!(180), dec!(100));
        let mut b = invoice("b", "c1", &["ISO9001", "ISO14001"], dec!(1000), when);
        b.terms = vec![domestic_term(dec!(180), dec!(50))];
        b.billing = domestic_billing(dec!(180), dec!(80));

        let report = tds_report(&[a, b]);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].invoice_count, 2);
        assert_eq!(report.total_tds_amount, dec!(180));
        assert_eq!(report.term_tds_amount, dec!(150));
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].invoice_id, "b");
    }

    #[test]
    fn test_year_bounds_reject_years_without_a_successor() {
        assert!(year_bounds(2024).is_ok());
        assert!(matches!(
            year_bounds(i32::MAX),
            Err(InvoicingError::Validation(_))
        ));
    }
}
