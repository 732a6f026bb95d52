//! Target accrual and the per-(agent, company) lease that serialises it.

use rust_decimal::Decimal;
use std::time::Duration;
use tracing::instrument;

use super::error::InvoicingError;
use super::invoicing::InvoicingService;
use super::metrics;
use super::store::InvoiceFilter;
use crate::models::{Agent, Invoice, InvoiceKind, MAX_AMOUNT};

/// What `maybe_accrue_target` decided for one invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccrualOutcome {
    Credited(Decimal),
    /// Another final invoice already closed the same agent, company and
    /// standard.
    Duplicate,
    NothingToCredit,
    NoAgent,
    AgentMissing,
}

impl AccrualOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccrualOutcome::Credited(_) => "credited",
            AccrualOutcome::Duplicate => "duplicate",
            AccrualOutcome::NothingToCredit => "nothing_to_credit",
            AccrualOutcome::NoAgent => "no_agent",
            AccrualOutcome::AgentMissing => "agent_missing",
        }
    }
}

/// A held lease; hand it back to `release_lease`.
#[derive(Debug)]
pub(crate) struct Lease {
    key: String,
    holder: String,
}

const LEASE_POLL_START: Duration = Duration::from_millis(10);
const LEASE_POLL_MAX: Duration = Duration::from_millis(200);

impl InvoicingService {
    /// Credits the invoice's INR closure to its agent unless another final
    /// invoice for the same agent and company already covers one of its
    /// standards.
    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    pub(crate) async fn maybe_accrue_target(
        &self,
        invoice: &Invoice,
    ) -> Result<AccrualOutcome, InvoicingError> {
        let outcome = self.decide_accrual(invoice).await?;
        metrics::record_accrual(outcome.as_str());
        tracing::info!(outcome = outcome.as_str(), "Target accrual decided");
        Ok(outcome)
    }

    async fn decide_accrual(&self, invoice: &Invoice) -> Result<AccrualOutcome, InvoicingError> {
        let Some(agent_id) = invoice.agent_id.as_deref() else {
            return Ok(AccrualOutcome::NoAgent);
        };
        if !invoice.is_final() {
            return Ok(AccrualOutcome::NothingToCredit);
        }

        let amount = invoice.inr_closure();
        if amount <= Decimal::ZERO {
            return Ok(AccrualOutcome::NothingToCredit);
        }

        if !invoice.standards.is_empty() {
            let filter = InvoiceFilter {
                kind: Some(InvoiceKind::Final),
                agent_id: Some(agent_id.to_string()),
                company_id: invoice.company_id.clone(),
                standards_any: Some(invoice.standards.clone()),
                exclude_id: Some(invoice.id.clone()),
                ..Default::default()
            };
            let store = self.store();
            let filter = &filter;
            let overlapping = self
                .call("count_invoices", move || store.count_invoices(filter))
                .await?;
            if overlapping > 0 {
                return Ok(AccrualOutcome::Duplicate);
            }
        }

        // Keyed by invoice id, so a retried credit is not counted twice.
        let store = self.store();
        let now = self.clock.now();
        let invoice_id = invoice.id.as_str();
        let credited = self
            .call("credit_target", move || {
                store.credit_target(agent_id, invoice_id, amount, now)
            })
            .await?;

        Ok(if credited {
            AccrualOutcome::Credited(amount)
        } else {
            AccrualOutcome::AgentMissing
        })
    }

    /// Replaces an agent's target, recording the previous target and
    /// achievement in its history.
    #[instrument(skip(self))]
    pub async fn update_target(
        &self,
        agent_id: &str,
        target: Decimal,
    ) -> Result<Agent, InvoicingError> {
        if target < Decimal::ZERO || target > MAX_AMOUNT {
            return Err(InvoicingError::validation(
                "target must be a non-negative number within range",
            ));
        }

        let store = self.store();
        let now = self.clock.now();
        let change_id = uuid::Uuid::new_v4().to_string();
        let change_id = change_id.as_str();
        let agent = self
            .call("set_agent_target", move || {
                store.set_agent_target(agent_id, target, change_id, now)
            })
            .await?
            .ok_or_else(|| InvoicingError::not_found("Agent", agent_id))?;

        tracing::info!(
            agent_id = %agent_id,
            target = %target,
            history_len = agent.target_history.len(),
            "Agent target updated"
        );
        Ok(agent)
    }

    /// Waits for the accrual lease of `(agent_id, company_id)`, polling with
    /// backoff until the configured wait budget is spent.
    pub(crate) async fn acquire_lease(
        &self,
        agent_id: &str,
        company_id: &str,
    ) -> Result<Lease, InvoicingError> {
        let lease = Lease {
            key: format!("accrual:{}:{}", agent_id, company_id),
            holder: uuid::Uuid::new_v4().to_string(),
        };
        let deadline = tokio::time::Instant::now() + self.lease.wait;
        let ttl = chrono::Duration::from_std(self.lease.ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let mut pause = LEASE_POLL_START;

        loop {
            let now = self.clock.now();
            let store = self.store();
            let (key, holder) = (lease.key.as_str(), lease.holder.as_str());
            let acquired = self
                .call("try_acquire_lease", move || {
                    store.try_acquire_lease(key, holder, now, now + ttl)
                })
                .await?;
            if acquired {
                tracing::debug!(key = %lease.key, "Lease acquired");
                return Ok(lease);
            }

            if tokio::time::Instant::now() + pause > deadline {
                tracing::warn!(key = %lease.key, "Gave up waiting for lease");
                return Err(InvoicingError::Busy(format!(
                    "Another invoice for agent {} and company {} is being recorded; retry shortly",
                    agent_id, company_id
                )));
            }
            tokio::time::sleep(pause).await;
            pause = (pause * 2).min(LEASE_POLL_MAX);
        }
    }

    /// Releases a lease. Failures are logged; the lease expires on its own.
    pub(crate) async fn release_lease(&self, lease: Lease) {
        let store = self.store();
        let (key, holder) = (lease.key.as_str(), lease.holder.as_str());
        if let Err(e) = self
            .call("release_lease", move || store.release_lease(key, holder))
            .await
        {
            tracing::warn!(key = %lease.key, error = %e, "Failed to release lease");
        }
    }
}
