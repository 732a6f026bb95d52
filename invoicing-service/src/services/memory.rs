//! In-process `InvoiceStore` used by tests and `STORE_BACKEND=memory` runs.
//!
//! All tables sit behind one async mutex, so each trait call is atomic just
//! like the single-document writes of the MongoDB backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::error::StoreError;
use super::store::{
    AgentFilter, AgentPatch, CompanyPatch, InvoiceFilter, InvoiceStore, ManagerPatch, Page,
    StandardPatch,
};
use super::term_ledger;
use crate::models::{
    round_money, Agent, Certification, Company, Invoice, InvoiceKind, Manager, ProformaStatus,
    Standard, TargetChange, TermStatus,
};

#[derive(Default)]
struct Tables {
    invoices: HashMap<String, Invoice>,
    agents: HashMap<String, Agent>,
    companies: HashMap<String, Company>,
    certifications: HashMap<String, Certification>,
    managers: HashMap<String, Manager>,
    standards: HashMap<String, Standard>,
    leases: HashMap<String, (String, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        Some(page) => items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect(),
        None => items,
    }
}

fn link(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

fn unlink(ids: &mut Vec<String>, id: &str) {
    ids.retain(|existing| existing != id);
}

fn duplicate(what: &str, value: &str) -> StoreError {
    StoreError::Duplicate(format!("{} '{}' already exists", what, value))
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .invoices
            .values()
            .any(|i| i.kind == invoice.kind && i.invoice_no == invoice.invoice_no);
        if taken || tables.invoices.contains_key(&invoice.id) {
            return Err(duplicate("invoice number", &invoice.invoice_no));
        }
        tables.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self.tables.lock().await.invoices.get(id).cloned())
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let taken = tables.invoices.values().any(|i| {
            i.id != invoice.id && i.kind == invoice.kind && i.invoice_no == invoice.invoice_no
        });
        if taken {
            return Err(duplicate("invoice number", &invoice.invoice_no));
        }
        match tables.invoices.get_mut(&invoice.id) {
            Some(slot) => {
                *slot = invoice.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_invoice(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.invoices.remove(id).is_some())
    }

    async fn find_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Option<Page>,
    ) -> Result<Vec<Invoice>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn count_invoices(&self, filter: &InvoiceFilter) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.invoices.values().filter(|i| filter.matches(i)).count() as u64)
    }

    async fn set_term_status(
        &self,
        invoice_id: &str,
        term_id: &str,
        status: TermStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(invoice) = tables.invoices.get_mut(invoice_id) else {
            return Ok(None);
        };
        let Some(term) = invoice.terms.iter_mut().find(|t| t.term_id == term_id) else {
            return Ok(None);
        };
        term.status = status;
        term_ledger::refresh_payment_state(invoice);
        invoice.updated_at = now;
        Ok(Some(invoice.clone()))
    }

    async fn set_proforma_status(
        &self,
        invoice_id: &str,
        status: ProformaStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .invoices
            .get_mut(invoice_id)
            .filter(|i| i.kind == InvoiceKind::Proforma)
            .map(|invoice| {
                invoice.proforma_status = Some(status);
                invoice.updated_at = now;
                invoice.clone()
            }))
    }

    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .agents
            .values()
            .any(|a| a.agent_email == agent.agent_email)
        {
            return Err(duplicate("agent email", &agent.agent_email));
        }
        tables.agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.tables.lock().await.agents.get(id).cloned())
    }

    async fn find_agents(
        &self,
        filter: &AgentFilter,
        page: Option<Page>,
    ) -> Result<Vec<Agent>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Agent> = tables
            .agents
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.agent_name.cmp(&b.agent_name).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn update_agent(
        &self,
        id: &str,
        patch: &AgentPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Agent>, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(email) = &patch.agent_email {
            if tables
                .agents
                .values()
                .any(|a| a.id != id && &a.agent_email == email)
            {
                return Err(duplicate("agent email", email));
            }
        }
        Ok(tables.agents.get_mut(id).map(|agent| {
            if let Some(v) = &patch.agent_name {
                agent.agent_name = v.clone();
            }
            if let Some(v) = &patch.agent_email {
                agent.agent_email = v.clone();
            }
            if let Some(v) = &patch.agent_number {
                agent.agent_number = Some(v.clone());
            }
            if let Some(v) = &patch.manager_id {
                agent.manager_id = Some(v.clone());
            }
            agent.updated_at = now;
            agent.clone()
        }))
    }

    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.agents.remove(id).is_some())
    }

    async fn link_agent_invoice(
        &self,
        agent_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .agents
            .get_mut(agent_id)
            .map(|agent| {
                link(&mut agent.invoice_ids, invoice_id);
                agent.invoice_count = agent.invoice_ids.len() as i64;
                agent.updated_at = now;
            })
            .is_some())
    }

    async fn unlink_agent_invoice(
        &self,
        agent_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .agents
            .get_mut(agent_id)
            .map(|agent| {
                unlink(&mut agent.invoice_ids, invoice_id);
                agent.invoice_count = agent.invoice_ids.len() as i64;
                agent.updated_at = now;
            })
            .is_some())
    }

    async fn credit_target(
        &self,
        agent_id: &str,
        invoice_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .agents
            .get_mut(agent_id)
            .map(|agent| {
                if !agent.credited_invoice_ids.iter().any(|id| id == invoice_id) {
                    agent.credited_invoice_ids.push(invoice_id.to_string());
                    agent.target_achieved = round_money(agent.target_achieved + amount);
                    agent.updated_at = now;
                }
            })
            .is_some())
    }

    async fn set_agent_target(
        &self,
        agent_id: &str,
        target: Decimal,
        change_id: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<Option<Agent>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.agents.get_mut(agent_id).map(|agent| {
            if !agent.target_history.iter().any(|c| c.change_id == change_id) {
                agent.target_history.push(TargetChange {
                    change_id: change_id.to_string(),
                    previous_target: agent.target,
                    previous_achieved: agent.target_achieved,
                    changed_at,
                });
                agent.target = target;
                agent.updated_at = changed_at;
            }
            agent.clone()
        }))
    }

    async fn link_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .agents
            .get_mut(agent_id)
            .map(|agent| {
                link(&mut agent.certification_ids, certification_id);
                agent.certification_count = agent.certification_ids.len() as i64;
                agent.updated_at = now;
            })
            .is_some())
    }

    async fn unlink_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .agents
            .get_mut(agent_id)
            .map(|agent| {
                unlink(&mut agent.certification_ids, certification_id);
                agent.certification_count = agent.certification_ids.len() as i64;
                agent.updated_at = now;
            })
            .is_some())
    }

    async fn insert_company(&self, company: &Company) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.companies.contains_key(&company.id) {
            return Err(duplicate("company id", &company.id));
        }
        tables.companies.insert(company.id.clone(), company.clone());
        Ok(())
    }

    async fn get_company(&self, id: &str) -> Result<Option<Company>, StoreError> {
        Ok(self.tables.lock().await.companies.get(id).cloned())
    }

    async fn find_companies(&self, page: Option<Page>) -> Result<Vec<Company>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Company> = tables.companies.values().cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn count_companies(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().await.companies.len() as u64)
    }

    async fn update_company(
        &self,
        id: &str,
        patch: &CompanyPatch,
    ) -> Result<Option<Company>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.companies.get_mut(id).map(|company| {
            if let Some(v) = &patch.company_name {
                company.company_name = v.clone();
            }
            if let Some(v) = &patch.status {
                company.status = v.clone();
            }
            company.clone()
        }))
    }

    async fn delete_company(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.companies.remove(id).is_some())
    }

    async fn link_company_invoice(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .companies
            .get_mut(company_id)
            .map(|company| {
                link(company.ids_mut(kind), invoice_id);
                company.sync_counts();
            })
            .is_some())
    }

    async fn unlink_company_invoice(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .companies
            .get_mut(company_id)
            .map(|company| {
                unlink(company.ids_mut(kind), invoice_id);
                company.sync_counts();
            })
            .is_some())
    }

    async fn insert_certification(
        &self,
        certification: &Certification,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.certifications.contains_key(&certification.id) {
            return Err(duplicate("certification id", &certification.id));
        }
        tables
            .certifications
            .insert(certification.id.clone(), certification.clone());
        Ok(())
    }

    async fn get_certification(&self, id: &str) -> Result<Option<Certification>, StoreError> {
        Ok(self.tables.lock().await.certifications.get(id).cloned())
    }

    async fn find_certifications(
        &self,
        agent_id: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<Certification>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Certification> = tables
            .certifications
            .values()
            .filter(|c| agent_id.is_none() || c.agent_id.as_deref() == agent_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn count_certifications(&self, agent_id: Option<&str>) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .certifications
            .values()
            .filter(|c| agent_id.is_none() || c.agent_id.as_deref() == agent_id)
            .count() as u64)
    }

    async fn replace_certification(
        &self,
        certification: &Certification,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.certifications.get_mut(&certification.id) {
            Some(slot) => {
                *slot = certification.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_certification(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.certifications.remove(id).is_some())
    }

    async fn insert_manager(&self, manager: &Manager) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.managers.values().any(|m| m.email == manager.email) {
            return Err(duplicate("manager email", &manager.email));
        }
        tables.managers.insert(manager.id.clone(), manager.clone());
        Ok(())
    }

    async fn get_manager(&self, id: &str) -> Result<Option<Manager>, StoreError> {
        Ok(self.tables.lock().await.managers.get(id).cloned())
    }

    async fn find_managers(&self, page: Option<Page>) -> Result<Vec<Manager>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Manager> = tables.managers.values().cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(found, page))
    }

    async fn update_manager(
        &self,
        id: &str,
        patch: &ManagerPatch,
    ) -> Result<Option<Manager>, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(email) = &patch.email {
            if tables
                .managers
                .values()
                .any(|m| m.id != id && &m.email == email)
            {
                return Err(duplicate("manager email", email));
            }
        }
        Ok(tables.managers.get_mut(id).map(|manager| {
            if let Some(v) = &patch.name {
                manager.name = v.clone();
            }
            if let Some(v) = &patch.email {
                manager.email = v.clone();
            }
            if let Some(v) = &patch.mobile {
                manager.mobile = Some(v.clone());
            }
            manager.clone()
        }))
    }

    async fn delete_manager(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.managers.remove(id).is_some())
    }

    async fn insert_standard(&self, standard: &Standard) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .standards
            .values()
            .any(|s| s.standard_name == standard.standard_name)
        {
            return Err(duplicate("standard", &standard.standard_name));
        }
        tables.standards.insert(standard.id.clone(), standard.clone());
        Ok(())
    }

    async fn get_standard(&self, id: &str) -> Result<Option<Standard>, StoreError> {
        Ok(self.tables.lock().await.standards.get(id).cloned())
    }

    async fn find_standards(&self, page: Option<Page>) -> Result<Vec<Standard>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Standard> = tables.standards.values().cloned().collect();
        found.sort_by(|a, b| a.standard_name.cmp(&b.standard_name));
        Ok(paginate(found, page))
    }

    async fn update_standard(
        &self,
        id: &str,
        patch: &StandardPatch,
    ) -> Result<Option<Standard>, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(name) = &patch.standard_name {
            if tables
                .standards
                .values()
                .any(|s| s.id != id && &s.standard_name == name)
            {
                return Err(duplicate("standard", name));
            }
        }
        Ok(tables.standards.get_mut(id).map(|standard| {
            if let Some(v) = &patch.standard_name {
                standard.standard_name = v.clone();
            }
            if let Some(v) = &patch.description {
                standard.description = v.clone();
            }
            standard.clone()
        }))
    }

    async fn delete_standard(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.standards.remove(id).is_some())
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.leases.get(key) {
            Some((current, until)) if current != holder && *until > now => Ok(false),
            _ => {
                tables
                    .leases
                    .insert(key.to_string(), (holder.to_string(), expires_at));
                Ok(true)
            }
        }
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .leases
            .get(key)
            .is_some_and(|(current, _)| current == holder)
        {
            tables.leases.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_unlink_never_goes_negative() {
        let store = InMemoryStore::new();
        let mut agent = Agent::new("Ravi".into(), "ravi@agency.test".into(), None, None, Decimal::ZERO, now());
        // counters already out of step with the list
        agent.invoice_count = 0;
        store.insert_agent(&agent).await.unwrap();

        assert!(store.unlink_agent_invoice(&agent.id, "ghost", now()).await.unwrap());
        let stored = store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(stored.invoice_count, 0);
        assert!(stored.invoice_ids.is_empty());
    }

    #[tokio::test]
    async fn test_link_is_idempotent() {
        let store = InMemoryStore::new();
        let agent = Agent::new("Ravi".into(), "ravi@agency.test".into(), None, None, Decimal::ZERO, now());
        store.insert_agent(&agent).await.unwrap();

        store.link_agent_invoice(&agent.id, "inv-1", now()).await.unwrap();
        store.link_agent_invoice(&agent.id, "inv-1", now()).await.unwrap();

        let stored = store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(stored.invoice_count, 1);
        assert_eq!(stored.invoice_ids, vec!["inv-1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_agent_reports_false() {
        let store = InMemoryStore::new();
        assert!(!store.link_agent_invoice("nobody", "inv-1", now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_agent_email_rejected() {
        let store = InMemoryStore::new();
        let a = Agent::new("A".into(), "same@agency.test".into(), None, None, Decimal::ZERO, now());
        let b = Agent::new("B".into(), "same@agency.test".into(), None, None, Decimal::ZERO, now());
        store.insert_agent(&a).await.unwrap();
        assert!(matches!(
            store.insert_agent(&b).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_credit_is_applied_once_per_invoice() {
        let store = InMemoryStore::new();
        let agent = Agent::new("Ravi".into(), "ravi@agency.test".into(), None, None, Decimal::ZERO, now());
        store.insert_agent(&agent).await.unwrap();

        let amount = Decimal::new(100010, 2);
        assert!(store.credit_target(&agent.id, "inv-1", amount, now()).await.unwrap());
        assert!(store.credit_target(&agent.id, "inv-1", amount, now()).await.unwrap());
        assert!(!store.credit_target("nobody", "inv-1", amount, now()).await.unwrap());

        let stored = store.get_agent(&agent.id).await.unwrap().unwrap();
        assert_eq!(stored.target_achieved, amount);
        assert_eq!(stored.credited_invoice_ids, vec!["inv-1".to_string()]);
    }

    #[tokio::test]
    async fn test_replayed_target_change_appends_once() {
        let store = InMemoryStore::new();
        let agent = Agent::new("Ravi".into(), "ravi@agency.test".into(), None, None, Decimal::ONE, now());
        store.insert_agent(&agent).await.unwrap();

        let target = Decimal::ONE_THOUSAND;
        store.set_agent_target(&agent.id, target, "c-1", now()).await.unwrap();
        let replay = store
            .set_agent_target(&agent.id, target, "c-1", now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(replay.target, target);
        assert_eq!(replay.target_history.len(), 1);
        assert_eq!(replay.target_history[0].previous_target, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_lease_is_reentrant_for_its_holder() {
        let store = InMemoryStore::new();
        let ttl = Duration::seconds(30);

        assert!(store.try_acquire_lease("k", "h1", now(), now() + ttl).await.unwrap());
        assert!(store.try_acquire_lease("k", "h1", now(), now() + ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_lease_excludes_until_expiry() {
        let store = InMemoryStore::new();
        let ttl = Duration::seconds(30);

        assert!(store.try_acquire_lease("k", "h1", now(), now() + ttl).await.unwrap());
        assert!(!store.try_acquire_lease("k", "h2", now(), now() + ttl).await.unwrap());

        let later = now() + Duration::seconds(31);
        assert!(store.try_acquire_lease("k", "h2", later, later + ttl).await.unwrap());

        // a stale holder cannot release someone else's lease
        store.release_lease("k", "h1").await.unwrap();
        assert!(!store.try_acquire_lease("k", "h3", later, later + ttl).await.unwrap());
    }
}
