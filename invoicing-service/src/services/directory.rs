//! Agents, managers, companies and standards.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use super::error::InvoicingError;
use super::invoicing::InvoicingService;
use super::store::{AgentFilter, AgentPatch, CompanyPatch, ManagerPatch, Page, StandardPatch};
use crate::dtos::directory::{
    CreateAgentRequest, CreateCompanyRequest, CreateManagerRequest, CreateStandardRequest,
    UpdateAgentRequest, UpdateCompanyRequest, UpdateManagerRequest, UpdateStandardRequest,
};
use crate::models::{Agent, Company, Manager, Standard, MAX_AMOUNT};

/// A manager with figures rolled up from its agents.
#[derive(Debug, Clone)]
pub struct ManagerSummary {
    pub manager: Manager,
    pub agent_count: usize,
    pub total_target: Decimal,
    pub total_achieved: Decimal,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim().to_string())
}

impl InvoicingService {
    // Agents

    #[instrument(skip(self, input), fields(agent_email = %input.agent_email))]
    pub async fn create_agent(&self, input: &CreateAgentRequest) -> Result<Agent, InvoicingError> {
        let target = input.target.unwrap_or(Decimal::ZERO);
        if target < Decimal::ZERO || target > MAX_AMOUNT {
            return Err(InvoicingError::validation(
                "target must be a non-negative number within range",
            ));
        }
        if let Some(manager_id) = input.manager_id.as_deref() {
            self.get_manager(manager_id).await?;
        }

        let agent = Agent::new(
            input.agent_name.trim().to_string(),
            input.agent_email.trim().to_lowercase(),
            trimmed(&input.agent_number),
            input.manager_id.clone(),
            target,
            self.clock.now(),
        );
        let store = self.store();
        let inserted = &agent;
        self.insert_once(
            "insert_agent",
            move || store.insert_agent(inserted),
            move || store.get_agent(&inserted.id),
        )
        .await
            .map_err(|e| match InvoicingError::from(e) {
                InvoicingError::Conflict(_) => InvoicingError::Conflict(format!(
                    "An agent with email {} already exists",
                    agent.agent_email
                )),
                other => other,
            })?;

        info!(agent_id = %agent.id, "Agent created");
        Ok(agent)
    }

    pub async fn get_agent(&self, id: &str) -> Result<Agent, InvoicingError> {
        let store = self.store();
        self.call("get_agent", move || store.get_agent(id))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Agent", id))
    }

    pub async fn list_agents(
        &self,
        manager_id: Option<String>,
        page: Page,
    ) -> Result<Vec<Agent>, InvoicingError> {
        let filter = AgentFilter {
            manager_id,
            ..Default::default()
        };
        let store = self.store();
        let filter = &filter;
        Ok(self
            .call("find_agents", move || store.find_agents(filter, Some(page)))
            .await?)
    }

    /// Updates profile fields. Target changes go through `update_target`.
    #[instrument(skip(self, input))]
    pub async fn update_agent(
        &self,
        id: &str,
        input: &UpdateAgentRequest,
    ) -> Result<Agent, InvoicingError> {
        if let Some(manager_id) = input.manager_id.as_deref() {
            self.get_manager(manager_id).await?;
        }
        let patch = AgentPatch {
            agent_name: trimmed(&input.agent_name),
            agent_email: input.agent_email.as_ref().map(|e| e.trim().to_lowercase()),
            agent_number: trimmed(&input.agent_number),
            manager_id: input.manager_id.clone(),
        };
        let store = self.store();
        let now = self.clock.now();
        let patch = &patch;
        let agent = self
            .call("update_agent", move || store.update_agent(id, patch, now))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Agent", id))?;
        info!(agent_id = %id, "Agent updated");
        Ok(agent)
    }

    /// Invoices keep their agent id; later edits to them warn about the
    /// missing agent.
    #[instrument(skip(self))]
    pub async fn delete_agent(&self, id: &str) -> Result<(), InvoicingError> {
        let store = self.store();
        if !self
            .call("delete_agent", move || store.delete_agent(id))
            .await?
        {
            return Err(InvoicingError::not_found("Agent", id));
        }
        info!(agent_id = %id, "Agent deleted");
        Ok(())
    }

    // Managers

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_manager(
        &self,
        input: &CreateManagerRequest,
    ) -> Result<Manager, InvoicingError> {
        let manager = Manager {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            mobile: trimmed(&input.mobile),
            created_at: self.clock.now(),
        };
        let store = self.store();
        let inserted = &manager;
        self.insert_once(
            "insert_manager",
            move || store.insert_manager(inserted),
            move || store.get_manager(&inserted.id),
        )
        .await?;
        info!(manager_id = %manager.id, "Manager created");
        Ok(manager)
    }

    pub async fn get_manager(&self, id: &str) -> Result<Manager, InvoicingError> {
        let store = self.store();
        self.call("get_manager", move || store.get_manager(id))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Manager", id))
    }

    pub async fn list_managers(&self, page: Option<Page>) -> Result<Vec<Manager>, InvoicingError> {
        let store = self.store();
        Ok(self
            .call("find_managers", move || store.find_managers(page))
            .await?)
    }

    /// Managers with their agent count and the sums of their agents'
    /// targets and achievements.
    pub async fn list_managers_with_totals(
        &self,
        page: Page,
    ) -> Result<Vec<ManagerSummary>, InvoicingError> {
        let managers = self.list_managers(Some(page)).await?;
        let mut summaries = Vec::with_capacity(managers.len());
        for manager in managers {
            let filter = AgentFilter {
                manager_id: Some(manager.id.clone()),
                ..Default::default()
            };
            let store = self.store();
            let filter = &filter;
            let agents = self
                .call("find_agents", move || store.find_agents(filter, None))
                .await?;
            summaries.push(ManagerSummary {
                agent_count: agents.len(),
                total_target: agents.iter().map(|a| a.target).sum(),
                total_achieved: agents.iter().map(|a| a.target_achieved).sum(),
                manager,
            });
        }
        Ok(summaries)
    }

    #[instrument(skip(self, input))]
    pub async fn update_manager(
        &self,
        id: &str,
        input: &UpdateManagerRequest,
    ) -> Result<Manager, InvoicingError> {
        let patch = ManagerPatch {
            name: trimmed(&input.name),
            email: input.email.as_ref().map(|e| e.trim().to_lowercase()),
            mobile: trimmed(&input.mobile),
        };
        let store = self.store();
        let patch = &patch;
        Ok(self
            .call("update_manager", move || store.update_manager(id, patch))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Manager", id))?)
    }

    #[instrument(skip(self))]
    pub async fn delete_manager(&self, id: &str) -> Result<(), InvoicingError> {
        let store = self.store();
        if !self
            .call("delete_manager", move || store.delete_manager(id))
            .await?
        {
            return Err(InvoicingError::not_found("Manager", id));
        }
        info!(manager_id = %id, "Manager deleted");
        Ok(())
    }

    // Companies

    #[instrument(skip(self, input))]
    pub async fn create_company(
        &self,
        input: &CreateCompanyRequest,
    ) -> Result<Company, InvoicingError> {
        let mut company = Company::new(
            uuid::Uuid::new_v4().to_string(),
            input.company_name.trim().to_string(),
            self.clock.now(),
        );
        if let Some(status) = trimmed(&input.status) {
            company.status = status;
        }
        let store = self.store();
        let inserted = &company;
        self.insert_once(
            "insert_company",
            move || store.insert_company(inserted),
            move || store.get_company(&inserted.id),
        )
        .await?;
        info!(company_id = %company.id, "Company created");
        Ok(company)
    }

    pub async fn get_company(&self, id: &str) -> Result<Company, InvoicingError> {
        let store = self.store();
        self.call("get_company", move || store.get_company(id))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Company", id))
    }

    pub async fn list_companies(&self, page: Page) -> Result<(Vec<Company>, u64), InvoicingError> {
        let store = self.store();
        let total = self
            .call("count_companies", move || store.count_companies())
            .await?;
        let items = self
            .call("find_companies", move || store.find_companies(Some(page)))
            .await?;
        Ok((items, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update_company(
        &self,
        id: &str,
        input: &UpdateCompanyRequest,
    ) -> Result<Company, InvoicingError> {
        let patch = CompanyPatch {
            company_name: trimmed(&input.company_name),
            status: trimmed(&input.status),
        };
        let store = self.store();
        let patch = &patch;
        Ok(self
            .call("update_company", move || store.update_company(id, patch))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Company", id))?)
    }

    #[instrument(skip(self))]
    pub async fn delete_company(&self, id: &str) -> Result<(), InvoicingError> {
        let store = self.store();
        if !self
            .call("delete_company", move || store.delete_company(id))
            .await?
        {
            return Err(InvoicingError::not_found("Company", id));
        }
        info!(company_id = %id, "Company deleted");
        Ok(())
    }

    // Standards

    #[instrument(skip(self, input), fields(standard_name = %input.standard_name))]
    pub async fn create_standard(
        &self,
        input: &CreateStandardRequest,
    ) -> Result<Standard, InvoicingError> {
        let standard = Standard {
            id: uuid::Uuid::new_v4().to_string(),
            standard_name: input.standard_name.trim().to_string(),
            description: input.description.clone().unwrap_or_default(),
        };
        let store = self.store();
        let inserted = &standard;
        self.insert_once(
            "insert_standard",
            move || store.insert_standard(inserted),
            move || store.get_standard(&inserted.id),
        )
        .await
            .map_err(|e| match InvoicingError::from(e) {
                InvoicingError::Conflict(_) => InvoicingError::Conflict(format!(
                    "Standard {} already exists",
                    standard.standard_name
                )),
                other => other,
            })?;
        Ok(standard)
    }

    pub async fn get_standard(&self, id: &str) -> Result<Standard, InvoicingError> {
        let store = self.store();
        self.call("get_standard", move || store.get_standard(id))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Standard", id))
    }

    pub async fn list_standards(&self, page: Page) -> Result<Vec<Standard>, InvoicingError> {
        let store = self.store();
        Ok(self
            .call("find_standards", move || store.find_standards(Some(page)))
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update_standard(
        &self,
        id: &str,
        input: &UpdateStandardRequest,
    ) -> Result<Standard, InvoicingError> {
        let patch = StandardPatch {
            standard_name: trimmed(&input.standard_name),
            description: input.description.clone(),
        };
        let store = self.store();
        let patch = &patch;
        Ok(self
            .call("update_standard", move || store.update_standard(id, patch))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Standard", id))?)
    }

    #[instrument(skip(self))]
    pub async fn delete_standard(&self, id: &str) -> Result<(), InvoicingError> {
        let store = self.store();
        if !self
            .call("delete_standard", move || store.delete_standard(id))
            .await?
        {
            return Err(InvoicingError::not_found("Standard", id));
        }
        Ok(())
    }
}
