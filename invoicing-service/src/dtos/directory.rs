use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Agent, Company, Manager, Standard, TargetChange};
use crate::services::ManagerSummary;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 200, message = "Agent name is required"))]
    pub agent_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub agent_email: String,
    #[serde(default)]
    pub agent_number: Option<String>,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub target: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAgentRequest {
    #[validate(length(min = 1, max = 200, message = "Agent name cannot be empty"))]
    pub agent_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub agent_email: Option<String>,
    pub agent_number: Option<String>,
    pub manager_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateManagerRequest {
    #[validate(length(min = 1, max = 200, message = "Manager name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateManagerRequest {
    #[validate(length(min = 1, max = 200, message = "Manager name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 300, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 300, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    #[validate(length(min = 1, message = "Status cannot be empty"))]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStandardRequest {
    #[validate(length(min = 1, max = 100, message = "Standard name is required"))]
    pub standard_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStandardRequest {
    #[validate(length(min = 1, max = 100, message = "Standard name cannot be empty"))]
    pub standard_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentListQuery {
    pub manager_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetChangeResponse {
    pub previous_target: Decimal,
    pub previous_achieved: Decimal,
    pub changed_at: DateTime<Utc>,
}

impl From<TargetChange> for TargetChangeResponse {
    fn from(change: TargetChange) -> Self {
        Self {
            previous_target: change.previous_target,
            previous_achieved: change.previous_achieved,
            changed_at: change.changed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub id: String,
    pub agent_name: String,
    pub agent_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    pub target: Decimal,
    pub target_achieved: Decimal,
    pub invoice_count: i64,
    pub invoice_ids: Vec<String>,
    pub certification_count: i64,
    pub certification_ids: Vec<String>,
    pub target_history: Vec<TargetChangeResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            agent_name: agent.agent_name,
            agent_email: agent.agent_email,
            agent_number: agent.agent_number,
            manager_id: agent.manager_id,
            target: agent.target,
            target_achieved: agent.target_achieved,
            invoice_count: agent.invoice_count,
            invoice_ids: agent.invoice_ids,
            certification_count: agent.certification_count,
            certification_ids: agent.certification_ids,
            target_history: agent
                .target_history
                .into_iter()
                .map(TargetChangeResponse::from)
                .collect(),
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Manager> for ManagerResponse {
    fn from(manager: Manager) -> Self {
        Self {
            id: manager.id,
            name: manager.name,
            email: manager.email,
            mobile: manager.mobile,
            created_at: manager.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerSummaryResponse {
    #[serde(flatten)]
    pub manager: ManagerResponse,
    pub agent_count: usize,
    pub total_target: Decimal,
    pub total_achieved: Decimal,
}

impl From<ManagerSummary> for ManagerSummaryResponse {
    fn from(summary: ManagerSummary) -> Self {
        Self {
            manager: summary.manager.into(),
            agent_count: summary.agent_count,
            total_target: summary.total_target,
            total_achieved: summary.total_achieved,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyResponse {
    pub id: String,
    pub company_name: String,
    pub status: String,
    pub invoice_count: i64,
    pub invoice_ids: Vec<String>,
    pub proforma_invoice_count: i64,
    pub proforma_invoice_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            company_name: company.company_name,
            status: company.status,
            invoice_count: company.invoice_count,
            invoice_ids: company.invoice_ids,
            proforma_invoice_count: company.proforma_invoice_count,
            proforma_invoice_ids: company.proforma_invoice_ids,
            created_at: company.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StandardResponse {
    pub id: String,
    pub standard_name: String,
    pub description: String,
}

impl From<Standard> for StandardResponse {
    fn from(standard: Standard) -> Self {
        Self {
            id: standard.id,
            standard_name: standard.standard_name,
            description: standard.description,
        }
    }
}
