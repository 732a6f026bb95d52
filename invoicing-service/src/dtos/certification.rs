use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Attachment, Certification, Contact};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCertificationRequest {
    #[validate(length(min = 1, max = 300, message = "Company name is required"))]
    pub company_name: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub certification_number: Option<String>,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub scope_of_work: Option<String>,
    /// Defaults to Active.
    #[serde(default)]
    #[validate(length(min = 1, message = "Status cannot be empty"))]
    pub status: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub alternate_emails: Vec<String>,
    #[serde(default)]
    pub phone_code: Option<String>,
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
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCertificationRequest {
    #[validate(length(min = 1, max = 300, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    pub client_name: Option<String>,
    pub certification_number: Option<String>,
    pub standard: Option<String>,
    pub scope_of_work: Option<String>,
    #[validate(length(min = 1, message = "Status cannot be empty"))]
    pub status: Option<String>,
    pub agent_id: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub alternate_emails: Option<Vec<String>>,
    pub phone_code: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub attachments: Option<Vec<Attachment>>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificationListQuery {
    pub agent_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificationResponse {
    pub id: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certification_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_of_work: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub contact: Contact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Certification> for CertificationResponse {
    fn from(certification: Certification) -> Self {
        Self {
            id: certification.id,
            company_name: certification.company_name,
            client_name: certification.client_name,
            certification_number: certification.certification_number,
            standard: certification.standard,
            scope_of_work: certification.scope_of_work,
            status: certification.status,
            agent_id: certification.agent_id,
            contact: certification.contact,
            phone_code: certification.phone_code,
            registered_at: certification.registered_at,
            expires_at: certification.expires_at,
            attachments: certification.attachments,
            logo: certification.logo,
            created_at: certification.created_at,
            updated_at: certification.updated_at,
        }
    }
}
