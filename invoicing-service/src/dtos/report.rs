use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::invoice::InvoiceResponse;
use crate::services::reports::{Dashboard, DashboardTotals};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct YearQuery {
    #[validate(range(min = 1900, max = 9999, message = "year must be between 1900 and 9999"))]
    pub year: i32,
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct YearMonthQuery {
    #[validate(range(min = 1900, max = 9999, message = "year must be between 1900 and 9999"))]
    pub year: i32,
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub month: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub totals: DashboardTotals,
    pub recent_invoices: Vec<InvoiceResponse>,
    pub recent_pending_invoices: Vec<InvoiceResponse>,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            totals: dashboard.totals,
            recent_invoices: dashboard
                .recent_invoices
                .into_iter()
                .map(InvoiceResponse::from)
                .collect(),
            recent_pending_invoices: dashboard
                .recent_pending_invoices
                .into_iter()
                .map(InvoiceResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StandardGroupResponse {
    pub standard: String,
    pub invoices: Vec<InvoiceResponse>,
}
