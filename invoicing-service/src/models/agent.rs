use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot taken right before an agent's target is overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetChange {
    /// Identifies the request that produced the entry, so a replayed write
    /// appends nothing.
    #[serde(default)]
    pub change_id: String,
    pub previous_target: Decimal,
    pub previous_achieved: Decimal,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(rename = "_id")]
    pub id: String,
    pub agent_name: String,
    pub agent_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<String>,
    pub target: Decimal,
    pub target_achieved: Decimal,
    /// Always equal to `invoice_ids.len()`.
    pub invoice_count: i64,
    #[serde(default)]
    pub invoice_ids: Vec<String>,
    /// Invoices whose closure is already part of `target_achieved`.
    #[serde(default)]
    pub credited_invoice_ids: Vec<String>,
    /// Always equal to `certification_ids.len()`.
    #[serde(default)]
    pub certification_count: i64,
    #[serde(default)]
    pub certification_ids: Vec<String>,
    #[serde(default)]
    pub target_history: Vec<TargetChange>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        agent_name: String,
        agent_email: String,
        agent_number: Option<String>,
        manager_id: Option<String>,
        target: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_name,
            agent_email,
            agent_number,
            manager_id,
            target,
            target_achieved: Decimal::ZERO,
            invoice_count: 0,
            invoice_ids: Vec::new(),
            credited_invoice_ids: Vec::new(),
            certification_count: 0,
            certification_ids: Vec::new(),
            target_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
