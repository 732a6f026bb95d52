use serde::{Deserialize, Serialize};

/// Certification scheme an engagement is billed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standard {
    #[serde(rename = "_id")]
    pub id: String,
    pub standard_name: String,
    #[serde(default)]
    pub description: String,
}
