//! Request and response shapes of the HTTP API.
//!
//! Models store their timestamps as BSON dates, so responses go through
//! these types to serialise plain RFC 3339 strings.

pub mod certification;
pub mod directory;
pub mod invoice;
pub mod report;

use serde::{Deserialize, Serialize};

use crate::services::{ConsistencyWarning, Outcome};

/// Plain `limit`/`offset` pagination.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    50
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Body of every write: the written record plus any consistency warnings.
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse<T> {
    pub data: T,
    pub warnings: Vec<ConsistencyWarning>,
}

impl<T, U: From<T>> From<Outcome<T>> for WriteResponse<U> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            data: U::from(outcome.data),
            warnings: outcome.warnings,
        }
    }
}
