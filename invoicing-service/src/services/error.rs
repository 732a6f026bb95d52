use mongodb::error::{ErrorKind, WriteFailure, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR};
use serde::Serialize;
use service_core::error::AppError;
use service_core::retry::Retryable;
use std::time::Duration;
use thiserror::Error;

use crate::models::CurrencyError;

/// Failures raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Transient store failure: {0}")]
    Transient(anyhow::Error),

    #[error("Store failure: {0}")]
    Backend(anyhow::Error),
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::Transient(_))
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        StoreError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }
}

const DUPLICATE_KEY_CODE: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE => {
                return StoreError::Duplicate(we.message.clone());
            }
            // findAndModify reports duplicates as a command error
            ErrorKind::Command(ce) if ce.code == DUPLICATE_KEY_CODE => {
                return StoreError::Duplicate(ce.message.clone());
            }
            _ => {}
        }

        let transient = err.contains_label(RETRYABLE_WRITE_ERROR)
            || err.contains_label(TRANSIENT_TRANSACTION_ERROR)
            || matches!(
                err.kind.as_ref(),
                ErrorKind::Io(_)
                    | ErrorKind::ServerSelection { .. }
                    | ErrorKind::ConnectionPoolCleared { .. }
            );

        if transient {
            StoreError::Transient(anyhow::anyhow!(err.to_string()))
        } else {
            StoreError::Backend(anyhow::anyhow!(err.to_string()))
        }
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Backend(anyhow::anyhow!(err.to_string()))
    }
}

/// Domain errors surfaced to callers.
#[derive(Error, Debug)]
pub enum InvoicingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Busy(String),

    #[error(transparent)]
    Store(StoreError),
}

impl InvoicingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        InvoicingError::Validation(msg.into())
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        InvoicingError::NotFound(format!("{} {} not found", entity, id))
    }
}

impl From<StoreError> for InvoicingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => InvoicingError::Conflict(msg),
            other => InvoicingError::Store(other),
        }
    }
}

impl From<CurrencyError> for InvoicingError {
    fn from(err: CurrencyError) -> Self {
        InvoicingError::Validation(err.to_string())
    }
}

impl From<InvoicingError> for AppError {
    fn from(err: InvoicingError) -> Self {
        match err {
            InvoicingError::Validation(msg) => AppError::InvalidInput(anyhow::anyhow!(msg)),
            InvoicingError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            InvoicingError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            InvoicingError::Busy(msg) => AppError::ServiceUnavailable(msg),
            InvoicingError::Store(e @ (StoreError::Timeout { .. } | StoreError::Transient(_))) => {
                AppError::ServiceUnavailable(e.to_string())
            }
            InvoicingError::Store(e) => AppError::DatabaseError(anyhow::anyhow!(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingAgent,
    MissingCompany,
    AssociationFailed,
    AccrualFailed,
    GstMismatch,
    TdsMismatch,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::MissingAgent => "missing_agent",
            WarningKind::MissingCompany => "missing_company",
            WarningKind::AssociationFailed => "association_failed",
            WarningKind::AccrualFailed => "accrual_failed",
            WarningKind::GstMismatch => "gst_mismatch",
            WarningKind::TdsMismatch => "tds_mismatch",
        }
    }
}

/// Non-fatal problem found while applying the secondary effects of a write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ConsistencyWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result of a write together with any consistency warnings it produced.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub data: T,
    pub warnings: Vec<ConsistencyWarning>,
}

impl<T> Outcome<T> {
    pub fn new(data: T, warnings: Vec<ConsistencyWarning>) -> Self {
        Self { data, warnings }
    }

    pub fn clean(data: T) -> Self {
        Self::new(data, Vec::new())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            data: f(self.data),
            warnings: self.warnings,
        }
    }
}
