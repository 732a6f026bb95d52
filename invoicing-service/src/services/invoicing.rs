//! The service object every handler talks to.
//!
//! Operations are split across `invoices`, `associations`, `accrual`,
//! `reports` and `directory`, each adding an `impl InvoicingService` block.

use service_core::retry::{retry_with_timeout, RetryConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::error::{ConsistencyWarning, StoreError};
use super::metrics;
use super::store::InvoiceStore;

/// Per-(agent, company) lease guarding invoice creation and accrual.
#[derive(Debug, Clone, Copy)]
pub struct LeaseSettings {
    /// Expiry stamped on the lease, for holders that crash.
    pub ttl: Duration,
    /// How long a create waits for a held lease before giving up.
    pub wait: Duration,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            wait: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct InvoicingService {
    pub(crate) store: Arc<dyn InvoiceStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) retry: RetryConfig,
    pub(crate) lease: LeaseSettings,
}

impl InvoicingService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
        retry: RetryConfig,
        lease: LeaseSettings,
    ) -> Self {
        Self {
            store,
            clock,
            retry,
            lease,
        }
    }

    pub fn store(&self) -> &dyn InvoiceStore {
        self.store.as_ref()
    }

    /// Run one store call under the retry/timeout policy.
    pub(crate) async fn call<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        retry_with_timeout(&self.retry, operation, f).await
    }

    /// Insert under the retry policy. An attempt that timed out may still
    /// have landed, so a `Duplicate` is checked against the document's own
    /// id: if `lookup` finds it, the insert succeeded.
    pub(crate) async fn insert_once<T, F, Fut, L, LFut>(
        &self,
        operation: &str,
        insert: F,
        lookup: L,
    ) -> Result<(), StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
        L: FnMut() -> LFut,
        LFut: Future<Output = Result<Option<T>, StoreError>>,
    {
        match self.call(operation, insert).await {
            Err(StoreError::Duplicate(msg)) => {
                if self.call(operation, lookup).await?.is_some() {
                    tracing::debug!(operation, "Insert landed on an earlier attempt");
                    Ok(())
                } else {
                    Err(StoreError::Duplicate(msg))
                }
            }
            other => other,
        }
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        let store = self.store();
        self.call("ping", move || store.ping()).await
    }
}

/// Log and count warnings produced by a write.
pub(crate) fn report_warnings(invoice_id: &str, warnings: &[ConsistencyWarning]) {
    for warning in warnings {
        tracing::warn!(
            invoice_id = %invoice_id,
            kind = warning.kind.as_str(),
            message = %warning.message,
            "Consistency warning"
        );
        metrics::record_warning(warning.kind.as_str());
    }
}
