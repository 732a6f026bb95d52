#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use invoicing_service::config::{
    InvoicingConfig, LeaseConfig, MongoConfig, StoreBackend, StoreConfig,
};
use invoicing_service::dtos::directory::{CreateAgentRequest, CreateManagerRequest};
use invoicing_service::dtos::invoice::CreateInvoiceRequest;
use async_trait::async_trait;
use invoicing_service::models::{
    round_money, Agent, Certification, Company, Invoice, InvoiceKind, Manager, ProformaStatus,
    Standard, TermStatus,
};
use invoicing_service::services::store::{AgentFilter, AgentPatch, CompanyPatch, ManagerPatch, StandardPatch};
use invoicing_service::services::{
    FixedClock, InMemoryStore, InvoiceFilter, InvoiceStore, InvoicingService, LeaseSettings, Page,
    StoreError,
};
use invoicing_service::startup::{router, AppState};
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use service_core::retry::RetryConfig;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub struct TestApp {
    pub service: InvoicingService,
    pub clock: Arc<FixedClock>,
    pub router: Router,
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
}

fn test_config() -> InvoicingConfig {
    InvoicingConfig {
        common: CoreConfig {
            port: 0,
            ..CoreConfig::default()
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            timeout_ms: 2000,
            max_retries: 2,
        },
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "invoicing_test".to_string(),
        },
        lease: LeaseConfig {
            ttl_secs: 30,
            wait_ms: 2000,
        },
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(Arc::new(InMemoryStore::new()), RetryConfig::quick())
    }

    pub fn spawn_with(store: Arc<dyn InvoiceStore>, retry: RetryConfig) -> Self {
        let config = test_config();
        let clock = Arc::new(FixedClock::new(at(2024, 6, 15)));
        let service = InvoicingService::new(
            store,
            clock.clone(),
            retry,
            LeaseSettings {
                ttl: Duration::from_secs(config.lease.ttl_secs),
                wait: Duration::from_millis(config.lease.wait_ms),
            },
        );
        let router = router(AppState {
            config,
            service: service.clone(),
        });

        TestApp {
            service,
            clock,
            router,
        }
    }

    pub async fn agent(&self, name: &str, target: Decimal) -> Agent {
        self.agent_under(name, target, None).await
    }

    pub async fn agent_under(&self, name: &str, target: Decimal, manager_id: Option<&str>) -> Agent {
        let request = CreateAgentRequest {
            agent_name: name.to_string(),
            agent_email: format!("{}@agency.test", name.to_lowercase().replace(' ', ".")),
            agent_number: None,
            manager_id: manager_id.map(str::to_string),
            target: Some(target),
        };
        self.service
            .create_agent(&request)
            .await
            .expect("Failed to create agent")
    }

    pub async fn manager(&self, name: &str) -> Manager {
        let request = CreateManagerRequest {
            name: name.to_string(),
            email: format!("{}@agency.test", name.to_lowercase().replace(' ', ".")),
            mobile: None,
        };
        self.service
            .create_manager(&request)
            .await
            .expect("Failed to create manager")
    }

    pub async fn create(&self, request: Value) -> Invoice {
        let request: CreateInvoiceRequest =
            serde_json::from_value(request).expect("Invalid invoice request");
        self.service
            .create_invoice(&request)
            .await
            .expect("Failed to create invoice")
            .data
    }

    pub async fn reload_agent(&self, id: &str) -> Agent {
        self.service.get_agent(id).await.expect("Agent not found")
    }

    /// Number of stored final invoices that reference `agent_id`.
    pub async fn invoices_referencing(&self, agent_id: &str) -> u64 {
        let filter = InvoiceFilter {
            agent_id: Some(agent_id.to_string()),
            ..InvoiceFilter::of_kind(InvoiceKind::Final)
        };
        self.service
            .store()
            .count_invoices(&filter)
            .await
            .expect("Failed to count invoices")
    }

    /// Asserts the agent's counter, its id list and the invoices agree.
    pub async fn assert_agent_consistent(&self, agent_id: &str) {
        let agent = self.reload_agent(agent_id).await;
        let referencing = self.invoices_referencing(agent_id).await;
        assert_eq!(agent.invoice_count as usize, agent.invoice_ids.len());
        assert_eq!(agent.invoice_count as u64, referencing);
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}

/// A domestic invoice body with one 18% GST term covering `amount`.
pub fn inr_invoice(
    invoice_no: &str,
    agent_id: Option<&str>,
    company_id: Option<&str>,
    standards: &[&str],
    amount: Decimal,
) -> Value {
    json!({
        "invoice_no": invoice_no,
        "currency": "INR",
        "agent_id": agent_id,
        "company_id": company_id,
        "company_name": "Acme Textiles",
        "email": "accounts@acme.test",
        "city": "Pune",
        "country": "India",
        "gst_number": "27AAACA1234A1Z5",
        "total_gst_amount": round_money(amount * dec!(0.18)),
        "total_tds_amount": Decimal::ZERO,
        "base_closure_amount": amount,
        "standards": standards,
        "terms": [
            { "term_name": "Full payment", "base_amount": amount }
        ]
    })
}

/// A USD invoice body converted at `rate`.
pub fn usd_invoice(
    invoice_no: &str,
    agent_id: Option<&str>,
    company_id: Option<&str>,
    standards: &[&str],
    amount: Decimal,
    rate: Decimal,
) -> Value {
    json!({
        "invoice_no": invoice_no,
        "currency": "USD",
        "agent_id": agent_id,
        "company_id": company_id,
        "company_name": "Globex Inc",
        "email": "ap@globex.test",
        "country": "USA",
        "exchange_rate": rate,
        "base_closure_amount": amount,
        "standards": standards,
        "terms": [
            { "term_name": "Stage 1", "base_amount": amount }
        ]
    })
}

/// Retry policy with a short attempt timeout, for stores that stall.
pub fn impatient_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        attempt_timeout: Duration::from_millis(50),
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        add_jitter: false,
    }
}

#[derive(Default)]
struct Faults {
    failing: HashSet<&'static str>,
    slow_once: HashSet<&'static str>,
}

/// In-memory store that can fail named operations, or apply one and then
/// stall past the attempt timeout so the caller retries a write that
/// already landed.
pub struct FaultyStore {
    inner: InMemoryStore,
    faults: Mutex<Faults>,
    stall: Duration,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            faults: Mutex::new(Faults::default()),
            stall: Duration::from_millis(200),
        }
    }

    pub fn fail(&self, operation: &'static str) {
        self.faults.lock().unwrap().failing.insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        self.faults.lock().unwrap().failing.remove(operation);
    }

    pub fn stall_once(&self, operation: &'static str) {
        self.faults.lock().unwrap().slow_once.insert(operation);
    }

    /// Err for a failing operation, otherwise whether this call stalls.
    fn enter(&self, operation: &'static str) -> Result<bool, StoreError> {
        let mut faults = self.faults.lock().unwrap();
        if faults.failing.contains(operation) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected failure in {}",
                operation
            )));
        }
        Ok(faults.slow_once.remove(operation))
    }
}

macro_rules! faulty {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        #[async_trait]
        impl InvoiceStore for FaultyStore {
            $(
                async fn $name(&self $(, $arg: $ty)*) -> Result<$ret, StoreError> {
                    let stall = self.enter(stringify!($name))?;
                    let result = self.inner.$name($($arg),*).await;
                    if stall {
                        tokio::time::sleep(self.stall).await;
                    }
                    result
                }
            )*
        }
    };
}

faulty! {
    fn ping(&self) -> ();
    fn insert_invoice(&self, invoice: &Invoice) -> ();
    fn get_invoice(&self, id: &str) -> Option<Invoice>;
    fn replace_invoice(&self, invoice: &Invoice) -> bool;
    fn delete_invoice(&self, id: &str) -> bool;
    fn find_invoices(&self, filter: &InvoiceFilter, page: Option<Page>) -> Vec<Invoice>;
    fn count_invoices(&self, filter: &InvoiceFilter) -> u64;
    fn set_term_status(
        &self,
        invoice_id: &str,
        term_id: &str,
        status: TermStatus,
        now: DateTime<Utc>
    ) -> Option<Invoice>;
    fn set_proforma_status(
        &self,
        invoice_id: &str,
        status: ProformaStatus,
        now: DateTime<Utc>
    ) -> Option<Invoice>;
    fn insert_agent(&self, agent: &Agent) -> ();
    fn get_agent(&self, id: &str) -> Option<Agent>;
    fn find_agents(&self, filter: &AgentFilter, page: Option<Page>) -> Vec<Agent>;
    fn update_agent(&self, id: &str, patch: &AgentPatch, now: DateTime<Utc>) -> Option<Agent>;
    fn delete_agent(&self, id: &str) -> bool;
    fn link_agent_invoice(&self, agent_id: &str, invoice_id: &str, now: DateTime<Utc>) -> bool;
    fn unlink_agent_invoice(&self, agent_id: &str, invoice_id: &str, now: DateTime<Utc>) -> bool;
    fn credit_target(
        &self,
        agent_id: &str,
        invoice_id: &str,
        amount: Decimal,
        now: DateTime<Utc>
    ) -> bool;
    fn set_agent_target(
        &self,
        agent_id: &str,
        target: Decimal,
        change_id: &str,
        changed_at: DateTime<Utc>
    ) -> Option<Agent>;
    fn link_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>
    ) -> bool;
    fn unlink_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>
    ) -> bool;
    fn insert_company(&self, company: &Company) -> ();
    fn get_company(&self, id: &str) -> Option<Company>;
    fn find_companies(&self, page: Option<Page>) -> Vec<Company>;
    fn count_companies(&self) -> u64;
    fn update_company(&self, id: &str, patch: &CompanyPatch) -> Option<Company>;
    fn delete_company(&self, id: &str) -> bool;
    fn link_company_invoice(&self, company_id: &str, kind: InvoiceKind, invoice_id: &str) -> bool;
    fn unlink_company_invoice(&self, company_id: &str, kind: InvoiceKind, invoice_id: &str) -> bool;
    fn insert_certification(&self, certification: &Certification) -> ();
    fn get_certification(&self, id: &str) -> Option<Certification>;
    fn find_certifications(&self, agent_id: Option<&str>, page: Option<Page>) -> Vec<Certification>;
    fn count_certifications(&self, agent_id: Option<&str>) -> u64;
    fn replace_certification(&self, certification: &Certification) -> bool;
    fn delete_certification(&self, id: &str) -> bool;
    fn insert_manager(&self, manager: &Manager) -> ();
    fn get_manager(&self, id: &str) -> Option<Manager>;
    fn find_managers(&self, page: Option<Page>) -> Vec<Manager>;
    fn update_manager(&self, id: &str, patch: &ManagerPatch) -> Option<Manager>;
    fn delete_manager(&self, id: &str) -> bool;
    fn insert_standard(&self, standard: &Standard) -> ();
    fn get_standard(&self, id: &str) -> Option<Standard>;
    fn find_standards(&self, page: Option<Page>) -> Vec<Standard>;
    fn update_standard(&self, id: &str, patch: &StandardPatch) -> Option<Standard>;
    fn delete_standard(&self, id: &str) -> bool;
    fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>
    ) -> bool;
    fn release_lease(&self, key: &str, holder: &str) -> ();
}
