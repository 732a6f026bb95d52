//! Application startup and lifecycle management.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{InvoicingConfig, StoreBackend};
use crate::handlers::{
    agents, certifications, companies, health_check, invoices, managers, metrics_endpoint,
    proforma, readiness_check, reports, standards,
};
use crate::services::{Clock, InMemoryStore, InvoiceStore, InvoicingService, MongoStore, SystemClock};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: InvoicingConfig,
    pub service: InvoicingService,
}

/// Every route of the service.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .patch(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/terms/pending", get(invoices::pending_terms))
        .route(
            "/invoices/:id/terms/:term_id/status",
            patch(invoices::update_term_status),
        )
        .route(
            "/proforma-invoices",
            post(proforma::create_proforma).get(proforma::list_proformas),
        )
        .route(
            "/proforma-invoices/:id",
            get(proforma::get_proforma)
                .patch(proforma::update_proforma)
                .delete(proforma::delete_proforma),
        )
        .route(
            "/proforma-invoices/:id/status",
            patch(proforma::update_proforma_status),
        )
        .route("/agents", post(agents::create_agent).get(agents::list_agents))
        .route(
            "/agents/:id",
            get(agents::get_agent)
                .patch(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route("/agents/:id/target", patch(agents::update_target))
        .route("/agents/:id/progress", get(agents::agent_progress))
        .route(
            "/certifications",
            post(certifications::create_certification).get(certifications::list_certifications),
        )
        .route(
            "/certifications/:id",
            get(certifications::get_certification)
                .patch(certifications::update_certification)
                .delete(certifications::delete_certification),
        )
        .route(
            "/managers",
            post(managers::create_manager).get(managers::list_managers),
        )
        .route(
            "/managers/:id",
            get(managers::get_manager)
                .patch(managers::update_manager)
                .delete(managers::delete_manager),
        )
        .route(
            "/companies",
            post(companies::create_company).get(companies::list_companies),
        )
        .route(
            "/companies/:id",
            get(companies::get_company)
                .patch(companies::update_company)
                .delete(companies::delete_company),
        )
        .route(
            "/standards",
            post(standards::create_standard).get(standards::list_standards),
        )
        .route(
            "/standards/:id",
            get(standards::get_standard)
                .patch(standards::update_standard)
                .delete(standards::delete_standard),
        )
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/pending-totals", get(reports::pending_totals))
        .route("/reports/pending-invoices", get(reports::pending_invoices))
        .route(
            "/reports/pending-by-standard",
            get(reports::pending_by_standard),
        )
        .route("/reports/unique-count", get(reports::unique_invoice_count))
        .route("/reports/gst", get(reports::gst_report))
        .route("/reports/tds", get(reports::tds_report))
        .route("/reports/monthly-closure", get(reports::monthly_closure))
        .route("/reports/agentwise", get(reports::agentwise_closures))
        .route(
            "/reports/agents/:id/performance",
            get(reports::agent_performance),
        )
        .route(
            "/reports/managers/:id/monthly-closure",
            get(reports::manager_monthly_closure),
        )
        .route(
            "/reports/managers/:id/target-graph",
            get(reports::manager_target_graph),
        )
        .route(
            "/reports/manager-performance",
            get(reports::overall_manager_performance),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api", api)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the configured store backend.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn InvoiceStore> = match config.store.backend {
            StoreBackend::Mongo => {
                let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to MongoDB: {}", e);
                        e
                    })?;
                store.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on shutdown");
                Arc::new(InMemoryStore::new())
            }
        };

        Self::build_with_store(config, store, Arc::new(SystemClock)).await
    }

    /// Build around an existing store and clock.
    pub async fn build_with_store(
        config: InvoicingConfig,
        store: Arc<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let service = InvoicingService::new(
            store,
            clock,
            config.retry_config(),
            config.lease_settings(),
        );
        let state = AppState {
            config: config.clone(),
            service,
        };

        // Port 0 picks a random port for testing
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port, backend = ?config.store.backend, "Invoicing service configured");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until_stopped(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let app = router(self.state);
        tracing::info!("HTTP server listening on port {}", self.http_port);
        axum::serve(self.http_listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
