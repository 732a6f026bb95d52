//! Services module for invoicing-service.

pub mod accrual;
pub mod associations;
pub mod certifications;
pub mod clock;
pub mod database;
pub mod directory;
pub mod error;
pub mod invoices;
pub mod invoicing;
pub mod memory;
pub mod metrics;
pub mod reports;
pub mod store;
pub mod term_ledger;

pub use accrual::AccrualOutcome;
pub use clock::{Clock, FixedClock, SystemClock};
pub use database::MongoStore;
pub use directory::ManagerSummary;
pub use error::{ConsistencyWarning, InvoicingError, Outcome, StoreError, WarningKind};
pub use invoices::Listing;
pub use invoicing::{InvoicingService, LeaseSettings};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{InvoiceFilter, InvoiceStore, Page};
