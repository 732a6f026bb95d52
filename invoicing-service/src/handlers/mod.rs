//! HTTP handlers for invoicing-service.
//!
//! Handlers only parse, validate request shapes and serialise; every rule
//! lives in `services`.

pub mod agents;
pub mod certifications;
pub mod companies;
pub mod health;
pub mod invoices;
pub mod managers;
pub mod proforma;
pub mod reports;
pub mod standards;

pub use health::{health_check, metrics_endpoint, readiness_check};
