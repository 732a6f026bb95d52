//! Invoicing service: invoices, proforma invoices, agent targets and
//! closure reporting for a certification agency.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
