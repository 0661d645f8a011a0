//! LeadFlow server library
//!
//! Multi-tenant CRM lead backend: webhook ingestion (Facebook Lead Ads and
//! website forms), pipeline stage management, workload-balanced assignment
//! and activity tracking over an embedded SQLite database.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
