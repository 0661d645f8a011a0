//! API route handlers

pub mod activities;
pub mod assignments;
pub mod health;
pub mod leads;
pub mod stages;
pub mod webhooks;
