//! Domain logic for the lead pipeline
//!
//! - `activity` - follow-up classification
//! - `assignment` - single and workload-balanced bulk assignment
//! - `ingestion` - webhook intake, normalization and the stream consumer
//! - `stages` - pipeline status machine and transition graph

pub mod activity;
pub mod assignment;
pub mod error;
pub mod ingestion;
pub mod stages;

pub use assignment::AssignmentService;
pub use error::DomainError;
pub use ingestion::{IngestionService, LeadEvent};
pub use stages::{PipelineService, TransitionGraph};
