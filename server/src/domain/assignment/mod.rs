//! Lead assignment
//!
//! Single-lead assignment with assignee validation, and workload-balanced
//! bulk assignment of the unassigned backlog. The pick order lives in
//! [`engine::WorkloadLedger`]; this module wires it to the repositories.

pub mod engine;

use std::sync::Arc;

use serde::Serialize;

use crate::core::constants::DEFAULT_MAX_LEADS_PER_USER;
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{AssignmentRow, assignments, leads, users};
use crate::domain::error::DomainError;

use engine::WorkloadLedger;

/// Result of a bulk assignment run
#[derive(Debug, Clone, Serialize)]
pub struct BulkAssignOutcome {
    /// Leads successfully assigned
    pub assigned: u64,
    /// Leads skipped because the per-lead write failed
    pub failed: u64,
    /// Leads left unassigned because every user hit the cap
    pub remaining: u64,
}

pub struct AssignmentService {
    db: Arc<SqliteService>,
}

impl AssignmentService {
    pub fn new(db: Arc<SqliteService>) -> Self {
        Self { db }
    }

    /// Assign, reassign or unassign (`user_id = None`) a single lead
    ///
    /// A non-null assignee must be an active user of the same tenant.
    /// Unassigning a lead that has no assignee is rejected.
    pub async fn assign(
        &self,
        tenant_id: &str,
        lead_id: &str,
        user_id: Option<&str>,
        assigned_by: Option<&str>,
        reason: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AssignmentRow, DomainError> {
        let pool = self.db.pool();

        let lead = leads::get_lead(pool, tenant_id, lead_id)
            .await?
            .ok_or_else(|| DomainError::not_found("lead", lead_id))?;

        match user_id {
            Some(user_id) => {
                let user = users::get_user(pool, tenant_id, user_id)
                    .await?
                    .ok_or_else(|| {
                        DomainError::invalid_argument(format!("unknown assignee: {user_id}"))
                    })?;
                if !user.is_active {
                    return Err(DomainError::invalid_argument(format!(
                        "assignee is deactivated: {user_id}"
                    )));
                }
            }
            None => {
                if lead.assigned_user_id.is_none() {
                    return Err(DomainError::InvalidState(format!(
                        "lead has no assignee to remove: {lead_id}"
                    )));
                }
            }
        }

        let row = assignments::assign_lead(
            pool, tenant_id, lead_id, user_id, assigned_by, reason, notes,
        )
        .await?;

        tracing::info!(
            lead_id,
            assignee = user_id.unwrap_or("none"),
            previous = row.previous_user_id.as_deref().unwrap_or("none"),
            "Lead assignment changed"
        );
        Ok(row)
    }

    /// Distribute the unassigned backlog across active users, oldest first
    ///
    /// Each pick goes to the user with the fewest active (non-terminal)
    /// leads, counting assignments made during this run. Users at
    /// `max_per_user` stop receiving leads; with no active users at all the
    /// run is rejected outright.
    pub async fn bulk_assign_unassigned(
        &self,
        tenant_id: &str,
        assigned_by: Option<&str>,
        max_per_user: Option<i64>,
    ) -> Result<BulkAssignOutcome, DomainError> {
        let pool = self.db.pool();
        let cap = max_per_user.unwrap_or(i64::from(DEFAULT_MAX_LEADS_PER_USER));
        if cap < 1 {
            return Err(DomainError::invalid_argument(
                "max_per_user must be at least 1",
            ));
        }

        let active = users::list_active_users(pool, tenant_id).await?;
        if active.is_empty() {
            return Err(DomainError::NoEligibleAssignees);
        }

        // Seed with current active-lead counts, in the users' listing order
        let workload = assignments::workload_distribution(pool, tenant_id).await?;
        let seeds = active
            .iter()
            .map(|user| {
                let count = workload
                    .iter()
                    .find(|w| w.user_id == user.id)
                    .map(|w| w.active_leads)
                    .unwrap_or(0);
                (user.id.clone(), count)
            })
            .collect();
        let mut ledger = WorkloadLedger::new(seeds, cap);

        let candidates = leads::list_unassigned_oldest_first(pool, tenant_id).await?;
        let total = candidates.len() as u64;
        let mut outcome = BulkAssignOutcome {
            assigned: 0,
            failed: 0,
            remaining: 0,
        };

        for lead in &candidates {
            let Some(user_id) = ledger.pick().map(String::from) else {
                break;
            };
            match assignments::assign_lead(
                pool,
                tenant_id,
                &lead.id,
                Some(&user_id),
                assigned_by,
                Some("bulk_assign"),
                None,
            )
            .await
            {
                Ok(_) => outcome.assigned += 1,
                Err(e) => {
                    tracing::warn!(lead_id = %lead.id, error = %e, "Bulk assignment skipped lead");
                    outcome.failed += 1;
                }
            }
        }
        outcome.remaining = total - outcome.assigned - outcome.failed;

        tracing::info!(
            assigned = outcome.assigned,
            failed = outcome.failed,
            remaining = outcome.remaining,
            "Bulk assignment finished"
        );
        Ok(outcome)
    }
}
