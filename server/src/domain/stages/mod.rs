//! Pipeline stage machine
//!
//! Owns status changes for leads. Validation happens against the
//! [`TransitionGraph`]; the actual stage close/open and the denormalized
//! status update run in one transaction in the stages repository, guarded by
//! a compare-and-set on the lead's current status.

pub mod transitions;

use std::sync::Arc;

use crate::data::{SqliteError, SqliteService};
use crate::data::sqlite::repositories::{leads, stages, StageRow};
use crate::domain::error::DomainError;

pub use transitions::TransitionGraph;

/// Parameters for a status change
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub target: String,
    pub acting_user_id: Option<String>,
    pub notes: Option<String>,
    pub next_action: Option<String>,
}

pub struct PipelineService {
    db: Arc<SqliteService>,
    graph: Arc<TransitionGraph>,
}

impl PipelineService {
    pub fn new(db: Arc<SqliteService>, graph: Arc<TransitionGraph>) -> Self {
        Self { db, graph }
    }

    pub fn graph(&self) -> &TransitionGraph {
        &self.graph
    }

    /// Move a lead to a new pipeline status
    ///
    /// Reads the lead's current status, validates the target against the
    /// graph, then runs the guarded transition. If a concurrent change wins
    /// the race the whole thing is retried once from fresh state; a second
    /// loss reports the transition as invalid from whatever the status is
    /// now.
    pub async fn change_status(
        &self,
        tenant_id: &str,
        lead_id: &str,
        change: &StatusChange,
    ) -> Result<StageRow, DomainError> {
        let pool = self.db.pool();

        // A status the graph has never heard of is a bad argument, not a
        // disallowed move
        if !self.graph.is_known(&change.target) {
            return Err(DomainError::invalid_argument(format!(
                "unknown status: {}",
                change.target
            )));
        }

        for attempt in 0..2 {
            let lead = leads::get_lead(pool, tenant_id, lead_id)
                .await?
                .ok_or_else(|| DomainError::not_found("lead", lead_id))?;

            if !self.graph.is_allowed(&lead.status, &change.target) {
                return Err(self.invalid_transition(&lead.status, &change.target));
            }

            match stages::transition_stage(
                pool,
                tenant_id,
                lead_id,
                &lead.status,
                &change.target,
                change.acting_user_id.as_deref(),
                change.notes.as_deref(),
                change.next_action.as_deref(),
            )
            .await
            {
                Ok(stage) => {
                    tracing::info!(
                        lead_id,
                        from = %lead.status,
                        to = %change.target,
                        "Lead status changed"
                    );
                    return Ok(stage);
                }
                Err(SqliteError::Conflict(_)) if attempt == 0 => {
                    tracing::debug!(lead_id, "Status moved concurrently, retrying transition");
                    continue;
                }
                Err(SqliteError::Conflict(_)) => {
                    // Lost the race twice; report against the fresh status
                    let fresh = leads::get_lead(pool, tenant_id, lead_id)
                        .await?
                        .ok_or_else(|| DomainError::not_found("lead", lead_id))?;
                    return Err(self.invalid_transition(&fresh.status, &change.target));
                }
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!("transition loop returns within two attempts")
    }

    /// Current status and the statuses it may move to
    pub async fn next_possible(
        &self,
        tenant_id: &str,
        lead_id: &str,
    ) -> Result<(String, Vec<String>), DomainError> {
        let lead = leads::get_lead(self.db.pool(), tenant_id, lead_id)
            .await?
            .ok_or_else(|| DomainError::not_found("lead", lead_id))?;
        let allowed = self.graph.allowed_next(&lead.status).to_vec();
        Ok((lead.status, allowed))
    }

    fn invalid_transition(&self, from: &str, to: &str) -> DomainError {
        DomainError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
            allowed: self.graph.allowed_next(from).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{seed_lead, seed_tenant, setup_test_pool};

    async fn service() -> (PipelineService, String, String) {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "lg_pipeline").await;
        let service = PipelineService::new(
            Arc::new(SqliteService::from_pool(pool)),
            Arc::new(TransitionGraph::load(None).unwrap()),
        );
        (service, tenant.id, lead.id)
    }

    fn change(target: &str) -> StatusChange {
        StatusChange {
            target: target.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_valid_transition_advances_lead() {
        let (service, tenant_id, lead_id) = service().await;

        let stage = service
            .change_status(&tenant_id, &lead_id, &change("qualified"))
            .await
            .unwrap();
        assert_eq!(stage.status, "qualified");
        assert_eq!(stage.seq, 2);

        let (current, allowed) = service.next_possible(&tenant_id, &lead_id).await.unwrap();
        assert_eq!(current, "qualified");
        assert_eq!(allowed, vec!["contacted", "lost"]);
    }

    #[tokio::test]
    async fn test_skipping_stages_is_rejected_with_allowed_set() {
        let (service, tenant_id, lead_id) = service().await;

        let err = service
            .change_status(&tenant_id, &lead_id, &change("negotiation"))
            .await
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, to, allowed } => {
                assert_eq!(from, "new");
                assert_eq!(to, "negotiation");
                assert_eq!(allowed, vec!["qualified", "lost"]);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_status_is_invalid_argument() {
        let (service, tenant_id, lead_id) = service().await;

        let err = service
            .change_status(&tenant_id, &lead_id, &change("archived"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        // The lead did not move
        let (current, _) = service.next_possible(&tenant_id, &lead_id).await.unwrap();
        assert_eq!(current, "new");
    }

    #[tokio::test]
    async fn test_terminal_status_is_immutable() {
        let (service, tenant_id, lead_id) = service().await;

        service
            .change_status(&tenant_id, &lead_id, &change("lost"))
            .await
            .unwrap();

        let err = service
            .change_status(&tenant_id, &lead_id, &change("qualified"))
            .await
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, allowed, .. } => {
                assert_eq!(from, "lost");
                assert!(allowed.is_empty());
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_lead_is_not_found() {
        let (service, tenant_id, _) = service().await;

        let err = service
            .change_status(&tenant_id, "nope", &change("qualified"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
