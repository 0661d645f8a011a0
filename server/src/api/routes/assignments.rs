//! Lead assignment endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::Auth;
use crate::api::extractors::{LeadPath, ValidatedJson, ValidatedQuery};
use crate::api::types::{
    ApiError, PaginatedResponse, default_limit, default_page, validate_limit, validate_page,
};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{AssignmentRow, WorkloadRow, assignments};
use crate::domain::AssignmentService;
use crate::domain::assignment::BulkAssignOutcome;

/// Shared state for assignment endpoints
#[derive(Clone)]
pub struct AssignmentsApiState {
    pub database: Arc<SqliteService>,
    pub assignment: Arc<AssignmentService>,
    /// Per-user cap applied when a bulk request does not carry one
    pub default_cap: i64,
}

/// Build assignment routes
pub fn routes(
    database: Arc<SqliteService>,
    assignment: Arc<AssignmentService>,
    default_cap: i64,
) -> Router<()> {
    let state = AssignmentsApiState {
        database,
        assignment,
        default_cap,
    };

    Router::new()
        .route("/leads/{lead_id}/assignment", get(get_assignment).post(assign_lead))
        .route("/leads/{lead_id}/assignment/history", get(assignment_history))
        .route("/assignments", get(list_assignments))
        .route("/assignments/bulk", post(bulk_assign))
        .route("/assignments/workload", get(workload))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRequest {
    /// Assignee; null unassigns the lead
    pub user_id: Option<String>,
    #[validate(length(max = 100))]
    pub reason: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Assign, reassign or unassign a lead
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/assignment",
    tag = "assignments",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Assignment event recorded"),
        (status = 400, description = "Assignee unknown or deactivated"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Nothing to unassign")
    )
)]
pub async fn assign_lead(
    State(state): State<AssignmentsApiState>,
    auth: Auth,
    path: LeadPath,
    ValidatedJson(body): ValidatedJson<AssignRequest>,
) -> Result<Json<AssignmentRow>, ApiError> {
    let row = state
        .assignment
        .assign(
            &auth.ctx.tenant_id,
            &path.lead_id,
            body.user_id.as_deref(),
            Some(&auth.ctx.user_id),
            body.reason.as_deref().or(Some("manual")),
            body.notes.as_deref(),
        )
        .await?;
    Ok(Json(row))
}

/// Current assignment of a lead
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}/assignment",
    tag = "assignments",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Assignment snapshot"),
        (status = 404, description = "Lead has never been assigned")
    )
)]
pub async fn get_assignment(
    State(state): State<AssignmentsApiState>,
    auth: Auth,
    path: LeadPath,
) -> Result<Json<AssignmentRow>, ApiError> {
    let row = assignments::get_assignment(state.database.pool(), &auth.ctx.tenant_id, &path.lead_id)
        .await
        .map_err(ApiError::from_sqlite)?
        .ok_or_else(|| {
            ApiError::not_found(
                "ASSIGNMENT_NOT_FOUND",
                format!("no assignment for lead: {}", path.lead_id),
            )
        })?;
    Ok(Json(row))
}

/// Assignment history of a lead, newest first
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}/assignment/history",
    tag = "assignments",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Assignment events, newest first")
    )
)]
pub async fn assignment_history(
    State(state): State<AssignmentsApiState>,
    auth: Auth,
    path: LeadPath,
) -> Result<Json<Vec<AssignmentRow>>, ApiError> {
    let rows =
        assignments::assignment_history(state.database.pool(), &auth.ctx.tenant_id, &path.lead_id)
            .await
            .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListAssignmentsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

/// List current assignments across the tenant
#[utoipa::path(
    get,
    path = "/api/v1/assignments",
    tag = "assignments",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Assignment snapshots with pagination metadata")
    )
)]
pub async fn list_assignments(
    State(state): State<AssignmentsApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<ListAssignmentsQuery>,
) -> Result<Json<PaginatedResponse<AssignmentRow>>, ApiError> {
    let (rows, total) = assignments::list_assignments(
        state.database.pool(),
        &auth.ctx.tenant_id,
        query.page,
        query.limit,
    )
    .await
    .map_err(ApiError::from_sqlite)?;

    Ok(Json(PaginatedResponse::new(
        rows,
        query.page,
        query.limit,
        total,
    )))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkAssignRequest {
    /// Per-user cap on total active leads; server default applies when absent
    #[validate(range(min = 1, max = 1000))]
    pub max_per_user: Option<i64>,
}

/// Distribute the unassigned backlog across active users
///
/// Managers and admins only.
#[utoipa::path(
    post,
    path = "/api/v1/assignments/bulk",
    tag = "assignments",
    request_body = BulkAssignRequest,
    responses(
        (status = 200, description = "Counts of assigned, failed and remaining leads"),
        (status = 403, description = "Caller is not a manager"),
        (status = 409, description = "No active users to assign to")
    )
)]
pub async fn bulk_assign(
    State(state): State<AssignmentsApiState>,
    auth: Auth,
    ValidatedJson(body): ValidatedJson<BulkAssignRequest>,
) -> Result<Json<BulkAssignOutcome>, ApiError> {
    auth.ctx.require_manager()?;

    let outcome = state
        .assignment
        .bulk_assign_unassigned(
            &auth.ctx.tenant_id,
            Some(&auth.ctx.user_id),
            Some(body.max_per_user.unwrap_or(state.default_cap)),
        )
        .await?;
    Ok(Json(outcome))
}

/// Per-user workload across the tenant
#[utoipa::path(
    get,
    path = "/api/v1/assignments/workload",
    tag = "assignments",
    responses(
        (status = 200, description = "Total, active and closed lead counts per active user")
    )
)]
pub async fn workload(
    State(state): State<AssignmentsApiState>,
    auth: Auth,
) -> Result<Json<Vec<WorkloadRow>>, ApiError> {
    let rows = assignments::workload_distribution(state.database.pool(), &auth.ctx.tenant_id)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}
