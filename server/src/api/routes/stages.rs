//! Pipeline stage endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::Auth;
use crate::api::extractors::{LeadPath, ValidatedJson, ValidatedQuery};
use crate::api::types::{
    ApiError, PaginatedResponse, default_limit, default_page, validate_limit, validate_page,
};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{StageFilter, StageRow, StageSummaryRow, stages};
use crate::domain::{PipelineService, stages::StatusChange};

/// Shared state for stage endpoints
#[derive(Clone)]
pub struct StagesApiState {
    pub database: Arc<SqliteService>,
    pub pipeline: Arc<PipelineService>,
}

/// Build stage routes
pub fn routes(database: Arc<SqliteService>, pipeline: Arc<PipelineService>) -> Router<()> {
    let state = StagesApiState { database, pipeline };

    Router::new()
        .route("/leads/{lead_id}/status", post(change_status))
        .route("/leads/{lead_id}/transitions", get(possible_transitions))
        .route("/leads/{lead_id}/stages", get(lead_stage_history))
        .route("/stages", get(list_stages))
        .route("/stages/sla-violations", get(sla_violations))
        .route("/stages/summary", get(pipeline_summary))
        .route("/stages/recent", get(recent_changes))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeStatusRequest {
    /// Target pipeline status
    #[validate(length(min = 1, max = 64))]
    pub status: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 500))]
    pub next_action: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionsResponse {
    pub current_status: String,
    pub allowed_transitions: Vec<String>,
}

/// Change a lead's pipeline status
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/status",
    tag = "stages",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "New stage interval"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn change_status(
    State(state): State<StagesApiState>,
    auth: Auth,
    path: LeadPath,
    ValidatedJson(body): ValidatedJson<ChangeStatusRequest>,
) -> Result<Json<StageRow>, ApiError> {
    let change = StatusChange {
        target: body.status,
        acting_user_id: Some(auth.ctx.user_id.clone()),
        notes: body.notes,
        next_action: body.next_action,
    };
    let stage = state
        .pipeline
        .change_status(&auth.ctx.tenant_id, &path.lead_id, &change)
        .await?;
    Ok(Json(stage))
}

/// Statuses a lead may move to next
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}/transitions",
    tag = "stages",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Current status and allowed targets", body = TransitionsResponse),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn possible_transitions(
    State(state): State<StagesApiState>,
    auth: Auth,
    path: LeadPath,
) -> Result<Json<TransitionsResponse>, ApiError> {
    let (current_status, allowed_transitions) = state
        .pipeline
        .next_possible(&auth.ctx.tenant_id, &path.lead_id)
        .await?;
    Ok(Json(TransitionsResponse {
        current_status,
        allowed_transitions,
    }))
}

/// Full stage history of a lead
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}/stages",
    tag = "stages",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Stage intervals in sequence order")
    )
)]
pub async fn lead_stage_history(
    State(state): State<StagesApiState>,
    auth: Auth,
    path: LeadPath,
) -> Result<Json<Vec<StageRow>>, ApiError> {
    let rows = stages::stage_history(state.database.pool(), &auth.ctx.tenant_id, &path.lead_id)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListStagesQuery {
    pub status: Option<String>,
    pub acting_user_id: Option<String>,
    /// Unix seconds, inclusive lower bound on entered_at
    pub entered_from: Option<i64>,
    /// Unix seconds, inclusive upper bound on entered_at
    pub entered_to: Option<i64>,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

/// List stage intervals across the tenant
#[utoipa::path(
    get,
    path = "/api/v1/stages",
    tag = "stages",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("acting_user_id" = Option<String>, Query, description = "Filter by acting user"),
        ("entered_from" = Option<i64>, Query, description = "Entered at or after (unix seconds)"),
        ("entered_to" = Option<i64>, Query, description = "Entered at or before (unix seconds)"),
        ("active_only" = Option<bool>, Query, description = "Only open intervals"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Stage intervals with pagination metadata")
    )
)]
pub async fn list_stages(
    State(state): State<StagesApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<ListStagesQuery>,
) -> Result<Json<PaginatedResponse<StageRow>>, ApiError> {
    let filter = StageFilter {
        status: query.status.clone(),
        acting_user_id: query.acting_user_id.clone(),
        entered_from: query.entered_from,
        entered_to: query.entered_to,
        active_only: query.active_only,
        page: query.page,
        limit: query.limit,
    };
    let (rows, total) = stages::list_stages(state.database.pool(), &auth.ctx.tenant_id, &filter)
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
pub struct SlaQuery {
    /// Open intervals older than this many hours are reported
    #[serde(default = "default_sla_threshold")]
    #[validate(range(min = 0.1, max = 8760.0))]
    pub threshold_hours: f64,
}

fn default_sla_threshold() -> f64 {
    24.0
}

/// Open, non-terminal stages breaching the age threshold
#[utoipa::path(
    get,
    path = "/api/v1/stages/sla-violations",
    tag = "stages",
    params(
        ("threshold_hours" = Option<f64>, Query, description = "Age threshold in hours, default 24")
    ),
    responses(
        (status = 200, description = "Stale open intervals, oldest first")
    )
)]
pub async fn sla_violations(
    State(state): State<StagesApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<SlaQuery>,
) -> Result<Json<Vec<StageRow>>, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let rows = stages::sla_violations(
        state.database.pool(),
        &auth.ctx.tenant_id,
        query.threshold_hours,
        now,
    )
    .await
    .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}

/// Open-stage counts and average age per status
#[utoipa::path(
    get,
    path = "/api/v1/stages/summary",
    tag = "stages",
    responses(
        (status = 200, description = "Per-status pipeline summary")
    )
)]
pub async fn pipeline_summary(
    State(state): State<StagesApiState>,
    auth: Auth,
) -> Result<Json<Vec<StageSummaryRow>>, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let rows = stages::pipeline_summary(state.database.pool(), &auth.ctx.tenant_id, now)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

/// Most recent stage entries across the tenant
#[utoipa::path(
    get,
    path = "/api/v1/stages/recent",
    tag = "stages",
    params(
        ("limit" = Option<u32>, Query, description = "Maximum entries to return")
    ),
    responses(
        (status = 200, description = "Latest stage entries, newest first")
    )
)]
pub async fn recent_changes(
    State(state): State<StagesApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<RecentQuery>,
) -> Result<Json<Vec<StageRow>>, ApiError> {
    let rows = stages::recent_changes(state.database.pool(), &auth.ctx.tenant_id, query.limit)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}
