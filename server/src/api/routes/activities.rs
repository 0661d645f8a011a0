//! Activity and follow-up endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::Auth;
use crate::api::extractors::{ActivityPath, LeadPath, ValidatedJson, ValidatedQuery};
use crate::api::types::{
    ApiError, PaginatedResponse, default_limit, default_page, validate_limit, validate_page,
};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{
    ActivityFilter, ActivityRow, ActivityStats, NewActivity, activities, leads,
};
use crate::domain::activity::{FollowUpState, classify_follow_up};

const ACTIVITY_TYPES: &[&str] = &[
    "call",
    "email",
    "meeting",
    "note",
    "status_change",
    "assignment",
    "follow_up",
];
const ACTIVITY_STATUSES: &[&str] = &["pending", "completed", "cancelled"];
const PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

/// Shared state for activity endpoints
#[derive(Clone)]
pub struct ActivitiesApiState {
    pub database: Arc<SqliteService>,
}

/// Build activity routes
pub fn routes(database: Arc<SqliteService>) -> Router<()> {
    let state = ActivitiesApiState { database };

    Router::new()
        .route(
            "/leads/{lead_id}/activities",
            get(lead_activities).post(log_activity),
        )
        .route("/activities", get(list_activities))
        .route("/activities/pending", get(pending_follow_ups))
        .route("/activities/overdue", get(overdue_follow_ups))
        .route("/activities/upcoming", get(upcoming_follow_ups))
        .route("/activities/stats", get(activity_stats))
        .route("/activities/follow-ups/bulk", post(bulk_reschedule))
        .route("/activities/{activity_id}/status", patch(update_status))
        .route("/activities/{activity_id}/follow-up", patch(update_follow_up))
        .with_state(state)
}

fn validate_activity_type(value: &str) -> Result<(), validator::ValidationError> {
    if ACTIVITY_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("activity_type").with_message(
            "activity_type must be one of: call, email, meeting, note, status_change, assignment, follow_up"
                .into(),
        ))
    }
}

fn validate_activity_status(value: &str) -> Result<(), validator::ValidationError> {
    if ACTIVITY_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("status")
            .with_message("status must be one of: pending, completed, cancelled".into()))
    }
}

fn validate_priority(value: &str) -> Result<(), validator::ValidationError> {
    if PRIORITIES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("priority")
            .with_message("priority must be one of: low, medium, high, urgent".into()))
    }
}

/// Activity as returned by listings, with the derived overdue flag
#[derive(Debug, Serialize)]
pub struct ActivityDto {
    #[serde(flatten)]
    pub activity: ActivityRow,
    /// Computed against the clock at response time, never stored
    pub overdue: bool,
}

impl ActivityDto {
    fn from_row(row: ActivityRow, now: i64) -> Self {
        let overdue = matches!(
            classify_follow_up(row.follow_up_at, &row.status, now),
            FollowUpState::Overdue
        );
        Self {
            activity: row,
            overdue,
        }
    }
}

fn to_dtos(rows: Vec<ActivityRow>) -> Vec<ActivityDto> {
    let now = chrono::Utc::now().timestamp();
    rows.into_iter()
        .map(|row| ActivityDto::from_row(row, now))
        .collect()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogActivityRequest {
    #[validate(custom(function = "validate_activity_type"))]
    pub activity_type: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    /// Unix seconds; omit for no follow-up
    pub follow_up_at: Option<i64>,
    #[validate(custom(function = "validate_priority"))]
    pub priority: Option<String>,
}

/// Log an activity against a lead
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/activities",
    tag = "activities",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    request_body = LogActivityRequest,
    responses(
        (status = 200, description = "Activity recorded"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn log_activity(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
    path: LeadPath,
    ValidatedJson(body): ValidatedJson<LogActivityRequest>,
) -> Result<Json<ActivityRow>, ApiError> {
    leads::get_lead(state.database.pool(), &auth.ctx.tenant_id, &path.lead_id)
        .await
        .map_err(ApiError::from_sqlite)?
        .ok_or_else(|| {
            ApiError::not_found("LEAD_NOT_FOUND", format!("lead not found: {}", path.lead_id))
        })?;

    let activity = activities::log_activity(
        state.database.pool(),
        &auth.ctx.tenant_id,
        &path.lead_id,
        Some(&auth.ctx.user_id),
        &NewActivity {
            activity_type: body.activity_type,
            description: body.description,
            follow_up_at: body.follow_up_at,
            priority: body.priority,
        },
    )
    .await
    .map_err(ApiError::from_sqlite)?;
    Ok(Json(activity))
}

/// All activities for a lead, newest first
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}/activities",
    tag = "activities",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Activities, newest first")
    )
)]
pub async fn lead_activities(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
    path: LeadPath,
) -> Result<Json<Vec<ActivityDto>>, ApiError> {
    let rows = activities::list_for_lead(state.database.pool(), &auth.ctx.tenant_id, &path.lead_id)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(to_dtos(rows)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    #[validate(custom(function = "validate_activity_status"))]
    pub status: String,
}

/// Set an activity's status
#[utoipa::path(
    patch,
    path = "/api/v1/activities/{activity_id}/status",
    tag = "activities",
    params(
        ("activity_id" = String, Path, description = "Activity ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated activity"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn update_status(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
    path: ActivityPath,
    ValidatedJson(body): ValidatedJson<UpdateStatusRequest>,
) -> Result<Json<ActivityRow>, ApiError> {
    let row = activities::update_activity_status(
        state.database.pool(),
        &auth.ctx.tenant_id,
        &path.activity_id,
        &body.status,
    )
    .await
    .map_err(ApiError::from_sqlite)?
    .ok_or_else(|| {
        ApiError::not_found(
            "ACTIVITY_NOT_FOUND",
            format!("activity not found: {}", path.activity_id),
        )
    })?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFollowUpRequest {
    /// Unix seconds; null clears the follow-up
    pub follow_up_at: Option<i64>,
}

/// Reschedule or clear an activity's follow-up
#[utoipa::path(
    patch,
    path = "/api/v1/activities/{activity_id}/follow-up",
    tag = "activities",
    params(
        ("activity_id" = String, Path, description = "Activity ID")
    ),
    request_body = UpdateFollowUpRequest,
    responses(
        (status = 200, description = "Updated activity"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn update_follow_up(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
    path: ActivityPath,
    ValidatedJson(body): ValidatedJson<UpdateFollowUpRequest>,
) -> Result<Json<ActivityRow>, ApiError> {
    let row = activities::update_follow_up(
        state.database.pool(),
        &auth.ctx.tenant_id,
        &path.activity_id,
        body.follow_up_at,
    )
    .await
    .map_err(ApiError::from_sqlite)?
    .ok_or_else(|| {
        ApiError::not_found(
            "ACTIVITY_NOT_FOUND",
            format!("activity not found: {}", path.activity_id),
        )
    })?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkRescheduleRequest {
    #[validate(length(min = 1, max = 500))]
    pub activity_ids: Vec<String>,
    /// Unix seconds; null clears the follow-up on every listed activity
    pub follow_up_at: Option<i64>,
}

/// Reschedule many follow-ups at once
#[utoipa::path(
    post,
    path = "/api/v1/activities/follow-ups/bulk",
    tag = "activities",
    request_body = BulkRescheduleRequest,
    responses(
        (status = 200, description = "Count of updated activities")
    )
)]
pub async fn bulk_reschedule(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
    ValidatedJson(body): ValidatedJson<BulkRescheduleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = activities::bulk_update_follow_up(
        state.database.pool(),
        &auth.ctx.tenant_id,
        &body.activity_ids,
        body.follow_up_at,
    )
    .await
    .map_err(ApiError::from_sqlite)?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListActivitiesQuery {
    pub activity_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub user_id: Option<String>,
    /// Unix seconds, inclusive lower bound on created_at
    pub created_from: Option<i64>,
    /// Unix seconds, inclusive upper bound on created_at
    pub created_to: Option<i64>,
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

/// List activities across the tenant
#[utoipa::path(
    get,
    path = "/api/v1/activities",
    tag = "activities",
    params(
        ("activity_type" = Option<String>, Query, description = "Filter by type"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("user_id" = Option<String>, Query, description = "Filter by logging user"),
        ("created_from" = Option<i64>, Query, description = "Created at or after (unix seconds)"),
        ("created_to" = Option<i64>, Query, description = "Created at or before (unix seconds)"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Activities with pagination metadata")
    )
)]
pub async fn list_activities(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<ListActivitiesQuery>,
) -> Result<Json<PaginatedResponse<ActivityDto>>, ApiError> {
    let filter = ActivityFilter {
        activity_type: query.activity_type.clone(),
        status: query.status.clone(),
        priority: query.priority.clone(),
        user_id: query.user_id.clone(),
        created_from: query.created_from,
        created_to: query.created_to,
        page: query.page,
        limit: query.limit,
    };
    let (rows, total) =
        activities::list_activities(state.database.pool(), &auth.ctx.tenant_id, &filter)
            .await
            .map_err(ApiError::from_sqlite)?;

    Ok(Json(PaginatedResponse::new(
        to_dtos(rows),
        query.page,
        query.limit,
        total,
    )))
}

/// Pending follow-ups, highest priority first
#[utoipa::path(
    get,
    path = "/api/v1/activities/pending",
    tag = "activities",
    responses(
        (status = 200, description = "Pending follow-ups by priority then date")
    )
)]
pub async fn pending_follow_ups(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
) -> Result<Json<Vec<ActivityDto>>, ApiError> {
    let rows = activities::pending_follow_ups(state.database.pool(), &auth.ctx.tenant_id)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(to_dtos(rows)))
}

/// Follow-ups already past due
#[utoipa::path(
    get,
    path = "/api/v1/activities/overdue",
    tag = "activities",
    responses(
        (status = 200, description = "Overdue follow-ups by priority then date")
    )
)]
pub async fn overdue_follow_ups(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
) -> Result<Json<Vec<ActivityDto>>, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let rows = activities::overdue_follow_ups(state.database.pool(), &auth.ctx.tenant_id, now)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(to_dtos(rows)))
}

/// Follow-ups still in the future
#[utoipa::path(
    get,
    path = "/api/v1/activities/upcoming",
    tag = "activities",
    responses(
        (status = 200, description = "Upcoming follow-ups by priority then date")
    )
)]
pub async fn upcoming_follow_ups(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
) -> Result<Json<Vec<ActivityDto>>, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let rows = activities::upcoming_follow_ups(state.database.pool(), &auth.ctx.tenant_id, now)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(to_dtos(rows)))
}

/// Activity counts and follow-up totals
#[utoipa::path(
    get,
    path = "/api/v1/activities/stats",
    tag = "activities",
    responses(
        (status = 200, description = "Counts by type and status, pending and overdue totals")
    )
)]
pub async fn activity_stats(
    State(state): State<ActivitiesApiState>,
    auth: Auth,
) -> Result<Json<ActivityStats>, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let stats = activities::activity_stats(state.database.pool(), &auth.ctx.tenant_id, now)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(stats))
}
