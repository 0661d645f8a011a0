//! Lead query endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::Auth;
use crate::api::extractors::{LeadPath, ValidatedQuery};
use crate::api::types::{
    ApiError, PaginatedResponse, default_limit, default_page, validate_limit, validate_page,
};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{LeadFilter, LeadRow, leads};

/// Shared state for lead endpoints
#[derive(Clone)]
pub struct LeadsApiState {
    pub database: Arc<SqliteService>,
}

/// Build lead routes
pub fn routes(database: Arc<SqliteService>) -> Router<()> {
    let state = LeadsApiState { database };

    Router::new()
        .route("/leads", get(list_leads))
        .route("/leads/counts-by-status", get(counts_by_status))
        .route("/leads/unassigned", get(list_unassigned))
        .route("/leads/my-leads", get(my_leads))
        .route("/leads/{lead_id}", get(get_lead))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListLeadsQuery {
    pub status: Option<String>,
    pub platform: Option<String>,
    pub assigned_user_id: Option<String>,
    /// Substring match over name, email, phone and company
    pub search: Option<String>,
    #[serde(default)]
    pub unassigned_only: bool,
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCountDto {
    pub status: String,
    pub count: i64,
}

/// List leads with filters
#[utoipa::path(
    get,
    path = "/api/v1/leads",
    tag = "leads",
    params(
        ("status" = Option<String>, Query, description = "Filter by pipeline status"),
        ("platform" = Option<String>, Query, description = "Filter by source platform"),
        ("assigned_user_id" = Option<String>, Query, description = "Filter by assignee"),
        ("search" = Option<String>, Query, description = "Substring search"),
        ("unassigned_only" = Option<bool>, Query, description = "Only leads with no assignee"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Leads with pagination metadata")
    )
)]
pub async fn list_leads(
    State(state): State<LeadsApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<ListLeadsQuery>,
) -> Result<Json<PaginatedResponse<LeadRow>>, ApiError> {
    let filter = LeadFilter {
        status: query.status.clone(),
        platform: query.platform.clone(),
        assigned_user_id: query.assigned_user_id.clone(),
        search: query.search.clone(),
        unassigned_only: query.unassigned_only,
        page: query.page,
        limit: query.limit,
    };
    let (rows, total) = leads::list_leads(state.database.pool(), &auth.ctx.tenant_id, &filter)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(PaginatedResponse::new(
        rows,
        query.page,
        query.limit,
        total,
    )))
}

/// Lead counts grouped by pipeline status
#[utoipa::path(
    get,
    path = "/api/v1/leads/counts-by-status",
    tag = "leads",
    responses(
        (status = 200, description = "Counts per status in pipeline order", body = [StatusCountDto])
    )
)]
pub async fn counts_by_status(
    State(state): State<LeadsApiState>,
    auth: Auth,
) -> Result<Json<Vec<StatusCountDto>>, ApiError> {
    let counts = leads::counts_by_status(state.database.pool(), &auth.ctx.tenant_id)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(
        counts
            .into_iter()
            .map(|(status, count)| StatusCountDto { status, count })
            .collect(),
    ))
}

/// Unassigned leads, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/leads/unassigned",
    tag = "leads",
    responses(
        (status = 200, description = "Unassigned leads in arrival order")
    )
)]
pub async fn list_unassigned(
    State(state): State<LeadsApiState>,
    auth: Auth,
) -> Result<Json<Vec<LeadRow>>, ApiError> {
    let rows = leads::list_unassigned_oldest_first(state.database.pool(), &auth.ctx.tenant_id)
        .await
        .map_err(ApiError::from_sqlite)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MyLeadsQuery {
    pub status: Option<String>,
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
}

/// Leads assigned to the calling user
#[utoipa::path(
    get,
    path = "/api/v1/leads/my-leads",
    tag = "leads",
    params(
        ("status" = Option<String>, Query, description = "Filter by pipeline status"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Caller's leads with pagination metadata")
    )
)]
pub async fn my_leads(
    State(state): State<LeadsApiState>,
    auth: Auth,
    ValidatedQuery(query): ValidatedQuery<MyLeadsQuery>,
) -> Result<Json<PaginatedResponse<LeadRow>>, ApiError> {
    let filter = LeadFilter {
        status: query.status.clone(),
        assigned_user_id: Some(auth.ctx.user_id.clone()),
        page: query.page,
        limit: query.limit,
        ..Default::default()
    };
    let (rows, total) = leads::list_leads(state.database.pool(), &auth.ctx.tenant_id, &filter)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(PaginatedResponse::new(
        rows,
        query.page,
        query.limit,
        total,
    )))
}

/// Get a single lead
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}",
    tag = "leads",
    params(
        ("lead_id" = String, Path, description = "Lead ID")
    ),
    responses(
        (status = 200, description = "Lead details"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn get_lead(
    State(state): State<LeadsApiState>,
    auth: Auth,
    path: LeadPath,
) -> Result<Json<LeadRow>, ApiError> {
    let lead = leads::get_lead(state.database.pool(), &auth.ctx.tenant_id, &path.lead_id)
        .await
        .map_err(ApiError::from_sqlite)?
        .ok_or_else(|| {
            ApiError::not_found("LEAD_NOT_FOUND", format!("lead not found: {}", path.lead_id))
        })?;
    Ok(Json(lead))
}
