//! Webhook intake endpoints
//!
//! These endpoints live outside the bearer-authenticated API surface; each
//! carries its own authentication. Facebook signs every POST body with the
//! app secret, and website forms present a per-tenant webhook key.
//!
//! The Facebook POST acknowledges immediately after publishing events to the
//! stream; the heavy work (Graph API fetch, normalization) happens in the
//! consumer. Website submissions are stored synchronously so the form gets
//! the lead id back.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::types::ApiError;
use crate::core::config::FacebookConfig;
use crate::core::constants::{
    HEADER_HUB_SIGNATURE, HEADER_WEBHOOK_KEY, TOPIC_LEAD_EVENTS, WEBHOOK_BODY_LIMIT,
};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::tenants;
use crate::data::topics::TopicService;
use crate::domain::ingestion::{
    IngestionService, LeadEvent, WebhookPayload, WebsiteLeadPayload, verify_signature,
};
use crate::utils::crypto::constant_time_eq;

/// Shared state for webhook endpoints
#[derive(Clone)]
pub struct WebhooksApiState {
    pub database: Arc<SqliteService>,
    pub topics: Arc<TopicService>,
    pub ingestion: Arc<IngestionService>,
    pub facebook: FacebookConfig,
    pub debug: bool,
}

/// Build webhook routes
pub fn routes(state: WebhooksApiState) -> Router<()> {
    Router::new()
        .route("/facebook", get(facebook_verify).post(facebook_webhook))
        .route("/website", post(website_webhook))
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
        .with_state(state)
}

/// Facebook subscription handshake query
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Facebook webhook subscription handshake
///
/// Echoes the challenge when the verify token matches; anything else is 403.
#[utoipa::path(
    get,
    path = "/webhooks/facebook",
    tag = "webhooks",
    params(
        ("hub.mode" = Option<String>, Query, description = "Must be 'subscribe'"),
        ("hub.verify_token" = Option<String>, Query, description = "Configured verify token"),
        ("hub.challenge" = Option<String>, Query, description = "Challenge to echo back")
    ),
    responses(
        (status = 200, description = "Challenge echoed"),
        (status = 403, description = "Verification failed")
    )
)]
pub async fn facebook_verify(
    State(state): State<WebhooksApiState>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    let expected = state.facebook.verify_token.as_deref();

    let verified = query.mode.as_deref() == Some("subscribe")
        && match (expected, query.verify_token.as_deref()) {
            (Some(expected), Some(presented)) => constant_time_eq(expected, presented),
            _ => false,
        };

    if verified {
        tracing::info!("Facebook webhook subscription verified");
        (StatusCode::OK, query.challenge.unwrap_or_default())
    } else {
        tracing::warn!(mode = ?query.mode, "Facebook webhook verification failed");
        (StatusCode::FORBIDDEN, String::new())
    }
}

/// Facebook leadgen webhook
///
/// Verifies the `x-hub-signature-256` HMAC over the raw body before any
/// parsing, publishes one stream event per leadgen change, and acknowledges.
#[utoipa::path(
    post,
    path = "/webhooks/facebook",
    tag = "webhooks",
    request_body = String,
    responses(
        (status = 200, description = "Events accepted"),
        (status = 400, description = "Unparseable payload"),
        (status = 403, description = "Signature verification failed")
    )
)]
pub async fn facebook_webhook(
    State(state): State<WebhooksApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let Some(app_secret) = state.facebook.app_secret.as_deref() else {
        tracing::warn!("Facebook webhook hit without configured app secret");
        return Err(ApiError::forbidden(
            "SIGNATURE_INVALID",
            "Webhook signature verification failed",
        ));
    };

    let signature = headers
        .get(HEADER_HUB_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(app_secret, &body, signature) {
        tracing::warn!("Facebook webhook signature mismatch");
        return Err(ApiError::forbidden(
            "SIGNATURE_INVALID",
            "Webhook signature verification failed",
        ));
    }

    if state.debug {
        tracing::debug!(body = %String::from_utf8_lossy(&body), "Facebook webhook payload");
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request("INVALID_PAYLOAD", format!("Invalid payload: {e}")))?;

    // Lead Ads subscriptions are page-scoped; anything else is not for us
    if payload.object != "page" {
        tracing::warn!(object = %payload.object, "Unexpected webhook object");
        return Err(ApiError::not_found(
            "UNSUPPORTED_OBJECT",
            format!("unsupported webhook object: {}", payload.object),
        ));
    }

    let topic = state.topics.stream_topic::<LeadEvent>(TOPIC_LEAD_EVENTS);
    let mut published = 0usize;
    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "leadgen" {
                tracing::debug!(field = %change.field, "Skipping non-leadgen change");
                continue;
            }
            if let Err(e) = topic.publish(&change.value).await {
                // Already authenticated; better to lose one event than bounce
                // the whole batch back to Facebook for endless redelivery
                tracing::error!(
                    leadgen_id = %change.value.leadgen_id,
                    error = %e,
                    "Failed to publish lead event"
                );
                continue;
            }
            published += 1;
        }
    }

    tracing::info!(published, "Facebook webhook acknowledged");
    Ok((StatusCode::OK, "EVENT_RECEIVED"))
}

/// Website form webhook
///
/// Authenticated by the per-tenant `x-webhook-key` header. Stores the lead
/// synchronously and returns its id.
#[utoipa::path(
    post,
    path = "/webhooks/website",
    tag = "webhooks",
    request_body = String,
    responses(
        (status = 200, description = "Lead stored"),
        (status = 400, description = "Invalid submission"),
        (status = 403, description = "Unknown webhook key")
    )
)]
pub async fn website_webhook(
    State(state): State<WebhooksApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let key = headers
        .get(HEADER_WEBHOOK_KEY)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::forbidden("WEBHOOK_KEY_INVALID", "Unknown webhook key"))?;

    let tenant = tenants::find_by_webhook_key(state.database.pool(), key)
        .await
        .map_err(ApiError::from_sqlite)?
        // Indexed lookup first, constant-time re-compare second
        .filter(|t| constant_time_eq(&t.webhook_key, key))
        .ok_or_else(|| ApiError::forbidden("WEBHOOK_KEY_INVALID", "Unknown webhook key"))?;

    if state.debug {
        tracing::debug!(
            tenant_id = %tenant.id,
            body = %String::from_utf8_lossy(&body),
            "Website webhook payload"
        );
    }

    let payload: WebsiteLeadPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request("INVALID_PAYLOAD", format!("Invalid payload: {e}")))?;

    let lead = state.ingestion.ingest_website_lead(&tenant, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "lead_id": lead.id
        })),
    ))
}
