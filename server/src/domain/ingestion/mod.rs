//! Lead ingestion
//!
//! Two intake paths converge here. Facebook leads arrive as stream events
//! published by the webhook handler; [`IngestionService::process_lead_event`]
//! resolves the tenant, fetches full details from the Graph API and stores
//! the normalized lead. Website leads carry their answers inline and are
//! stored synchronously by [`IngestionService::ingest_website_lead`].
//!
//! Every Facebook event leaves a `lead_meta` row behind, whatever happens:
//! `received` on arrival, `processed` on success, `failed` with the error
//! text otherwise. Re-delivery upserts in place.

pub mod consumer;
pub mod facebook;
pub mod normalize;

use std::sync::Arc;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::constants::{PLATFORM_FACEBOOK, PLATFORM_WEBSITE};
use crate::data::SqliteService;
use crate::data::sqlite::repositories::{LeadRow, NewLeadMeta, TenantRow, leads, tenants};
use crate::domain::error::DomainError;
use crate::utils::time::parse_flexible_timestamp;

pub use facebook::{GraphClient, LeadEvent, WebhookPayload, verify_signature};
use facebook::facebook_fields;
use normalize::{SourcePlatform, normalize_contact, website_fields};

/// Website form submission body
#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteLeadPayload {
    pub platform: String,
    /// Form answers as flat field -> value pairs
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
}

pub struct IngestionService {
    db: Arc<SqliteService>,
    /// Absent when the Facebook credentials are not configured
    graph: Option<GraphClient>,
}

impl IngestionService {
    pub fn new(db: Arc<SqliteService>, graph: Option<GraphClient>) -> Self {
        Self { db, graph }
    }

    /// Process one Facebook leadgen event from the stream
    ///
    /// An unmapped page is logged and dropped; any failure after the
    /// metadata row exists is recorded on it before the error propagates.
    pub async fn process_lead_event(&self, event: &LeadEvent) -> Result<(), DomainError> {
        let pool = self.db.pool();

        let Some(tenant) = tenants::find_by_fb_page(pool, &event.page_id).await? else {
            tracing::warn!(
                page_id = %event.page_id,
                leadgen_id = %event.leadgen_id,
                "Leadgen event for unmapped page, skipping"
            );
            return Ok(());
        };

        let meta = leads::upsert_meta_received(
            pool,
            &tenant.id,
            &NewLeadMeta {
                platform: PLATFORM_FACEBOOK.to_string(),
                external_id: event.leadgen_id.clone(),
                page_id: Some(event.page_id.clone()),
                form_id: event.form_id.clone(),
                ad_id: event.ad_id.clone(),
                source_created_at: event.created_time,
                ..Default::default()
            },
        )
        .await?;

        match self.fetch_and_store(&tenant, event, &meta.id).await {
            Ok(lead) => {
                tracing::info!(
                    tenant_id = %tenant.id,
                    lead_id = %lead.id,
                    leadgen_id = %event.leadgen_id,
                    "Facebook lead ingested"
                );
                Ok(())
            }
            Err(e) => {
                leads::mark_meta_failed(pool, &meta.id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn fetch_and_store(
        &self,
        tenant: &TenantRow,
        event: &LeadEvent,
        meta_id: &str,
    ) -> Result<LeadRow, DomainError> {
        let graph = self.graph.as_ref().ok_or_else(|| {
            DomainError::Internal("Facebook credentials are not configured".to_string())
        })?;

        // Outside any transaction: the fetch can take seconds
        let (detail, raw_body) = graph.fetch_lead(&event.leadgen_id).await?;

        // Enrich the metadata with what only the Graph API knows
        let pool = self.db.pool();
        leads::upsert_meta_received(
            pool,
            &tenant.id,
            &NewLeadMeta {
                platform: PLATFORM_FACEBOOK.to_string(),
                external_id: event.leadgen_id.clone(),
                page_id: Some(event.page_id.clone()),
                form_id: detail.form_id.clone().or_else(|| event.form_id.clone()),
                ad_id: detail.ad_id.clone().or_else(|| event.ad_id.clone()),
                adset_id: detail.adset_id.clone(),
                campaign_id: detail.campaign_id.clone(),
                source_created_at: detail
                    .created_time
                    .as_deref()
                    .and_then(parse_flexible_timestamp)
                    .or(event.created_time),
                ..Default::default()
            },
        )
        .await?;

        self.store_fetched_lead(tenant, meta_id, &detail, raw_body)
            .await
    }

    /// Normalize a fetched lead and store it
    ///
    /// Like website submissions, Facebook leads must carry at least an
    /// email or a phone number; anything else is a validation failure and
    /// the caller marks the metadata row failed.
    async fn store_fetched_lead(
        &self,
        tenant: &TenantRow,
        meta_id: &str,
        detail: &facebook::GraphLead,
        raw_body: String,
    ) -> Result<LeadRow, DomainError> {
        let data = normalize_contact(
            SourcePlatform::Facebook,
            &facebook_fields(&detail.field_data),
            raw_body,
        );
        if data.email.is_none() && data.phone.is_none() {
            return Err(DomainError::validation(
                "lead fields must include an email or a phone number",
            ));
        }

        let pool = self.db.pool();
        let (lead, _created) = leads::store_lead(pool, &tenant.id, meta_id, &data).await?;
        Ok(lead)
    }

    /// Store a website form submission for an authenticated tenant
    ///
    /// Synchronous: the caller gets the stored lead back. The submission
    /// must identify itself as the website platform and carry at least an
    /// email or a phone number.
    pub async fn ingest_website_lead(
        &self,
        tenant: &TenantRow,
        payload: &WebsiteLeadPayload,
    ) -> Result<LeadRow, DomainError> {
        if payload.platform != PLATFORM_WEBSITE {
            return Err(DomainError::validation(format!(
                "unsupported platform: {}",
                payload.platform
            )));
        }

        let raw_payload = serde_json::to_string(&payload.answers)
            .map_err(|e| DomainError::Internal(format!("failed to serialize answers: {e}")))?;
        let data = normalize_contact(
            SourcePlatform::Website,
            &website_fields(&payload.answers),
            raw_payload,
        );
        if data.email.is_none() && data.phone.is_none() {
            return Err(DomainError::validation(
                "answers must include an email or a phone number",
            ));
        }

        let pool = self.db.pool();
        let meta = leads::upsert_meta_received(
            pool,
            &tenant.id,
            &NewLeadMeta {
                platform: PLATFORM_WEBSITE.to_string(),
                external_id: website_external_id(),
                page_url: payload.page_url.clone(),
                utm_source: payload.utm_source.clone(),
                utm_medium: payload.utm_medium.clone(),
                utm_campaign: payload.utm_campaign.clone(),
                utm_term: payload.utm_term.clone(),
                utm_content: payload.utm_content.clone(),
                ..Default::default()
            },
        )
        .await?;

        let (lead, _created) = leads::store_lead(pool, &tenant.id, &meta.id, &data).await?;
        tracing::info!(
            tenant_id = %tenant.id,
            lead_id = %lead.id,
            "Website lead ingested"
        );
        Ok(lead)
    }
}

/// Synthesized external id for website submissions, unique per arrival
fn website_external_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!(
        "website_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{seed_tenant, setup_test_pool};
    use sqlx::SqlitePool;

    fn payload(json: &str) -> WebsiteLeadPayload {
        serde_json::from_str(json).unwrap()
    }

    async fn service() -> (IngestionService, SqlitePool, TenantRow) {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let db = Arc::new(SqliteService::from_pool(pool.clone()));
        (IngestionService::new(db, None), pool, tenant)
    }

    #[tokio::test]
    async fn test_website_lead_stored_and_normalized() {
        let (service, pool, tenant) = service().await;

        let lead = service
            .ingest_website_lead(
                &tenant,
                &payload(
                    r#"{
                        "platform": "website",
                        "answers": {"e-mail": "jane@home.test", "fullname": "Jane Q Public"},
                        "utm_source": "newsletter"
                    }"#,
                ),
            )
            .await
            .unwrap();

        assert_eq!(lead.email.as_deref(), Some("jane@home.test"));
        assert_eq!(lead.first_name.as_deref(), Some("Jane"));
        assert_eq!(lead.last_name.as_deref(), Some("Q Public"));
        assert_eq!(lead.status, "new");

        let meta = leads::get_meta(&pool, &tenant.id, &lead.meta_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.platform, "website");
        assert_eq!(meta.processing_status, "processed");
        assert_eq!(meta.utm_source.as_deref(), Some("newsletter"));
        assert!(meta.external_id.starts_with("website_"));
    }

    #[tokio::test]
    async fn test_website_lead_requires_contact_info() {
        let (service, _pool, tenant) = service().await;

        let err = service
            .ingest_website_lead(
                &tenant,
                &payload(r#"{"platform": "website", "answers": {"fullname": "Jane"}}"#),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_website_lead_rejects_other_platforms() {
        let (service, _pool, tenant) = service().await;

        let err = service
            .ingest_website_lead(
                &tenant,
                &payload(r#"{"platform": "facebook", "answers": {"email": "a@b.c"}}"#),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unmapped_page_is_skipped_without_rows() {
        let (service, pool, tenant) = service().await;

        let event = LeadEvent {
            leadgen_id: "lg_1".to_string(),
            page_id: "some_other_page".to_string(),
            form_id: None,
            ad_id: None,
            created_time: None,
        };
        service.process_lead_event(&event).await.unwrap();

        let lead = leads::get_lead_by_external(&pool, &tenant.id, "facebook", "lg_1")
            .await
            .unwrap();
        assert!(lead.is_none());
    }

    #[tokio::test]
    async fn test_facebook_lead_requires_contact_info() {
        let (service, pool, tenant) = service().await;

        let meta = leads::upsert_meta_received(
            &pool,
            &tenant.id,
            &NewLeadMeta {
                platform: PLATFORM_FACEBOOK.to_string(),
                external_id: "lg_1".to_string(),
                page_id: Some("page_1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let raw = r#"{"id": "lg_1", "field_data": [{"name": "full_name", "values": ["Jane"]}]}"#;
        let detail: facebook::GraphLead = serde_json::from_str(raw).unwrap();

        let err = service
            .store_fetched_lead(&tenant, &meta.id, &detail, raw.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let lead = leads::get_lead_by_external(&pool, &tenant.id, "facebook", "lg_1")
            .await
            .unwrap();
        assert!(lead.is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_marks_meta_failed() {
        let (service, pool, tenant) = service().await;

        let event = LeadEvent {
            leadgen_id: "lg_1".to_string(),
            page_id: "page_1".to_string(),
            form_id: Some("form_1".to_string()),
            ad_id: None,
            created_time: Some(1_700_000_000),
        };
        let err = service.process_lead_event(&event).await.unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));

        let meta = leads::get_meta_by_external(&pool, &tenant.id, "facebook", "lg_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.processing_status, "failed");
        assert!(meta.processing_error.is_some());
        assert_eq!(meta.page_id.as_deref(), Some("page_1"));
    }
}
