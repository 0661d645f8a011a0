//! Lead repository: ingestion metadata and canonical lead records
//!
//! `lead_meta` tracks where a lead came from and how its processing went;
//! `lead_data` is the 1:1 canonical contact record. The upsert pair is keyed
//! on `(tenant_id, platform, external_id)` so webhook re-delivery updates in
//! place instead of duplicating.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::core::constants::{PROCESSING_FAILED, PROCESSING_PROCESSED, STATUS_NEW};
use crate::data::sqlite::SqliteError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeadMetaRow {
    pub id: String,
    pub tenant_id: String,
    pub platform: String,
    pub external_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,
    pub adset_id: Option<String>,
    pub campaign_id: Option<String>,
    pub page_url: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub source_created_at: Option<i64>,
    pub processing_status: String,
    pub processing_error: Option<String>,
    pub received_at: i64,
    pub updated_at: i64,
}

/// Payload-derived metadata for an upsert
#[derive(Debug, Clone, Default)]
pub struct NewLeadMeta {
    pub platform: String,
    pub external_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,
    pub adset_id: Option<String>,
    pub campaign_id: Option<String>,
    pub page_url: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub source_created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeadRow {
    pub id: String,
    pub tenant_id: String,
    pub meta_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub message: Option<String>,
    pub raw_payload: String,
    pub consent_at: Option<i64>,
    pub status: String,
    pub assigned_user_id: Option<String>,
    pub assigned_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Normalized contact fields for an upsert
#[derive(Debug, Clone, Default)]
pub struct NewLeadData {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub message: Option<String>,
    pub raw_payload: String,
    pub consent_at: Option<i64>,
}

/// Listing filters; `page` is 1-based
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub assigned_user_id: Option<String>,
    pub unassigned_only: bool,
    pub platform: Option<String>,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

/// Upsert ingestion metadata in `received` state
///
/// Re-delivery refreshes payload-derived fields and `updated_at` but never
/// touches `processing_status` or `received_at`.
pub async fn upsert_meta_received(
    pool: &SqlitePool,
    tenant_id: &str,
    meta: &NewLeadMeta,
) -> Result<LeadMetaRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO lead_meta (id, tenant_id, platform, external_id, page_id, form_id, ad_id, adset_id, campaign_id,
                                page_url, utm_source, utm_medium, utm_campaign, utm_term, utm_content,
                                source_created_at, processing_status, received_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'received', ?, ?)
         ON CONFLICT (tenant_id, platform, external_id) DO UPDATE SET
             page_id = excluded.page_id,
             form_id = excluded.form_id,
             ad_id = excluded.ad_id,
             adset_id = excluded.adset_id,
             campaign_id = excluded.campaign_id,
             page_url = excluded.page_url,
             utm_source = excluded.utm_source,
             utm_medium = excluded.utm_medium,
             utm_campaign = excluded.utm_campaign,
             utm_term = excluded.utm_term,
             utm_content = excluded.utm_content,
             source_created_at = excluded.source_created_at,
             updated_at = excluded.updated_at",
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(&meta.platform)
    .bind(&meta.external_id)
    .bind(&meta.page_id)
    .bind(&meta.form_id)
    .bind(&meta.ad_id)
    .bind(&meta.adset_id)
    .bind(&meta.campaign_id)
    .bind(&meta.page_url)
    .bind(&meta.utm_source)
    .bind(&meta.utm_medium)
    .bind(&meta.utm_campaign)
    .bind(&meta.utm_term)
    .bind(&meta.utm_content)
    .bind(meta.source_created_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    // The insert id loses on conflict; read back the surviving row
    let row = sqlx::query_as::<_, LeadMetaRow>(
        "SELECT * FROM lead_meta WHERE tenant_id = ? AND platform = ? AND external_id = ?",
    )
    .bind(tenant_id)
    .bind(&meta.platform)
    .bind(&meta.external_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_meta(
    pool: &SqlitePool,
    tenant_id: &str,
    id: &str,
) -> Result<Option<LeadMetaRow>, SqliteError> {
    let row =
        sqlx::query_as::<_, LeadMetaRow>("SELECT * FROM lead_meta WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

pub async fn get_meta_by_external(
    pool: &SqlitePool,
    tenant_id: &str,
    platform: &str,
    external_id: &str,
) -> Result<Option<LeadMetaRow>, SqliteError> {
    let row = sqlx::query_as::<_, LeadMetaRow>(
        "SELECT * FROM lead_meta WHERE tenant_id = ? AND platform = ? AND external_id = ?",
    )
    .bind(tenant_id)
    .bind(platform)
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Record a processing failure on the metadata row
pub async fn mark_meta_failed(
    pool: &SqlitePool,
    meta_id: &str,
    error: &str,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "UPDATE lead_meta SET processing_status = ?, processing_error = ?, updated_at = ? WHERE id = ?",
    )
    .bind(PROCESSING_FAILED)
    .bind(error)
    .bind(now)
    .bind(meta_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store normalized lead data for a metadata row
///
/// One transaction: upsert `lead_data` keyed on `meta_id`, open the initial
/// `new` stage when the lead is first created, and flip the metadata to
/// `processed`. Pipeline status and assignment survive re-delivery untouched.
/// Returns the row and whether it was newly created.
pub async fn store_lead(
    pool: &SqlitePool,
    tenant_id: &str,
    meta_id: &str,
    data: &NewLeadData,
) -> Result<(LeadRow, bool), SqliteError> {
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM lead_data WHERE tenant_id = ? AND meta_id = ?")
            .bind(tenant_id)
            .bind(meta_id)
            .fetch_optional(&mut *tx)
            .await?;

    let (lead_id, created) = match existing {
        Some((id,)) => {
            sqlx::query(
                "UPDATE lead_data SET email = ?, phone = ?, first_name = ?, last_name = ?, full_name = ?,
                        company = ?, job_title = ?, city = ?, state = ?, country = ?, zip_code = ?,
                        message = ?, raw_payload = ?, consent_at = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.full_name)
            .bind(&data.company)
            .bind(&data.job_title)
            .bind(&data.city)
            .bind(&data.state)
            .bind(&data.country)
            .bind(&data.zip_code)
            .bind(&data.message)
            .bind(&data.raw_payload)
            .bind(data.consent_at)
            .bind(now)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
            (id, false)
        }
        None => {
            let id = cuid2::create_id();
            sqlx::query(
                "INSERT INTO lead_data (id, tenant_id, meta_id, email, phone, first_name, last_name, full_name,
                                        company, job_title, city, state, country, zip_code, message,
                                        raw_payload, consent_at, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(tenant_id)
            .bind(meta_id)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.full_name)
            .bind(&data.company)
            .bind(&data.job_title)
            .bind(&data.city)
            .bind(&data.state)
            .bind(&data.country)
            .bind(&data.zip_code)
            .bind(&data.message)
            .bind(&data.raw_payload)
            .bind(data.consent_at)
            .bind(STATUS_NEW)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // Every lead is born with an open 'new' stage
            sqlx::query(
                "INSERT INTO lead_stages (id, tenant_id, lead_id, status, seq, entered_at) VALUES (?, ?, ?, ?, 1, ?)",
            )
            .bind(cuid2::create_id())
            .bind(tenant_id)
            .bind(&id)
            .bind(STATUS_NEW)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            (id, true)
        }
    };

    sqlx::query(
        "UPDATE lead_meta SET processing_status = ?, processing_error = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(PROCESSING_PROCESSED)
    .bind(now)
    .bind(meta_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row = sqlx::query_as::<_, LeadRow>("SELECT * FROM lead_data WHERE id = ?")
        .bind(&lead_id)
        .fetch_one(pool)
        .await?;

    Ok((row, created))
}

pub async fn get_lead(
    pool: &SqlitePool,
    tenant_id: &str,
    id: &str,
) -> Result<Option<LeadRow>, SqliteError> {
    let row =
        sqlx::query_as::<_, LeadRow>("SELECT * FROM lead_data WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

pub async fn get_lead_by_external(
    pool: &SqlitePool,
    tenant_id: &str,
    platform: &str,
    external_id: &str,
) -> Result<Option<LeadRow>, SqliteError> {
    let row = sqlx::query_as::<_, LeadRow>(
        "SELECT l.* FROM lead_data l
         JOIN lead_meta m ON m.id = l.meta_id
         WHERE l.tenant_id = ? AND m.platform = ? AND m.external_id = ?",
    )
    .bind(tenant_id)
    .bind(platform)
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

fn push_lead_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a LeadFilter) {
    if let Some(status) = &filter.status {
        qb.push(" AND l.status = ").push_bind(status);
    }
    if filter.unassigned_only {
        qb.push(" AND l.assigned_user_id IS NULL");
    } else if let Some(user_id) = &filter.assigned_user_id {
        qb.push(" AND l.assigned_user_id = ").push_bind(user_id);
    }
    if let Some(platform) = &filter.platform {
        qb.push(" AND EXISTS (SELECT 1 FROM lead_meta m WHERE m.id = l.meta_id AND m.platform = ")
            .push_bind(platform)
            .push(")");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        qb.push(" AND (l.full_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.email LIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.phone LIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.company LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Paginated listing with filters, newest first
pub async fn list_leads(
    pool: &SqlitePool,
    tenant_id: &str,
    filter: &LeadFilter,
) -> Result<(Vec<LeadRow>, u64), SqliteError> {
    let offset = (filter.page.saturating_sub(1)) * filter.limit;

    let mut qb = QueryBuilder::new("SELECT l.* FROM lead_data l WHERE l.tenant_id = ");
    qb.push_bind(tenant_id);
    push_lead_filters(&mut qb, filter);
    qb.push(" ORDER BY l.created_at DESC, l.id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build_query_as::<LeadRow>().fetch_all(pool).await?;

    let mut count_qb =
        QueryBuilder::new("SELECT COUNT(*) FROM lead_data l WHERE l.tenant_id = ");
    count_qb.push_bind(tenant_id);
    push_lead_filters(&mut count_qb, filter);

    let total: (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    Ok((rows, total.0 as u64))
}

/// Per-status lead counts for the tenant
pub async fn counts_by_status(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<Vec<(String, i64)>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT l.status, COUNT(*) FROM lead_data l
         JOIN lead_statuses s ON s.name = l.status
         WHERE l.tenant_id = ?
         GROUP BY l.status
         ORDER BY s.sort_order",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Unassigned leads, oldest first (FIFO order for bulk assignment)
pub async fn list_unassigned_oldest_first(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<Vec<LeadRow>, SqliteError> {
    let rows = sqlx::query_as::<_, LeadRow>(
        "SELECT * FROM lead_data WHERE tenant_id = ? AND assigned_user_id IS NULL
         ORDER BY created_at ASC, id ASC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{seed_lead, seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn test_ingestion_is_idempotent() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;

        let meta_spec = NewLeadMeta {
            platform: "facebook".to_string(),
            external_id: "fb_123".to_string(),
            page_id: Some("page_1".to_string()),
            form_id: Some("form_9".to_string()),
            ..Default::default()
        };

        let meta1 = upsert_meta_received(&pool, &tenant.id, &meta_spec).await.unwrap();
        let (lead1, created1) = store_lead(
            &pool,
            &tenant.id,
            &meta1.id,
            &NewLeadData {
                email: Some("jane@example.com".to_string()),
                full_name: Some("Jane Public".to_string()),
                raw_payload: "{}".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(created1);
        assert_eq!(lead1.status, "new");

        // Re-delivery of the same external id updates in place
        let meta2 = upsert_meta_received(&pool, &tenant.id, &meta_spec).await.unwrap();
        assert_eq!(meta2.id, meta1.id);

        let (lead2, created2) = store_lead(
            &pool,
            &tenant.id,
            &meta2.id,
            &NewLeadData {
                email: Some("jane+new@example.com".to_string()),
                full_name: Some("Jane Public".to_string()),
                raw_payload: "{}".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!created2);
        assert_eq!(lead2.id, lead1.id);
        assert_eq!(lead2.email.as_deref(), Some("jane+new@example.com"));

        let meta_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lead_meta")
            .fetch_one(&pool)
            .await
            .unwrap();
        let lead_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lead_data")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((meta_count, lead_count), (1, 1));
    }

    #[tokio::test]
    async fn test_redelivery_preserves_status_and_assignment() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;

        sqlx::query("UPDATE lead_data SET status = 'qualified', assigned_user_id = NULL WHERE id = ?")
            .bind(&lead.id)
            .execute(&pool)
            .await
            .unwrap();

        let (updated, created) = store_lead(
            &pool,
            &tenant.id,
            &lead.meta_id,
            &NewLeadData {
                email: Some("w_1@example.com".to_string()),
                raw_payload: "{}".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!created);
        assert_eq!(updated.status, "qualified");
    }

    #[tokio::test]
    async fn test_new_lead_opens_initial_stage() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_2").await;

        let (status, seq): (String, i64) = sqlx::query_as(
            "SELECT status, seq FROM lead_stages WHERE lead_id = ? AND exited_at IS NULL",
        )
        .bind(&lead.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "new");
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn test_mark_meta_failed() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;

        let meta = upsert_meta_received(
            &pool,
            &tenant.id,
            &NewLeadMeta {
                platform: "facebook".to_string(),
                external_id: "fb_broken".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(meta.processing_status, "received");

        mark_meta_failed(&pool, &meta.id, "graph fetch timed out").await.unwrap();

        let (status, error): (String, Option<String>) = sqlx::query_as(
            "SELECT processing_status, processing_error FROM lead_meta WHERE id = ?",
        )
        .bind(&meta.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "failed");
        assert_eq!(error.as_deref(), Some("graph fetch timed out"));
    }

    #[tokio::test]
    async fn test_list_leads_filters_and_search() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        seed_lead(&pool, &tenant.id, "w_a").await;
        let lead_b = seed_lead(&pool, &tenant.id, "w_b").await;

        sqlx::query("UPDATE lead_data SET status = 'qualified', company = 'Globex' WHERE id = ?")
            .bind(&lead_b.id)
            .execute(&pool)
            .await
            .unwrap();

        let (rows, total) = list_leads(
            &pool,
            &tenant.id,
            &LeadFilter {
                status: Some("qualified".to_string()),
                page: 1,
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, lead_b.id);

        let (rows, total) = list_leads(
            &pool,
            &tenant.id,
            &LeadFilter {
                search: Some("Globex".to_string()),
                page: 1,
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, lead_b.id);
    }

    #[tokio::test]
    async fn test_unassigned_listing_is_fifo() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let first = seed_lead(&pool, &tenant.id, "w_1").await;
        let second = seed_lead(&pool, &tenant.id, "w_2").await;

        // Force distinct created_at so ordering is deterministic
        sqlx::query("UPDATE lead_data SET created_at = created_at - 60 WHERE id = ?")
            .bind(&first.id)
            .execute(&pool)
            .await
            .unwrap();

        let unassigned = list_unassigned_oldest_first(&pool, &tenant.id).await.unwrap();
        let ids: Vec<_> = unassigned.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    }

    #[tokio::test]
    async fn test_cross_tenant_lookup_misses() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let other = crate::data::sqlite::repositories::tenants::create_tenant(&pool, "Other", None)
            .await
            .unwrap();
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;

        assert!(get_lead(&pool, &tenant.id, &lead.id).await.unwrap().is_some());
        assert!(get_lead(&pool, &other.id, &lead.id).await.unwrap().is_none());
    }
}
