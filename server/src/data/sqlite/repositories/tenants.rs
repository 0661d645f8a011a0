//! Tenant repository
//!
//! Tenants are the isolation boundary: every other table carries a
//! `tenant_id` and every query is scoped by it. Webhook traffic is routed
//! to a tenant either by Facebook page id or by the website webhook key.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::core::constants::WEBHOOK_KEY_BYTES;
use crate::data::sqlite::SqliteError;
use crate::utils::crypto::generate_token;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRow {
    pub id: String,
    pub name: String,
    pub fb_page_id: Option<String>,
    pub webhook_key: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create a tenant with a generated CUID2 id and a fresh website webhook key
pub async fn create_tenant(
    pool: &SqlitePool,
    name: &str,
    fb_page_id: Option<&str>,
) -> Result<TenantRow, SqliteError> {
    let id = cuid2::create_id();
    let webhook_key = generate_token(WEBHOOK_KEY_BYTES);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO tenants (id, name, fb_page_id, webhook_key, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(fb_page_id)
    .bind(&webhook_key)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(TenantRow {
        id,
        name: name.to_string(),
        fb_page_id: fb_page_id.map(String::from),
        webhook_key,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_tenant(pool: &SqlitePool, id: &str) -> Result<Option<TenantRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, Option<String>, String, i64, i64)>(
        "SELECT id, name, fb_page_id, webhook_key, created_at, updated_at FROM tenants WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_row))
}

/// Resolve the tenant that owns a Facebook page (webhook routing)
pub async fn find_by_fb_page(
    pool: &SqlitePool,
    page_id: &str,
) -> Result<Option<TenantRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, Option<String>, String, i64, i64)>(
        "SELECT id, name, fb_page_id, webhook_key, created_at, updated_at FROM tenants WHERE fb_page_id = ?",
    )
    .bind(page_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_row))
}

/// Resolve a tenant by website webhook key
///
/// Callers must still compare the presented key against the stored one in
/// constant time before trusting the match.
pub async fn find_by_webhook_key(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<TenantRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, Option<String>, String, i64, i64)>(
        "SELECT id, name, fb_page_id, webhook_key, created_at, updated_at FROM tenants WHERE webhook_key = ?",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_row))
}

fn into_row(
    (id, name, fb_page_id, webhook_key, created_at, updated_at): (
        String,
        String,
        Option<String>,
        String,
        i64,
        i64,
    ),
) -> TenantRow {
    TenantRow {
        id,
        name,
        fb_page_id,
        webhook_key,
        created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::setup_test_pool;

    #[tokio::test]
    async fn test_create_and_get_tenant() {
        let pool = setup_test_pool().await;
        let tenant = create_tenant(&pool, "Acme Realty", Some("page_42"))
            .await
            .unwrap();

        let fetched = get_tenant(&pool, &tenant.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Acme Realty");
        assert_eq!(fetched.fb_page_id.as_deref(), Some("page_42"));
        assert!(!fetched.webhook_key.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_fb_page() {
        let pool = setup_test_pool().await;
        let tenant = create_tenant(&pool, "Acme", Some("page_7")).await.unwrap();

        let found = find_by_fb_page(&pool, "page_7").await.unwrap().unwrap();
        assert_eq!(found.id, tenant.id);

        assert!(find_by_fb_page(&pool, "page_unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_webhook_key() {
        let pool = setup_test_pool().await;
        let tenant = create_tenant(&pool, "Acme", None).await.unwrap();

        let found = find_by_webhook_key(&pool, &tenant.webhook_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, tenant.id);

        assert!(
            find_by_webhook_key(&pool, "not-a-key")
                .await
                .unwrap()
                .is_none()
        );
    }
}
