//! SQLite repositories
//!
//! Free functions over `&SqlitePool`. Row structs live next to the functions
//! that produce them and are re-exported here for convenient access.

pub mod activities;
pub mod assignments;
pub mod leads;
pub mod stages;
pub mod tenants;
pub mod users;

pub use activities::{ActivityFilter, ActivityRow, ActivityStats, NewActivity};
pub use assignments::{AssignmentRow, WorkloadRow};
pub use leads::{LeadFilter, LeadMetaRow, LeadRow, NewLeadData, NewLeadMeta};
pub use stages::{StageFilter, StageRow, StageSummaryRow};
pub use tenants::TenantRow;
pub use users::UserRow;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::data::sqlite::migrations::run_migrations;

    /// In-memory pool with the full schema applied.
    ///
    /// A single connection keeps every query on the same in-memory database.
    pub async fn setup_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    pub async fn seed_tenant(pool: &SqlitePool) -> super::TenantRow {
        super::tenants::create_tenant(pool, "Acme Realty", Some("page_1"))
            .await
            .unwrap()
    }

    pub async fn seed_user(pool: &SqlitePool, tenant_id: &str, email: &str) -> super::UserRow {
        let (user, _token) =
            super::users::create_user(pool, tenant_id, email, "Test", "User", "member")
                .await
                .unwrap();
        user
    }

    /// Backdate a user's creation time
    ///
    /// Seeds created in the same second would otherwise tie and leave the
    /// oldest-first ordering to the random id tie-break.
    pub async fn set_user_created_at(pool: &SqlitePool, user_id: &str, created_at: i64) {
        sqlx::query("UPDATE users SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
    }

    /// Backdate a lead's creation time
    ///
    /// Same rationale as [`set_user_created_at`]: same-second seeds would
    /// leave the oldest-first ordering to the random id tie-break.
    pub async fn set_lead_created_at(pool: &SqlitePool, lead_id: &str, created_at: i64) {
        sqlx::query("UPDATE lead_data SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(lead_id)
            .execute(pool)
            .await
            .unwrap();
    }

    /// Insert a minimal website lead and return its row.
    pub async fn seed_lead(pool: &SqlitePool, tenant_id: &str, external_id: &str) -> super::LeadRow {
        let meta = super::leads::upsert_meta_received(
            pool,
            tenant_id,
            &super::NewLeadMeta {
                platform: "website".to_string(),
                external_id: external_id.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let (lead, _created) = super::leads::store_lead(
            pool,
            tenant_id,
            &meta.id,
            &super::NewLeadData {
                email: Some(format!("{external_id}@example.com")),
                first_name: Some("Test".to_string()),
                last_name: Some("Lead".to_string()),
                full_name: Some("Test Lead".to_string()),
                raw_payload: "{}".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        lead
    }
}
