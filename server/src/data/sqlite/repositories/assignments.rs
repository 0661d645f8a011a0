//! Assignment repository
//!
//! The append-only `assignment_events` log is the source of truth; the
//! single-row `lead_assignments` snapshot and the denormalized columns on
//! `lead_data` exist for cheap reads. All three are written in one
//! transaction.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: String,
    pub tenant_id: String,
    pub lead_id: String,
    pub assigned_user_id: Option<String>,
    pub assigned_by_user_id: Option<String>,
    pub previous_user_id: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: i64,
}

/// Per-user lead counts for workload reporting and bulk-assignment seeding
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadRow {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub total_leads: i64,
    pub active_leads: i64,
    pub closed_leads: i64,
}

/// Assign, reassign or unassign (`user_id = None`) a lead
///
/// One transaction: capture the previous assignee, upsert the snapshot,
/// append the event, update the denormalized columns.
pub async fn assign_lead(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
    user_id: Option<&str>,
    assigned_by: Option<&str>,
    reason: Option<&str>,
    notes: Option<&str>,
) -> Result<AssignmentRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT assigned_user_id FROM lead_data WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(lead_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((previous_user_id,)) = previous else {
        return Err(sqlx::Error::RowNotFound.into());
    };

    sqlx::query(
        "INSERT INTO lead_assignments (id, tenant_id, lead_id, assigned_user_id, assigned_by_user_id, previous_user_id, reason, notes, assigned_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (lead_id) DO UPDATE SET
             assigned_user_id = excluded.assigned_user_id,
             assigned_by_user_id = excluded.assigned_by_user_id,
             previous_user_id = excluded.previous_user_id,
             reason = excluded.reason,
             notes = excluded.notes,
             assigned_at = excluded.assigned_at",
    )
    .bind(cuid2::create_id())
    .bind(tenant_id)
    .bind(lead_id)
    .bind(user_id)
    .bind(assigned_by)
    .bind(&previous_user_id)
    .bind(reason)
    .bind(notes)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let event_id = cuid2::create_id();
    sqlx::query(
        "INSERT INTO assignment_events (id, tenant_id, lead_id, assigned_user_id, assigned_by_user_id, previous_user_id, reason, notes, assigned_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event_id)
    .bind(tenant_id)
    .bind(lead_id)
    .bind(user_id)
    .bind(assigned_by)
    .bind(&previous_user_id)
    .bind(reason)
    .bind(notes)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE lead_data SET assigned_user_id = ?, assigned_at = ?, updated_at = ? WHERE id = ?")
        .bind(user_id)
        .bind(user_id.map(|_| now))
        .bind(now)
        .bind(lead_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let row = sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignment_events WHERE id = ?")
        .bind(&event_id)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Current assignment snapshot for a lead
pub async fn get_assignment(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
) -> Result<Option<AssignmentRow>, SqliteError> {
    let row = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM lead_assignments WHERE tenant_id = ? AND lead_id = ?",
    )
    .bind(tenant_id)
    .bind(lead_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Full assignment history of a lead from the event log, newest first
pub async fn assignment_history(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
) -> Result<Vec<AssignmentRow>, SqliteError> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM assignment_events WHERE tenant_id = ? AND lead_id = ?
         ORDER BY assigned_at DESC, id DESC",
    )
    .bind(tenant_id)
    .bind(lead_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Entity-wide snapshot listing, most recently assigned first
pub async fn list_assignments(
    pool: &SqlitePool,
    tenant_id: &str,
    page: u32,
    limit: u32,
) -> Result<(Vec<AssignmentRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM lead_assignments WHERE tenant_id = ?
         ORDER BY assigned_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lead_assignments WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

    Ok((rows, total.0 as u64))
}

/// Per-active-user counts of total / active / closed assigned leads
///
/// Ordered oldest user first to match the bulk-assignment tie-break order.
pub async fn workload_distribution(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<Vec<WorkloadRow>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, i64, i64, i64)>(
        "SELECT u.id, u.email, u.first_name, u.last_name,
                COUNT(l.id),
                COALESCE(SUM(CASE WHEN ls.is_terminal = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN ls.is_terminal = 1 THEN 1 ELSE 0 END), 0)
         FROM users u
         LEFT JOIN lead_data l ON l.assigned_user_id = u.id AND l.tenant_id = u.tenant_id
         LEFT JOIN lead_statuses ls ON ls.name = l.status
         WHERE u.tenant_id = ? AND u.is_active = 1
         GROUP BY u.id, u.email, u.first_name, u.last_name
         ORDER BY u.created_at ASC, u.id ASC",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(user_id, email, first_name, last_name, total_leads, active_leads, closed_leads)| {
                WorkloadRow {
                    user_id,
                    email,
                    first_name,
                    last_name,
                    total_leads,
                    active_leads,
                    closed_leads,
                }
            },
        )
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{
        seed_lead, seed_tenant, seed_user, setup_test_pool,
    };

    #[tokio::test]
    async fn test_assign_then_reassign_tracks_previous() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let u1 = seed_user(&pool, &tenant.id, "a@acme.test").await;
        let u2 = seed_user(&pool, &tenant.id, "b@acme.test").await;

        let first = assign_lead(&pool, &tenant.id, &lead.id, Some(&u1.id), None, Some("manual"), None)
            .await
            .unwrap();
        assert_eq!(first.assigned_user_id.as_deref(), Some(u1.id.as_str()));
        assert_eq!(first.previous_user_id, None);

        let second = assign_lead(&pool, &tenant.id, &lead.id, Some(&u2.id), None, Some("manual"), None)
            .await
            .unwrap();
        assert_eq!(second.assigned_user_id.as_deref(), Some(u2.id.as_str()));
        assert_eq!(second.previous_user_id.as_deref(), Some(u1.id.as_str()));

        // One snapshot, two events
        let snapshots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lead_assignments")
            .fetch_one(&pool)
            .await
            .unwrap();
        let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assignment_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((snapshots, events), (1, 2));

        let denorm: Option<String> =
            sqlx::query_scalar("SELECT assigned_user_id FROM lead_data WHERE id = ?")
                .bind(&lead.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(denorm.as_deref(), Some(u2.id.as_str()));
    }

    #[tokio::test]
    async fn test_unassign_clears_denormalized_columns() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let user = seed_user(&pool, &tenant.id, "a@acme.test").await;

        assign_lead(&pool, &tenant.id, &lead.id, Some(&user.id), None, None, None)
            .await
            .unwrap();
        let event = assign_lead(&pool, &tenant.id, &lead.id, None, None, Some("left team"), None)
            .await
            .unwrap();
        assert_eq!(event.assigned_user_id, None);
        assert_eq!(event.previous_user_id.as_deref(), Some(user.id.as_str()));

        let (denorm, at): (Option<String>, Option<i64>) =
            sqlx::query_as("SELECT assigned_user_id, assigned_at FROM lead_data WHERE id = ?")
                .bind(&lead.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(denorm, None);
        assert_eq!(at, None);
    }

    #[tokio::test]
    async fn test_assign_missing_lead_errors() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;

        let err = assign_lead(&pool, &tenant.id, "nope", None, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SqliteError::Database(sqlx::Error::RowNotFound)
        ));
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let u1 = seed_user(&pool, &tenant.id, "a@acme.test").await;
        let u2 = seed_user(&pool, &tenant.id, "b@acme.test").await;

        assign_lead(&pool, &tenant.id, &lead.id, Some(&u1.id), None, None, None)
            .await
            .unwrap();
        assign_lead(&pool, &tenant.id, &lead.id, Some(&u2.id), None, None, None)
            .await
            .unwrap();

        let history = assignment_history(&pool, &tenant.id, &lead.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].assigned_user_id.as_deref(), Some(u2.id.as_str()));
    }

    #[tokio::test]
    async fn test_workload_distribution_counts() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let u1 = seed_user(&pool, &tenant.id, "a@acme.test").await;
        let u2 = seed_user(&pool, &tenant.id, "b@acme.test").await;

        let active = seed_lead(&pool, &tenant.id, "w_1").await;
        let closed = seed_lead(&pool, &tenant.id, "w_2").await;
        assign_lead(&pool, &tenant.id, &active.id, Some(&u1.id), None, None, None)
            .await
            .unwrap();
        assign_lead(&pool, &tenant.id, &closed.id, Some(&u1.id), None, None, None)
            .await
            .unwrap();
        sqlx::query("UPDATE lead_data SET status = 'won' WHERE id = ?")
            .bind(&closed.id)
            .execute(&pool)
            .await
            .unwrap();

        let workload = workload_distribution(&pool, &tenant.id).await.unwrap();
        assert_eq!(workload.len(), 2);
        let w1 = workload.iter().find(|w| w.user_id == u1.id).unwrap();
        assert_eq!((w1.total_leads, w1.active_leads, w1.closed_leads), (2, 1, 1));
        let w2 = workload.iter().find(|w| w.user_id == u2.id).unwrap();
        assert_eq!((w2.total_leads, w2.active_leads, w2.closed_leads), (0, 0, 0));
    }
}
