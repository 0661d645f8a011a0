//! Activity repository
//!
//! Activities record calls, emails, meetings and notes against a lead, with
//! optional follow-up dates. Follow-up listings order by priority rank
//! (urgent > high > medium > low), then soonest follow-up first.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::data::sqlite::SqliteError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: String,
    pub tenant_id: String,
    pub lead_id: String,
    pub user_id: Option<String>,
    pub activity_type: String,
    pub description: String,
    pub follow_up_at: Option<i64>,
    pub priority: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewActivity {
    pub activity_type: String,
    pub description: String,
    pub follow_up_at: Option<i64>,
    pub priority: Option<String>,
}

/// Entity-wide listing filters; `page` is 1-based
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub user_id: Option<String>,
    pub created_from: Option<i64>,
    pub created_to: Option<i64>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityStats {
    pub by_type: Vec<(String, i64)>,
    pub by_status: Vec<(String, i64)>,
    pub pending_follow_ups: i64,
    pub overdue_follow_ups: i64,
}

const PRIORITY_RANK: &str =
    "CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END";

pub async fn log_activity(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
    user_id: Option<&str>,
    activity: &NewActivity,
) -> Result<ActivityRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();
    let priority = activity.priority.as_deref().unwrap_or("medium");

    sqlx::query(
        "INSERT INTO lead_activities (id, tenant_id, lead_id, user_id, activity_type, description, follow_up_at, priority, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(lead_id)
    .bind(user_id)
    .bind(&activity.activity_type)
    .bind(&activity.description)
    .bind(activity.follow_up_at)
    .bind(priority)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, ActivityRow>("SELECT * FROM lead_activities WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Set an activity's status; returns the updated row, or None if not found
pub async fn update_activity_status(
    pool: &SqlitePool,
    tenant_id: &str,
    id: &str,
    status: &str,
) -> Result<Option<ActivityRow>, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE lead_activities SET status = ?, updated_at = ? WHERE tenant_id = ? AND id = ?",
    )
    .bind(status)
    .bind(now)
    .bind(tenant_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    let row = sqlx::query_as::<_, ActivityRow>("SELECT * FROM lead_activities WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(Some(row))
}

/// Reschedule (or clear) an activity's follow-up date
pub async fn update_follow_up(
    pool: &SqlitePool,
    tenant_id: &str,
    id: &str,
    follow_up_at: Option<i64>,
) -> Result<Option<ActivityRow>, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE lead_activities SET follow_up_at = ?, updated_at = ? WHERE tenant_id = ? AND id = ?",
    )
    .bind(follow_up_at)
    .bind(now)
    .bind(tenant_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    let row = sqlx::query_as::<_, ActivityRow>("SELECT * FROM lead_activities WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(Some(row))
}

/// Reschedule many activities in one statement; returns the affected count
pub async fn bulk_update_follow_up(
    pool: &SqlitePool,
    tenant_id: &str,
    ids: &[String],
    follow_up_at: Option<i64>,
) -> Result<u64, SqliteError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let now = chrono::Utc::now().timestamp();

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE lead_activities SET follow_up_at = ");
    qb.push_bind(follow_up_at)
        .push(", updated_at = ")
        .push_bind(now)
        .push(" WHERE tenant_id = ")
        .push_bind(tenant_id)
        .push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    qb.push(")");

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// All activities for a lead, newest first
pub async fn list_for_lead(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
) -> Result<Vec<ActivityRow>, SqliteError> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM lead_activities WHERE tenant_id = ? AND lead_id = ?
         ORDER BY created_at DESC, id DESC",
    )
    .bind(tenant_id)
    .bind(lead_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn push_activity_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a ActivityFilter) {
    if let Some(activity_type) = &filter.activity_type {
        qb.push(" AND activity_type = ").push_bind(activity_type);
    }
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = &filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(user_id) = &filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
}

/// Entity-wide activity listing with filters, newest first
pub async fn list_activities(
    pool: &SqlitePool,
    tenant_id: &str,
    filter: &ActivityFilter,
) -> Result<(Vec<ActivityRow>, u64), SqliteError> {
    let offset = (filter.page.saturating_sub(1)) * filter.limit;

    let mut qb = QueryBuilder::new("SELECT * FROM lead_activities WHERE tenant_id = ");
    qb.push_bind(tenant_id);
    push_activity_filters(&mut qb, filter);
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build_query_as::<ActivityRow>().fetch_all(pool).await?;

    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM lead_activities WHERE tenant_id = ");
    count_qb.push_bind(tenant_id);
    push_activity_filters(&mut count_qb, filter);

    let total: (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    Ok((rows, total.0 as u64))
}

/// Pending activities with a follow-up date, by priority rank then soonest
pub async fn pending_follow_ups(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<Vec<ActivityRow>, SqliteError> {
    let rows = sqlx::query_as::<_, ActivityRow>(&format!(
        "SELECT * FROM lead_activities
         WHERE tenant_id = ? AND status = 'pending' AND follow_up_at IS NOT NULL
         ORDER BY {PRIORITY_RANK}, follow_up_at ASC"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Pending follow-ups already past due at `now`
pub async fn overdue_follow_ups(
    pool: &SqlitePool,
    tenant_id: &str,
    now: i64,
) -> Result<Vec<ActivityRow>, SqliteError> {
    let rows = sqlx::query_as::<_, ActivityRow>(&format!(
        "SELECT * FROM lead_activities
         WHERE tenant_id = ? AND status = 'pending' AND follow_up_at IS NOT NULL AND follow_up_at < ?
         ORDER BY {PRIORITY_RANK}, follow_up_at ASC"
    ))
    .bind(tenant_id)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Pending follow-ups still in the future at `now`
pub async fn upcoming_follow_ups(
    pool: &SqlitePool,
    tenant_id: &str,
    now: i64,
) -> Result<Vec<ActivityRow>, SqliteError> {
    let rows = sqlx::query_as::<_, ActivityRow>(&format!(
        "SELECT * FROM lead_activities
         WHERE tenant_id = ? AND status = 'pending' AND follow_up_at IS NOT NULL AND follow_up_at >= ?
         ORDER BY {PRIORITY_RANK}, follow_up_at ASC"
    ))
    .bind(tenant_id)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Counts by type and status plus pending/overdue follow-up totals
pub async fn activity_stats(
    pool: &SqlitePool,
    tenant_id: &str,
    now: i64,
) -> Result<ActivityStats, SqliteError> {
    let by_type = sqlx::query_as::<_, (String, i64)>(
        "SELECT activity_type, COUNT(*) FROM lead_activities WHERE tenant_id = ?
         GROUP BY activity_type ORDER BY activity_type",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    let by_status = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM lead_activities WHERE tenant_id = ?
         GROUP BY status ORDER BY status",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    let (pending, overdue): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN follow_up_at < ? THEN 1 ELSE 0 END), 0)
         FROM lead_activities
         WHERE tenant_id = ? AND status = 'pending' AND follow_up_at IS NOT NULL",
    )
    .bind(now)
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;

    Ok(ActivityStats {
        by_type,
        by_status,
        pending_follow_ups: pending,
        overdue_follow_ups: overdue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{
        seed_lead, seed_tenant, seed_user, setup_test_pool,
    };

    async fn log(
        pool: &SqlitePool,
        tenant_id: &str,
        lead_id: &str,
        activity_type: &str,
        follow_up_at: Option<i64>,
        priority: Option<&str>,
    ) -> ActivityRow {
        log_activity(
            pool,
            tenant_id,
            lead_id,
            None,
            &NewActivity {
                activity_type: activity_type.to_string(),
                description: format!("{activity_type} with lead"),
                follow_up_at,
                priority: priority.map(String::from),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_log_activity_defaults() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;

        let activity = log(&pool, &tenant.id, &lead.id, "call", None, None).await;
        assert_eq!(activity.status, "pending");
        assert_eq!(activity.priority, "medium");
    }

    #[tokio::test]
    async fn test_follow_up_ordering_by_priority_then_date() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let now = chrono::Utc::now().timestamp();

        let medium_soon = log(&pool, &tenant.id, &lead.id, "call", Some(now + 100), None).await;
        let urgent_late =
            log(&pool, &tenant.id, &lead.id, "email", Some(now + 5000), Some("urgent")).await;
        let urgent_soon =
            log(&pool, &tenant.id, &lead.id, "meeting", Some(now + 1000), Some("urgent")).await;

        let pending = pending_follow_ups(&pool, &tenant.id).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                urgent_soon.id.as_str(),
                urgent_late.id.as_str(),
                medium_soon.id.as_str()
            ]
        );
    }

    #[tokio::test]
    async fn test_overdue_and_upcoming_split() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let now = chrono::Utc::now().timestamp();

        let past = log(&pool, &tenant.id, &lead.id, "call", Some(now - 3600), None).await;
        let future = log(&pool, &tenant.id, &lead.id, "call", Some(now + 3600), None).await;
        // Completed activities are neither overdue nor upcoming
        let done = log(&pool, &tenant.id, &lead.id, "call", Some(now - 7200), None).await;
        update_activity_status(&pool, &tenant.id, &done.id, "completed")
            .await
            .unwrap();

        let overdue = overdue_follow_ups(&pool, &tenant.id, now).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, past.id);

        let upcoming = upcoming_follow_ups(&pool, &tenant.id, now).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, future.id);
    }

    #[tokio::test]
    async fn test_bulk_update_follow_up() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let now = chrono::Utc::now().timestamp();

        let a1 = log(&pool, &tenant.id, &lead.id, "call", Some(now), None).await;
        let a2 = log(&pool, &tenant.id, &lead.id, "email", Some(now), None).await;

        let affected = bulk_update_follow_up(
            &pool,
            &tenant.id,
            &[a1.id.clone(), a2.id.clone()],
            Some(now + 86_400),
        )
        .await
        .unwrap();
        assert_eq!(affected, 2);

        let rescheduled: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lead_activities WHERE follow_up_at = ?",
        )
        .bind(now + 86_400)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(rescheduled, 2);

        assert_eq!(
            bulk_update_follow_up(&pool, &tenant.id, &[], Some(now)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_list_activities_filters() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let user = seed_user(&pool, &tenant.id, "a@acme.test").await;

        log(&pool, &tenant.id, &lead.id, "call", None, None).await;
        log_activity(
            &pool,
            &tenant.id,
            &lead.id,
            Some(&user.id),
            &NewActivity {
                activity_type: "meeting".to_string(),
                description: "demo".to_string(),
                follow_up_at: None,
                priority: Some("high".to_string()),
            },
        )
        .await
        .unwrap();

        let (rows, total) = list_activities(
            &pool,
            &tenant.id,
            &ActivityFilter {
                activity_type: Some("meeting".to_string()),
                user_id: Some(user.id.clone()),
                page: 1,
                limit: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].priority, "high");
    }

    #[tokio::test]
    async fn test_activity_stats() {
        let pool = setup_test_pool().await;
        let tenant = seed_tenant(&pool).await;
        let lead = seed_lead(&pool, &tenant.id, "w_1").await;
        let now = chrono::Utc::now().timestamp();

        log(&pool, &tenant.id, &lead.id, "call", Some(now - 100), None).await;
        log(&pool, &tenant.id, &lead.id, "call", Some(now + 100), None).await;
        let done = log(&pool, &tenant.id, &lead.id, "note", None, None).await;
        update_activity_status(&pool, &tenant.id, &done.id, "completed")
            .await
            .unwrap();

        let stats = activity_stats(&pool, &tenant.id, now).await.unwrap();
        assert_eq!(stats.by_type, vec![("call".to_string(), 2), ("note".to_string(), 1)]);
        assert_eq!(stats.pending_follow_ups, 2);
        assert_eq!(stats.overdue_follow_ups, 1);
    }
}
