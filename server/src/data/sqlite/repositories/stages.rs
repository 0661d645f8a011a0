//! Stage history repository
//!
//! One row per status interval, ordered by an explicit per-lead `seq`.
//! Ordering is never reconstructed from timestamps. The partial unique index
//! on open stages guarantees at most one open interval per lead.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::data::sqlite::SqliteError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StageRow {
    pub id: String,
    pub tenant_id: String,
    pub lead_id: String,
    pub status: String,
    pub seq: i64,
    pub acting_user_id: Option<String>,
    pub entered_at: i64,
    pub exited_at: Option<i64>,
    pub duration_hours: Option<f64>,
    pub notes: Option<String>,
    pub next_action: Option<String>,
}

/// Entity-wide stage listing filters; `page` is 1-based
#[derive(Debug, Clone, Default)]
pub struct StageFilter {
    pub status: Option<String>,
    pub acting_user_id: Option<String>,
    pub entered_from: Option<i64>,
    pub entered_to: Option<i64>,
    pub active_only: bool,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummaryRow {
    pub status: String,
    pub open_count: i64,
    pub avg_open_hours: f64,
}

pub async fn current_stage(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
) -> Result<Option<StageRow>, SqliteError> {
    let row = sqlx::query_as::<_, StageRow>(
        "SELECT * FROM lead_stages WHERE tenant_id = ? AND lead_id = ? AND exited_at IS NULL",
    )
    .bind(tenant_id)
    .bind(lead_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Atomically move a lead to `target`
///
/// One transaction: CAS-update the denormalized `lead_data.status` guarded on
/// `expected_current`, close the open stage (stamping `exited_at` and
/// `duration_hours`), and insert the next interval with `seq = max(seq)+1`.
/// A guard miss (the lead moved concurrently) rolls back and returns
/// [`SqliteError::Conflict`]; callers decide whether to retry from fresh
/// state.
pub async fn transition_stage(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
    expected_current: &str,
    target: &str,
    acting_user_id: Option<&str>,
    notes: Option<&str>,
    next_action: Option<&str>,
) -> Result<StageRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    let guard = sqlx::query(
        "UPDATE lead_data SET status = ?, updated_at = ? WHERE tenant_id = ? AND id = ? AND status = ?",
    )
    .bind(target)
    .bind(now)
    .bind(tenant_id)
    .bind(lead_id)
    .bind(expected_current)
    .execute(&mut *tx)
    .await?;

    if guard.rows_affected() == 0 {
        // Dropped tx rolls back
        return Err(SqliteError::Conflict(format!(
            "lead {lead_id} is no longer in status {expected_current}"
        )));
    }

    sqlx::query(
        "UPDATE lead_stages SET exited_at = ?, duration_hours = (? - entered_at) / 3600.0
         WHERE lead_id = ? AND exited_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(lead_id)
    .execute(&mut *tx)
    .await?;

    let (next_seq,): (i64,) =
        sqlx::query_as("SELECT COALESCE(MAX(seq), 0) + 1 FROM lead_stages WHERE lead_id = ?")
            .bind(lead_id)
            .fetch_one(&mut *tx)
            .await?;

    let stage_id = cuid2::create_id();
    sqlx::query(
        "INSERT INTO lead_stages (id, tenant_id, lead_id, status, seq, acting_user_id, entered_at, notes, next_action)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stage_id)
    .bind(tenant_id)
    .bind(lead_id)
    .bind(target)
    .bind(next_seq)
    .bind(acting_user_id)
    .bind(now)
    .bind(notes)
    .bind(next_action)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row = sqlx::query_as::<_, StageRow>("SELECT * FROM lead_stages WHERE id = ?")
        .bind(&stage_id)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Full stage history of a lead, in sequence order
pub async fn stage_history(
    pool: &SqlitePool,
    tenant_id: &str,
    lead_id: &str,
) -> Result<Vec<StageRow>, SqliteError> {
    let rows = sqlx::query_as::<_, StageRow>(
        "SELECT * FROM lead_stages WHERE tenant_id = ? AND lead_id = ? ORDER BY seq ASC",
    )
    .bind(tenant_id)
    .bind(lead_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn push_stage_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a StageFilter) {
    if let Some(status) = &filter.status {
        qb.push(" AND s.status = ").push_bind(status);
    }
    if let Some(user_id) = &filter.acting_user_id {
        qb.push(" AND s.acting_user_id = ").push_bind(user_id);
    }
    if let Some(from) = filter.entered_from {
        qb.push(" AND s.entered_at >= ").push_bind(from);
    }
    if let Some(to) = filter.entered_to {
        qb.push(" AND s.entered_at <= ").push_bind(to);
    }
    if filter.active_only {
        qb.push(" AND s.exited_at IS NULL");
    }
}

/// Entity-wide stage listing, newest intervals first
pub async fn list_stages(
    pool: &SqlitePool,
    tenant_id: &str,
    filter: &StageFilter,
) -> Result<(Vec<StageRow>, u64), SqliteError> {
    let offset = (filter.page.saturating_sub(1)) * filter.limit;

    let mut qb = QueryBuilder::new("SELECT s.* FROM lead_stages s WHERE s.tenant_id = ");
    qb.push_bind(tenant_id);
    push_stage_filters(&mut qb, filter);
    qb.push(" ORDER BY s.entered_at DESC, s.seq DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build_query_as::<StageRow>().fetch_all(pool).await?;

    let mut count_qb =
        QueryBuilder::new("SELECT COUNT(*) FROM lead_stages s WHERE s.tenant_id = ");
    count_qb.push_bind(tenant_id);
    push_stage_filters(&mut count_qb, filter);

    let total: (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    Ok((rows, total.0 as u64))
}

/// Open, non-terminal stages older than `threshold_hours`
pub async fn sla_violations(
    pool: &SqlitePool,
    tenant_id: &str,
    threshold_hours: f64,
    now: i64,
) -> Result<Vec<StageRow>, SqliteError> {
    let cutoff = now - (threshold_hours * 3600.0) as i64;
    let rows = sqlx::query_as::<_, StageRow>(
        "SELECT s.* FROM lead_stages s
         JOIN lead_statuses ls ON ls.name = s.status
         WHERE s.tenant_id = ? AND s.exited_at IS NULL AND ls.is_terminal = 0 AND s.entered_at < ?
         ORDER BY s.entered_at ASC",
    )
    .bind(tenant_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Per-status open-stage counts and average open age
pub async fn pipeline_summary(
    pool: &SqlitePool,
    tenant_id: &str,
    now: i64,
) -> Result<Vec<StageSummaryRow>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, i64, f64)>(
        "SELECT s.status, COUNT(*), AVG((? - s.entered_at) / 3600.0)
         FROM lead_stages s
         JOIN lead_statuses ls ON ls.name = s.status
         WHERE s.tenant_id = ? AND s.exited_at IS NULL
         GROUP BY s.status
         ORDER BY ls.sort_order",
    )
    .bind(now)
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(status, open_count, avg_open_hours)| StageSummaryRow {
            status,
            open_count,
            avg_open_hours,
        })
        .collect())
}

/// Most recent stage entries across the tenant
pub async fn recent_changes(
    pool: &SqlitePool,
    tenant_id: &str,
    limit: u32,
) -> Result<Vec<StageRow>, SqliteError> {
    let rows = sqlx::query_as::<_, StageRow>(
        "SELECT * FROM lead_stages WHERE tenant_id = ? ORDER BY entered_at DESC, seq DESC LIMIT ?",
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
