//! User repository
//!
//! Users authenticate with bearer tokens; only the SHA-256 of the token is
//! stored. `create_user` returns the plaintext token exactly once.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::core::constants::API_TOKEN_BYTES;
use crate::data::sqlite::SqliteError;
use crate::utils::crypto::{generate_token, sha256_hex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: i64,
}

type UserTuple = (String, String, String, String, String, String, bool, i64);

const USER_COLUMNS: &str =
    "id, tenant_id, email, first_name, last_name, role, is_active, created_at";

/// Create a user and mint their API token
///
/// Returns the row plus the plaintext token; the token is not recoverable
/// afterwards.
pub async fn create_user(
    pool: &SqlitePool,
    tenant_id: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    role: &str,
) -> Result<(UserRow, String), SqliteError> {
    let id = cuid2::create_id();
    let token = generate_token(API_TOKEN_BYTES);
    let token_hash = sha256_hex(&token);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO users (id, tenant_id, email, first_name, last_name, role, is_active, api_token_hash, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(role)
    .bind(&token_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok((
        UserRow {
            id,
            tenant_id: tenant_id.to_string(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: role.to_string(),
            is_active: true,
            created_at: now,
        },
        token,
    ))
}

pub async fn get_user(
    pool: &SqlitePool,
    tenant_id: &str,
    id: &str,
) -> Result<Option<UserRow>, SqliteError> {
    let row = sqlx::query_as::<_, UserTuple>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = ? AND id = ?"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_row))
}

/// Look up a user by the SHA-256 of their bearer token
///
/// Inactive users are excluded; a deactivated user's token stops working
/// immediately.
pub async fn find_by_token_hash(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<UserRow>, SqliteError> {
    let row = sqlx::query_as::<_, UserTuple>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE api_token_hash = ? AND is_active = 1"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_row))
}

/// Active users of a tenant, oldest first
///
/// The ordering seeds bulk assignment: the "first-listed" user on a workload
/// tie is the longest-standing one.
pub async fn list_active_users(
    pool: &SqlitePool,
    tenant_id: &str,
) -> Result<Vec<UserRow>, SqliteError> {
    let rows = sqlx::query_as::<_, UserTuple>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = ? AND is_active = 1 ORDER BY created_at ASC, id ASC"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(into_row).collect())
}

pub async fn set_user_active(
    pool: &SqlitePool,
    tenant_id: &str,
    id: &str,
    is_active: bool,
) -> Result<bool, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE users SET is_active = ?, updated_at = ? WHERE tenant_id = ? AND id = ?",
    )
    .bind(is_active)
    .bind(now)
    .bind(tenant_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn into_row(
    (id, tenant_id, email, first_name, last_name, role, is_active, created_at): UserTuple,
) -> UserRow {
    UserRow {
        id,
        tenant_id,
        email,
        first_name,
        last_name,
        role,
        is_active,
        created_at,
    }
}
