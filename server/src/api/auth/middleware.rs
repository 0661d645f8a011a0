//! Authentication middleware
//!
//! Bearer token authentication for the `/api/v1` surface. Tokens are stored
//! hashed; the lookup is by SHA-256 of the presented token, so a token never
//! touches the database in the clear. Deactivated users fail the lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::context::AuthContext;
use crate::data::SqliteService;
use crate::data::sqlite::repositories::users;
use crate::utils::crypto::sha256_hex;

/// Authentication error response
#[derive(Debug)]
pub struct AuthError {
    pub status: StatusCode,
    pub error: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    pub fn required() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "unauthorized",
            code: "AUTH_REQUIRED",
            message: "Authentication required".to_string(),
        }
    }

    pub fn invalid_token() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "unauthorized",
            code: "TOKEN_INVALID",
            message: "Invalid or revoked API token".to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "internal_error",
            code: "INTERNAL",
            message: "Authentication check failed".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error,
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Shared auth state for middleware
#[derive(Clone)]
pub struct AuthState {
    pub database: Arc<SqliteService>,
}

/// Bearer token authentication
///
/// Injects [`AuthContext`] into request extensions on success.
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(AuthError::required)?;

    let token_hash = sha256_hex(token);
    let user = users::find_by_token_hash(state.database.pool(), &token_hash)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token lookup failed");
            AuthError::internal()
        })?
        .ok_or_else(AuthError::invalid_token)?;

    request.extensions_mut().insert(AuthContext {
        user_id: user.id,
        tenant_id: user.tenant_id,
        role: user.role,
    });

    Ok(next.run(request).await)
}
