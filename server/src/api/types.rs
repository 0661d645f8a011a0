//! Shared API types
//!
//! Error responses, pagination and common validators used across endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::domain::DomainError;

/// Maximum items per page for paginated endpoints
pub const MAX_PAGE_LIMIT: u32 = 500;
/// Maximum page number to prevent expensive OFFSET queries
pub const MAX_PAGE: u32 = 100;
/// Default page number
pub const DEFAULT_PAGE: u32 = 1;
/// Default items per page
pub const DEFAULT_LIMIT: u32 = 50;

/// Validator function for page parameter
pub fn validate_page(page: u32) -> Result<(), ValidationError> {
    if page < 1 {
        return Err(ValidationError::new("page_min").with_message("Page must be >= 1".into()));
    }
    if page > MAX_PAGE {
        return Err(ValidationError::new("page_max").with_message(
            format!("Page must be <= {} to prevent expensive queries", MAX_PAGE).into(),
        ));
    }
    Ok(())
}

/// Validator function for limit parameter
pub fn validate_limit(limit: u32) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::new("limit_range")
            .with_message(format!("Limit must be between 1 and {}", MAX_PAGE_LIMIT).into()));
    }
    Ok(())
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        code: String,
        message: String,
    },
    NotFound {
        code: String,
        message: String,
    },
    Unauthorized {
        code: String,
        message: String,
    },
    Forbidden {
        code: String,
        message: String,
    },
    Conflict {
        code: String,
        message: String,
        /// Extra context for transition conflicts (allowed target statuses)
        allowed: Option<Vec<String>>,
    },
    BadGateway {
        message: String,
    },
    Internal {
        message: String,
    },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
            allowed: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn from_sqlite(e: crate::data::SqliteError) -> Self {
        tracing::error!(error = %e, "SQLite error");
        Self::Internal {
            message: "Database operation failed".to_string(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(message) => Self::bad_request("VALIDATION", message),
            DomainError::InvalidArgument(message) => Self::bad_request("INVALID_ARGUMENT", message),
            DomainError::NotFound { .. } => Self::not_found("NOT_FOUND", e.to_string()),
            DomainError::InvalidTransition { ref allowed, .. } => Self::Conflict {
                code: "INVALID_TRANSITION".to_string(),
                message: e.to_string(),
                allowed: Some(allowed.clone()),
            },
            DomainError::InvalidState(message) => Self::conflict("INVALID_STATE", message),
            DomainError::NoEligibleAssignees => {
                Self::conflict("NO_ELIGIBLE_ASSIGNEES", e.to_string())
            }
            DomainError::Upstream(message) => {
                tracing::error!(error = %message, "Upstream error");
                Self::BadGateway {
                    message: "Upstream service failed".to_string(),
                }
            }
            DomainError::Database(e) => Self::from_sqlite(e),
            DomainError::Internal(message) => {
                tracing::error!(error = %message, "Internal error");
                Self::Internal {
                    message: "Internal error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message, allowed) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message, None)
            }
            Self::NotFound { code, message } => {
                (StatusCode::NOT_FOUND, "not_found", code, message, None)
            }
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", code, message, None)
            }
            Self::Forbidden { code, message } => {
                (StatusCode::FORBIDDEN, "forbidden", code, message, None)
            }
            Self::Conflict {
                code,
                message,
                allowed,
            } => (StatusCode::CONFLICT, "conflict", code, message, allowed),
            Self::BadGateway { message } => (
                StatusCode::BAD_GATEWAY,
                "bad_gateway",
                "UPSTREAM".to_string(),
                message,
                None,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
                None,
            ),
        };

        let mut body = serde_json::json!({
            "error": error_type,
            "code": code,
            "message": message
        });
        if let Some(allowed) = allowed {
            body["allowed_transitions"] = serde_json::json!(allowed);
        }
        (status, Json(body)).into_response()
    }
}

pub fn default_page() -> u32 {
    DEFAULT_PAGE
}

pub fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Pagination metadata in response
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit as u64),
        }
    }
}

/// Generic paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta::new(page, limit, total_items),
        }
    }
}
