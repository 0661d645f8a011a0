//! Validation extractors for API routes

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

/// Maximum length for path ids (lead_id, user_id, activity_id)
pub const MAX_ID_LENGTH: usize = 64;

/// Validate generic ID: 1-64 chars, alphanumeric + dash/underscore
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Raw path extractor for lead-scoped routes (internal use)
#[derive(Debug, Deserialize)]
struct LeadPathRaw {
    lead_id: String,
}

/// Validated lead path extractor
///
/// Extracts and validates `lead_id` from URL path parameters. Returns a 400
/// Bad Request if validation fails.
#[derive(Debug)]
pub struct LeadPath {
    pub lead_id: String,
}

impl<S> FromRequestParts<S> for LeadPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<LeadPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&raw.lead_id) {
            return Err(ValidationRejection::InvalidId("lead_id"));
        }

        Ok(Self {
            lead_id: raw.lead_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ActivityPathRaw {
    activity_id: String,
}

/// Validated activity path extractor
#[derive(Debug)]
pub struct ActivityPath {
    pub activity_id: String,
}

impl<S> FromRequestParts<S> for ActivityPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ActivityPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&raw.activity_id) {
            return Err(ValidationRejection::InvalidId("activity_id"));
        }

        Ok(Self {
            activity_id: raw.activity_id,
        })
    }
}

/// Validation rejection with structured error response
pub enum ValidationRejection {
    /// Failed to parse path parameters
    Path(PathRejection),
    /// Path id failed format validation
    InvalidId(&'static str),
    /// Failed to parse query string
    Query(QueryRejection),
    /// Failed to parse JSON body
    Json(JsonRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                "PATH_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::InvalidId(name) => (
                StatusCode::BAD_REQUEST,
                "INVALID_ID",
                format!(
                    "Invalid {}: must be 1-{} alphanumeric chars, dashes, or underscores",
                    name, MAX_ID_LENGTH
                ),
            ),
            Self::Query(rejection) => (
                StatusCode::BAD_REQUEST,
                "QUERY_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Json(rejection) => (
                StatusCode::BAD_REQUEST,
                "JSON_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format_validation_errors(&errors),
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query extractor with automatic validation.
///
/// Deserializes query parameters and validates them using the `validator`
/// crate. Returns a `ValidationRejection` on parse or validation failure.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

/// JSON body extractor with automatic validation.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationRejection::Json)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}
