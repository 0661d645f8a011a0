//! Auth extractor for Axum handlers

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::context::AuthContext;
use crate::api::types::ApiError;

/// Authenticated context extractor
///
/// Pulls the [`AuthContext`] injected by the auth middleware. Handlers take
/// this instead of reading extensions directly.
pub struct Auth {
    pub ctx: AuthContext,
}

/// Rejection type for the auth extractor
pub enum AuthRejection {
    /// Auth context not available (middleware not applied)
    MissingContext,
}

impl axum::response::IntoResponse for AuthRejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::MissingContext => {
                ApiError::internal("Auth context not available").into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthRejection::MissingContext)?;

        Ok(Self { ctx })
    }
}
