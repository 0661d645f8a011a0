//! HTTP middleware (CORS, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::config::is_all_interfaces;

/// Allowed origins configuration
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Create allowed origins from host and port configuration
    pub fn new(host: &str, port: u16) -> Self {
        let mut origins = Vec::new();
        let is_all = is_all_interfaces(host);

        // When binding to all interfaces or localhost, allow both localhost
        // and 127.0.0.1; otherwise use the configured host directly.
        let base_hosts: Vec<&str> = if is_all || host == "127.0.0.1" || host == "localhost" {
            vec!["localhost", "127.0.0.1"]
        } else {
            vec![host]
        };

        for h in &base_hosts {
            origins.push(format!("http://{}:{}", h, port));
            origins.push(format!("http://{}", h));
        }

        Self { origins }
    }

    /// Get origins as HeaderValues for CORS
    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .allow_credentials(true)
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!("[404] {} {}", req.method(), req.uri());
    StatusCode::NOT_FOUND
}
