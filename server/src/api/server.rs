//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;

use tower_http::compression::CompressionLayer;

use super::auth::{AuthState, require_auth};
use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::webhooks::WebhooksApiState;
use super::routes::{activities, assignments, health, leads, stages, webhooks};
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);

        Self {
            app,
            allowed_origins,
        }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        // Clone shutdown before moving app
        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(host.parse()?, port);

        // Bearer-authenticated API surface
        let api_routes = Router::new()
            .merge(leads::routes(app.database.clone()))
            .merge(stages::routes(app.database.clone(), app.pipeline.clone()))
            .merge(assignments::routes(
                app.database.clone(),
                app.assignment.clone(),
                i64::from(app.config.assignment.max_leads_per_user),
            ))
            .merge(activities::routes(app.database.clone()))
            .layer(axum::middleware::from_fn_with_state(
                AuthState {
                    database: app.database.clone(),
                },
                require_auth,
            ));

        // Webhooks carry their own authentication (signature / shared key)
        let webhook_routes = webhooks::routes(WebhooksApiState {
            database: app.database.clone(),
            topics: app.topics.clone(),
            ingestion: app.ingestion.clone(),
            facebook: app.config.facebook.clone(),
            debug: app.config.debug,
        });

        let router = Router::new()
            .route("/api/v1/health", get(health::health))
            .route("/api/openapi.json", get(openapi_json))
            .route("/api/docs", get(swagger_ui_html))
            .route("/api/docs/", get(swagger_ui_html))
            .nest("/api/v1", api_routes)
            .nest("/webhooks", webhook_routes)
            .fallback(middleware::handle_404)
            .layer(CompressionLayer::new())
            .layer(middleware::cors(&allowed_origins))
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

        let listener = TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}
