//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{activities, assignments, health, leads, stages, webhooks};
use crate::api::types::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LeadFlow API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Multi-tenant CRM lead backend"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "webhooks", description = "Lead intake webhooks"),
        (name = "leads", description = "Lead queries"),
        (name = "stages", description = "Pipeline stage management"),
        (name = "assignments", description = "Lead assignment"),
        (name = "activities", description = "Activities and follow-ups")
    ),
    paths(
        // Health
        health::health,
        // Webhooks
        webhooks::facebook_verify,
        webhooks::facebook_webhook,
        webhooks::website_webhook,
        // Leads
        leads::list_leads,
        leads::counts_by_status,
        leads::list_unassigned,
        leads::my_leads,
        leads::get_lead,
        // Stages
        stages::change_status,
        stages::possible_transitions,
        stages::lead_stage_history,
        stages::list_stages,
        stages::sla_violations,
        stages::pipeline_summary,
        stages::recent_changes,
        // Assignments
        assignments::assign_lead,
        assignments::get_assignment,
        assignments::assignment_history,
        assignments::list_assignments,
        assignments::bulk_assign,
        assignments::workload,
        // Activities
        activities::log_activity,
        activities::lead_activities,
        activities::update_status,
        activities::update_follow_up,
        activities::bulk_reschedule,
        activities::list_activities,
        activities::pending_follow_ups,
        activities::overdue_follow_ups,
        activities::upcoming_follow_ups,
        activities::activity_stats,
    ),
    components(schemas(
        // API types
        PaginationMeta,
        // Health
        health::HealthResponse,
        // Leads
        leads::ListLeadsQuery,
        leads::MyLeadsQuery,
        leads::StatusCountDto,
        // Stages
        stages::ChangeStatusRequest,
        stages::TransitionsResponse,
        stages::ListStagesQuery,
        stages::SlaQuery,
        stages::RecentQuery,
        // Assignments
        assignments::AssignRequest,
        assignments::ListAssignmentsQuery,
        assignments::BulkAssignRequest,
        // Activities
        activities::LogActivityRequest,
        activities::UpdateStatusRequest,
        activities::UpdateFollowUpRequest,
        activities::BulkRescheduleRequest,
        activities::ListActivitiesQuery,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>LeadFlow API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;
