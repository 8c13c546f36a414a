use axum::{
    extract::{rejection::QueryRejection, Query},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::OpenApi;

use crate::{
    diagnostics::{self, dto as diag_dto},
    response::{ErrorResponse, Status},
    state::AppState,
    users::{self, dto as user_dto, repo_types::User},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Users API",
        version = "1.0.0",
        description = "CRUD over the users table plus database diagnostics"
    ),
    paths(
        users::handlers::list_users,
        users::handlers::create_user,
        users::handlers::get_user,
        users::handlers::update_user,
        users::handlers::delete_user,
        diagnostics::handlers::test_connection,
        diagnostics::handlers::probe_database,
    ),
    components(schemas(
        User,
        user_dto::CreateUserRequest,
        user_dto::UpdateUserRequest,
        diag_dto::ProbeRequest,
        diag_dto::ConnectionStatus,
        diag_dto::ProbeResult,
        ErrorResponse,
        Status,
    )),
    tags(
        (name = "Users", description = "User management, full CRUD"),
        (name = "Database", description = "Connection checks and schema inspection"),
    )
)]
pub struct ApiDoc;

#[derive(Debug, Deserialize)]
pub struct DocsQuery {
    pub format: Option<String>,
}

pub fn docs_routes() -> Router<AppState> {
    Router::new().route("/docs", get(docs))
}

/// `?format=json` returns the OpenAPI document, anything else the Swagger UI page.
/// An unparseable query string gets the page too.
pub async fn docs(q: Result<Query<DocsQuery>, QueryRejection>) -> Response {
    let wants_json = matches!(&q, Ok(Query(DocsQuery { format: Some(f) })) if f == "json");
    if wants_json {
        return Json(ApiDoc::openapi()).into_response();
    }
    Html(SWAGGER_UI).into_response()
}

const SWAGGER_UI: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function () {
            window.ui = SwaggerUIBundle({
                url: '/api/docs?format=json',
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                plugins: [SwaggerUIBundle.plugins.DownloadUrl],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
