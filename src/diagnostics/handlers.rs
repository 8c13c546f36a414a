use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    db::Database,
    diagnostics::dto::{ConnectionStatus, ProbeRequest, ProbeResult},
    errors::ApiError,
    response::{self, ApiResponse, ErrorResponse, Reply},
    state::AppState,
};

pub fn database_routes() -> Router<AppState> {
    Router::new().route("/database/test", get(test_connection).post(probe_database))
}

/// Schema and table names accepted by the probe.
fn is_valid_identifier(name: &str) -> bool {
    lazy_static! {
        static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z0-9_$]{1,64}$").unwrap();
    }
    IDENT_RE.is_match(name)
}

fn identifier(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) if !is_valid_identifier(&v) => {
            Err(ApiError::bad_request(format!("Invalid {field}")))
        }
        other => Ok(other),
    }
}

/// Check connectivity and list schemas
#[utoipa::path(
    get,
    path = "/api/database/test",
    tag = "Database",
    responses(
        (status = 200, description = "Connected", body = ApiResponse<ConnectionStatus>),
        (status = 500, description = "Connection failed", body = ErrorResponse),
    )
)]
#[instrument(skip(state))]
pub async fn test_connection(
    State(state): State<AppState>,
) -> Result<Reply<ConnectionStatus>, ApiError> {
    let cfg = state.db.config();
    let details = json!({ "host": cfg.host, "port": cfg.port, "user": cfg.user });

    if !state.db.test_connection().await {
        return Err(ApiError::failed("Database connection failed").with_details(details));
    }

    let databases = state.db.get_databases().await.map_err(|e| {
        ApiError::internal("Database connection test failed", e).with_details(details.clone())
    })?;

    Ok(response::ok(
        "Database connection successful",
        ConnectionStatus {
            connection_status: "connected".into(),
            available_databases: databases,
            host: cfg.host.clone(),
            port: cfg.port,
            user: cfg.user.clone(),
        },
    ))
}

/// Inspect a schema: tables, table layout, optional raw query
#[utoipa::path(
    post,
    path = "/api/database/test",
    tag = "Database",
    request_body(content = ProbeRequest, description = "Optional; an empty body runs no checks"),
    responses(
        (status = 200, description = "Probe finished; per-step failures are reported in data", body = ApiResponse<ProbeResult>),
        (status = 400, description = "Invalid schema or table name", body = ErrorResponse),
        (status = 500, description = "Could not connect to the schema", body = ErrorResponse),
    )
)]
#[instrument(skip(state, payload))]
pub async fn probe_database(
    State(state): State<AppState>,
    payload: Result<Json<ProbeRequest>, JsonRejection>,
) -> Result<Reply<ProbeResult>, ApiError> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => ProbeRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let database_name = identifier(req.database_name, "databaseName")?;
    let table_name = identifier(req.table_name, "tableName")?;

    // a named schema gets its own short-lived pool; the shared one stays put
    let scoped = match &database_name {
        Some(name) => {
            let handle = Database::new(state.db.config().clone());
            handle
                .initialize(Some(name))
                .await
                .map_err(|e| ApiError::internal("Database operation failed", e))?;
            Some(handle)
        }
        None => None,
    };
    let db = scoped.as_ref().unwrap_or(&*state.db);

    let mut result = ProbeResult::default();

    if let Some(sql) = req.query.filter(|q| !q.trim().is_empty()) {
        if !state.config.allow_raw_query {
            warn!("raw query rejected");
            result.custom_query_error =
                Some("custom queries are disabled (set DB_ALLOW_RAW_QUERY=true)".into());
        } else {
            info!(sql = %sql, "running raw query");
            match db.query_json(&sql, &[]).await {
                Ok(rows) => result.custom_query_result = Some(rows),
                Err(e) => result.custom_query_error = Some(e.to_string()),
            }
        }
    }

    if scoped.is_some() {
        match db.get_tables(None).await {
            Ok(tables) => result.tables = Some(tables),
            Err(e) => result.tables_error = Some(e.to_string()),
        }

        if let Some(table) = &table_name {
            match db.describe_table(table).await {
                Ok(columns) => result.table_structure = Some(columns),
                Err(e) => result.table_structure_error = Some(e.to_string()),
            }
        }
    }

    if let Some(handle) = &scoped {
        handle.close().await;
    }

    Ok(response::ok("Database operation completed", result))
}
