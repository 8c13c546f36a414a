use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Optional body of `POST /api/database/test`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    /// Schema to connect to for this request only.
    #[schema(example = "group_project")]
    pub database_name: Option<String>,
    /// Table to describe; requires `databaseName`.
    #[schema(example = "users")]
    pub table_name: Option<String>,
    /// Raw statement, only run when the server allows it.
    #[schema(example = "SELECT COUNT(*) AS total FROM users")]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    #[schema(example = "connected")]
    pub connection_status: String,
    pub available_databases: Vec<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub custom_query_result: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_query_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub table_structure: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_structure_error: Option<String>,
}
