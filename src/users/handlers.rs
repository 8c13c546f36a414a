use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    db::DbError,
    errors::ApiError,
    response::{self, ApiResponse, ErrorResponse, Reply},
    state::AppState,
    users::{
        dto::{CreateUserRequest, PageParams, UpdateUserRequest},
        repo_types::User,
        services::{parse_pagination, parse_user_id, validate_create, validate_update},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(PageParams),
    responses(
        (status = 200, description = "Users retrieved", body = ApiResponse<Vec<User>>),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Reply<Vec<User>>, ApiError> {
    let Query(params) = params?;
    let page = parse_pagination(&params)?;

    let users = state
        .users
        .list(page.limit, page.offset)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve users", e))?;
    let total = state
        .users
        .count()
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve users", e))?;

    Ok(response::page("Users retrieved successfully", users, total))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<User>),
        (status = 400, description = "Missing fields, invalid email or duplicate email", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Reply<User>, ApiError> {
    let Json(body) = payload?;
    let (name, email) = validate_create(body)?;

    let taken = state
        .users
        .find_id_by_email(&email, None)
        .await
        .map_err(|e| ApiError::internal("Failed to create user", e))?;
    if taken.is_some() {
        warn!(email = %email, "email already exists");
        return Err(ApiError::bad_request("Email already exists"));
    }

    let user = match state.users.create(&name, &email).await {
        Ok(u) => u,
        Err(DbError::Duplicate(_)) => {
            warn!(email = %email, "email claimed concurrently");
            return Err(ApiError::bad_request("Email already exists"));
        }
        Err(e) => return Err(ApiError::internal("Failed to create user", e)),
    };

    info!(user_id = user.id, "user created");
    Ok(response::created("User created successfully", user))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = ApiResponse<User>),
        (status = 400, description = "Invalid user id", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Reply<User>, ApiError> {
    let id = parse_user_id(&raw_id)?;

    let user = state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve user", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(response::ok("User retrieved successfully", user))
}

/// Update a user (partial)
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 400, description = "Invalid input or email used by another user", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Reply<User>, ApiError> {
    let id = parse_user_id(&raw_id)?;
    let Json(body) = payload?;
    let changes = validate_update(body)?;

    let existing = state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::internal("Failed to update user", e))?;
    if existing.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    if let Some(email) = &changes.email {
        let taken = state
            .users
            .find_id_by_email(email, Some(id))
            .await
            .map_err(|e| ApiError::internal("Failed to update user", e))?;
        if taken.is_some() {
            warn!(user_id = id, email = %email, "email used by another user");
            return Err(ApiError::bad_request("Email already used by another user"));
        }
    }

    match state.users.update(id, &changes).await {
        Ok(Some(user)) => {
            info!(user_id = id, "user updated");
            Ok(response::ok("User updated successfully", user))
        }
        Ok(None) => Err(ApiError::failed("Update failed")),
        Err(DbError::Duplicate(_)) => Err(ApiError::bad_request("Email already used by another user")),
        Err(e) => Err(ApiError::internal("Failed to update user", e)),
    }
}

/// Delete a user; returns the deleted record
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<User>),
        (status = 400, description = "Invalid user id", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Reply<User>, ApiError> {
    let id = parse_user_id(&raw_id)?;

    let user = state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete user", e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let affected = state
        .users
        .delete(id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete user", e))?;
    if affected == 0 {
        return Err(ApiError::failed("Delete failed"));
    }

    info!(user_id = id, "user deleted");
    Ok(response::ok("User deleted successfully", user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use crate::users::{repo::UserStore, repo_types::UserChanges};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .nest("/api", user_routes())
            .with_state(AppState::fake())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router, name: &str, email: &str) -> Value {
        let (status, json) = send(
            app,
            "POST",
            "/api/users",
            Some(json!({ "name": name, "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"].clone()
    }

    #[tokio::test]
    async fn create_returns_generated_id_and_timestamps() {
        let app = app();
        let (status, json) = send(
            &app,
            "POST",
            "/api/users",
            Some(json!({"name": "Li Si", "email": "lisi@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "User created successfully");
        assert_eq!(json["data"]["id"], 1);
        assert_eq!(json["data"]["name"], "Li Si");
        assert_eq!(json["data"]["email"], "lisi@example.com");
        assert!(json["data"]["created_at"].is_string());
        assert!(json["data"]["updated_at"].is_string());
        assert!(json["timestamp"].is_string());

        let (_, list) = send(&app, "GET", "/api/users", None).await;
        assert_eq!(list["count"], 1);
        assert_eq!(list["total"], 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let app = app();
        create(&app, "Li Si", "lisi@example.com").await;

        let (status, json) = send(
            &app,
            "POST",
            "/api/users",
            Some(json!({"name": "Other", "email": "lisi@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Email already exists");

        let (_, list) = send(&app, "GET", "/api/users", None).await;
        assert_eq!(list["total"], 1);
    }

    #[tokio::test]
    async fn create_validates_input() {
        let app = app();
        let (status, json) = send(&app, "POST", "/api/users", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Name and email are required fields");

        let (status, json) = send(
            &app,
            "POST",
            "/api/users",
            Some(json!({"name": "x", "email": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Invalid email format");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_unknown_user_is_not_found() {
        let app = app();
        let (status, json) = send(&app, "GET", "/api/users/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "User not found");
        assert!(json.get("data").is_none());

        let (status, json) = send(&app, "GET", "/api/users/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Invalid user ID");
    }

    #[tokio::test]
    async fn get_existing_user() {
        let app = app();
        let created = create(&app, "Li Si", "lisi@example.com").await;
        let (status, json) = send(&app, "GET", "/api/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], created);
    }

    #[tokio::test]
    async fn update_without_fields_leaves_row_alone() {
        let app = app();
        let created = create(&app, "Li Si", "lisi@example.com").await;

        let (status, json) = send(&app, "PUT", "/api/users/1", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "At least one field must be provided for update");

        let (_, json) = send(&app, "GET", "/api/users/1", None).await;
        assert_eq!(json["data"], created);
    }

    #[tokio::test]
    async fn update_rejects_email_of_other_user() {
        let app = app();
        create(&app, "Li Si", "lisi@example.com").await;
        create(&app, "Wang Wu", "wangwu@example.com").await;

        let (status, json) = send(
            &app,
            "PUT",
            "/api/users/2",
            Some(json!({"email": "lisi@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Email already used by another user");

        // keeping its own email is fine
        let (status, json) = send(
            &app,
            "PUT",
            "/api/users/2",
            Some(json!({"name": "Wang Liu", "email": "wangwu@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "Wang Liu");
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let app = app();
        let (status, _) = send(&app, "PUT", "/api/users/7", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_twice() {
        let app = app();
        let created = create(&app, "Li Si", "lisi@example.com").await;

        let (status, json) = send(&app, "DELETE", "/api/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "User deleted successfully");
        assert_eq!(json["data"], created);

        let (status, _) = send(&app, "DELETE", "/api/users/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", "/api/users/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_paginates() {
        let app = app();
        for i in 0..3 {
            create(&app, &format!("u{i}"), &format!("u{i}@example.com")).await;
        }
        let (status, json) = send(&app, "GET", "/api/users?limit=2&offset=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 2);
        assert_eq!(json["total"], 3);
        assert_eq!(json["data"][0]["id"], 2);

        let (status, json) = send(&app, "GET", "/api/users?limit=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Invalid pagination parameters");
    }

    #[tokio::test]
    async fn repeated_query_key_gets_error_envelope() {
        let app = app();
        let (status, json) = send(&app, "GET", "/api/users?limit=1&limit=2", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Invalid pagination parameters");
        assert!(json["timestamp"].is_string());
    }

    /// Every user exists and no email is taken up front, but writes lose:
    /// inserts and email changes hit the unique index, other updates find
    /// the row gone, deletes touch nothing.
    struct LosingWrites;

    fn stored(id: u64) -> User {
        User {
            id,
            name: "Li Si".into(),
            email: "lisi@example.com".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[async_trait]
    impl UserStore for LosingWrites {
        async fn list(&self, _limit: u32, _offset: u64) -> Result<Vec<User>, DbError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<u64, DbError> {
            Ok(0)
        }

        async fn find_by_id(&self, id: u64) -> Result<Option<User>, DbError> {
            Ok(Some(stored(id)))
        }

        async fn find_id_by_email(
            &self,
            _email: &str,
            _excluding: Option<u64>,
        ) -> Result<Option<u64>, DbError> {
            Ok(None)
        }

        async fn create(&self, _name: &str, email: &str) -> Result<User, DbError> {
            Err(DbError::Duplicate(email.to_string()))
        }

        async fn update(&self, _id: u64, changes: &UserChanges) -> Result<Option<User>, DbError> {
            match &changes.email {
                Some(email) => Err(DbError::Duplicate(email.clone())),
                None => Ok(None),
            }
        }

        async fn delete(&self, _id: u64) -> Result<u64, DbError> {
            Ok(0)
        }
    }

    fn losing_app() -> Router {
        let fake = AppState::fake();
        let state = AppState::from_parts(fake.db, Arc::new(LosingWrites), fake.config);
        Router::new().nest("/api", user_routes()).with_state(state)
    }

    #[tokio::test]
    async fn unique_index_violation_on_create_is_bad_request() {
        let app = losing_app();
        let (status, json) = send(
            &app,
            "POST",
            "/api/users",
            Some(json!({"name": "Li Si", "email": "lisi@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Email already exists");
    }

    #[tokio::test]
    async fn unique_index_violation_on_update_is_bad_request() {
        let app = losing_app();
        let (status, json) = send(
            &app,
            "PUT",
            "/api/users/1",
            Some(json!({"email": "wangwu@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Email already used by another user");
    }

    #[tokio::test]
    async fn update_of_vanished_row_fails() {
        let app = losing_app();
        let (status, json) = send(&app, "PUT", "/api/users/1", Some(json!({"name": "Wang Wu"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Update failed");
    }

    #[tokio::test]
    async fn delete_touching_no_rows_fails() {
        let app = losing_app();
        let (status, json) = send(&app, "DELETE", "/api/users/1", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Delete failed");
    }
}
