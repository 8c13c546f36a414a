use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Request body for `POST /api/users`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "Li Si", min_length = 1, max_length = 100)]
    pub name: Option<String>,
    #[schema(example = "lisi@example.com")]
    pub email: Option<String>,
}

/// Request body for `PUT /api/users/{id}`; at least one field is required.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    #[schema(example = "Wang Wu", min_length = 1, max_length = 100)]
    pub name: Option<String>,
    #[schema(example = "wangwu@example.com")]
    pub email: Option<String>,
}

/// Raw pagination query; parsed by `services::parse_pagination`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page size, 1..=100 (default 10).
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
    /// Rows to skip (default 0).
    #[param(value_type = Option<u64>)]
    pub offset: Option<String>,
}
