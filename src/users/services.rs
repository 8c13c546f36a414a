use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::ApiError;
use crate::users::{
    dto::{CreateUserRequest, PageParams, UpdateUserRequest},
    repo_types::UserChanges,
};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 255;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Positive decimal id from a path segment.
pub(crate) fn parse_user_id(raw: &str) -> Result<u64, ApiError> {
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_request("Invalid user ID")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

pub(crate) fn parse_pagination(params: &PageParams) -> Result<Page, ApiError> {
    let invalid = || ApiError::bad_request("Invalid pagination parameters");

    let limit = match params.limit.as_deref() {
        None | Some("") => DEFAULT_LIMIT,
        Some(v) => v.parse::<u32>().map_err(|_| invalid())?,
    };
    if limit == 0 || limit > MAX_LIMIT {
        return Err(invalid());
    }

    let offset = match params.offset.as_deref() {
        None | Some("") => 0,
        Some(v) => v.parse::<u64>().map_err(|_| invalid())?,
    };

    Ok(Page { limit, offset })
}

fn check_name(name: &str) -> Result<(), ApiError> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(
            "Name must be between 1 and 100 characters",
        ));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), ApiError> {
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request(
            "Email must be at most 255 characters",
        ));
    }
    if !is_valid_email(email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    Ok(())
}

/// Returns `(name, email)` for a new user.
pub(crate) fn validate_create(body: CreateUserRequest) -> Result<(String, String), ApiError> {
    let name = body.name.filter(|v| !v.is_empty());
    let email = body.email.filter(|v| !v.is_empty());
    let (Some(name), Some(email)) = (name, email) else {
        return Err(ApiError::bad_request("Name and email are required fields"));
    };
    check_name(&name)?;
    check_email(&email)?;
    Ok((name, email))
}

pub(crate) fn validate_update(body: UpdateUserRequest) -> Result<UserChanges, ApiError> {
    let changes = UserChanges {
        name: body.name.filter(|v| !v.is_empty()),
        email: body.email.filter(|v| !v.is_empty()),
    };
    if changes.name.is_none() && changes.email.is_none() {
        return Err(ApiError::bad_request(
            "At least one field must be provided for update",
        ));
    }
    if let Some(name) = &changes.name {
        check_name(name)?;
    }
    if let Some(email) = &changes.email {
        check_email(email)?;
    }
    Ok(changes)
}
