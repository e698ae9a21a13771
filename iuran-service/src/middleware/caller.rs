//! Caller identity extracted from request headers.
//!
//! The gateway in front of this service authenticates the user and forwards their id
//! and role as `X-User-ID` and `X-User-Role`. Handlers take [`CallerContext`] for any
//! authenticated route and [`AdminContext`] for administrative ones.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use std::str::FromStr;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    /// A resident.
    Warga,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "warga" => Ok(Role::Warga),
            other => Err(AppError::Unauthorized(anyhow::anyhow!(
                "Unknown role '{}' in {} header",
                other,
                USER_ROLE_HEADER
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl CallerContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?;
        let user_id = Uuid::parse_str(user_id).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!(
                "Malformed {} header, expected a UUID",
                USER_ID_HEADER
            ))
        })?;
        let role = header(parts, USER_ROLE_HEADER)?.parse()?;

        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        Ok(CallerContext { user_id, role })
    }
}

/// A caller proven to hold the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = CallerContext::from_request_parts(parts, state).await?;
        if !caller.is_admin() {
            tracing::warn!(user_id = %caller.user_id, "Non-admin attempted an admin route");
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "This operation requires the admin role"
            )));
        }
        Ok(AdminContext {
            user_id: caller.user_id,
        })
    }
}
