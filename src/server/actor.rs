use async_trait::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::User;
use crate::error::{unauthorized_error, Error};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

#[async_trait]
impl<B: Send> FromRequest<B> for User {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        user_from_headers(req.headers())
    }
}

fn user_from_headers(headers: &HeaderMap) -> Result<User, Error> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(unauthorized_error)?;

    let roles = match headers.get(USER_ROLES_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| unauthorized_error())?
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(String::from)
            .collect(),
        None => vec![],
    };

    Ok(User::with_roles(id, roles))
}
