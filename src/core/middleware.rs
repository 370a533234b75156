use axum::{extract::Request, middleware::Next, response::Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::app_error::AppError;

/// Identity headers forwarded by the auth gateway. Token verification
/// happens upstream; this service only consumes the result.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Staff,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Staff => "staff",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "customer" => Some(UserRole::Customer),
            "staff" => Some(UserRole::Staff),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: UserRole,
}

fn current_user(req: &Request) -> Result<CurrentUser, AppError> {
    let id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(AppError::Unauthorized)?;

    let role = req
        .headers()
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(UserRole::parse)
        .unwrap_or(UserRole::Customer);

    Ok(CurrentUser { id, role })
}

/// Requires an authenticated user of any role.
pub async fn customers_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user = current_user(&req)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Requires an authenticated staff or admin user.
pub async fn staff_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user = current_user(&req)?;
    if !matches!(user.role, UserRole::Staff | UserRole::Admin) {
        return Err(AppError::ForbiddenResource(
            "Staff access required".to_string(),
        ));
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_round_trips() {
        for role in [UserRole::Customer, UserRole::Staff, UserRole::Admin] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("root"), None);
    }
}
