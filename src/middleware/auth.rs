use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Guards admin routes with the shared `ADMIN_API_KEY` bearer token.
pub async fn admin_auth<B>(
    State(state): State<AppState>,
    req: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing admin bearer token".to_string()))?;

    if !constant_time_eq(provided.as_bytes(), state.admin_api_key.as_bytes()) {
        tracing::warn!(uri = %req.uri(), "Rejected admin request with invalid API key");
        return Err(AppError::Unauthorized("invalid admin API key".to_string()));
    }

    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Admin,
}

impl Role {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "creator" | "instructor" => Some(Role::Creator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Identity forwarded by the upstream auth layer in `x-user-id` and
/// `x-user-role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;
        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| AppError::Unauthorized(format!("invalid {} header", USER_ID_HEADER)))?;

        let role = header(USER_ROLE_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ROLE_HEADER)))?;
        let role = Role::parse(&role)
            .ok_or_else(|| AppError::Forbidden(format!("unsupported role '{}'", role)))?;

        Ok(Caller { user_id, role })
    }
}

/// Caller acting as a creator on their own wallet.
#[derive(Debug, Clone, Copy)]
pub struct CreatorCaller(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CreatorCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        match caller.role {
            Role::Creator => Ok(CreatorCaller(caller.user_id)),
            Role::Admin => Err(AppError::Forbidden(
                "creator role required".to_string(),
            )),
        }
    }
}

/// Caller acting as a payout administrator.
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        match caller.role {
            Role::Admin => Ok(AdminCaller(caller.user_id)),
            Role::Creator => Err(AppError::Forbidden("admin role required".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(caller: Caller) -> String {
        format!("{}:{:?}", caller.user_id, caller.role)
    }

    async fn creator_only(CreatorCaller(id): CreatorCaller) -> String {
        id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/creator", get(creator_only))
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("Creator"), Some(Role::Creator));
        assert_eq!(Role::parse("instructor"), Some(Role::Creator));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("student"), None);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let response = app()
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_identity_headers_are_extracted() {
        let id = Uuid::new_v4();
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/creator")
                    .header(USER_ID_HEADER, id.to_string())
                    .header(USER_ROLE_HEADER, "creator")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_cannot_use_creator_routes() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/creator")
                    .header(USER_ID_HEADER, Uuid::new_v4().to_string())
                    .header(USER_ROLE_HEADER, "admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
