use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use afrilingua_common::AppError;

use crate::jwt::{Claims, JwtService};

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authenticated caller. Rejects with 401 before the handler runs.
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            AppError::Authentication("Missing or invalid authorization header".to_string())
        })?;

        JwtService::from_ref(state)
            .validate_token(token)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }
}

/// Caller on endpoints open to anonymous readers. A missing header yields
/// `None`; a present but invalid token is still a 401.
#[derive(Debug, Clone)]
pub struct OptionalClaims(pub Option<Claims>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalClaims
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(OptionalClaims(None));
        }
        Claims::from_request_parts(parts, state).await.map(|claims| OptionalClaims(Some(claims)))
    }
}

/// Client address and agent, recorded in the audit log.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Ok(ClientInfo {
            ip_address: header("x-forwarded-for")
                .and_then(|forwarded| forwarded.split(',').next().map(|ip| ip.trim().to_string()))
                .or_else(|| header("x-real-ip")),
            user_agent: header("user-agent").map(|agent| agent.chars().take(255).collect()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};
    use afrilingua_common::{JwtConfig, UserRole};
    use uuid::Uuid;

    #[derive(Clone)]
    struct TestState {
        jwt: JwtService,
    }

    impl FromRef<TestState> for JwtService {
        fn from_ref(state: &TestState) -> Self {
            state.jwt.clone()
        }
    }

    fn state() -> TestState {
        TestState {
            jwt: JwtService::new(&JwtConfig {
                secret: "test".into(),
                expiration_hours: 1,
                issuer: "afrilingua".into(),
            }),
        }
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts_with(None);
        let result = Claims::from_request_parts(&mut parts, &state()).await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn valid_token_yields_claims() {
        let state = state();
        let user_id = Uuid::new_v4();
        let (token, _) = state.jwt.issue(user_id, "t@example.com", UserRole::Admin).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));

        let claims = Claims::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert!(claims.is_admin());
    }

    #[tokio::test]
    async fn optional_claims_tolerate_anonymous_callers() {
        let mut parts = parts_with(None);
        let OptionalClaims(claims) = OptionalClaims::from_request_parts(&mut parts, &state())
            .await
            .unwrap();
        assert!(claims.is_none());

        let mut parts = parts_with(Some("Bearer garbage"));
        assert!(OptionalClaims::from_request_parts(&mut parts, &state()).await.is_err());
    }
}
