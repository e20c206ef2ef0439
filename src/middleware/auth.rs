//! JWT Authentication middleware and extractors
//!
//! Provides the `AuthUser` extractor for handlers requiring an
//! authenticated dashboard user.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::jwt::IdentityClaims;
use crate::state::HasTracks;

/// Authenticated user information extracted from JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    /// User ID from the token's `sub` claim
    pub user_id: Uuid,
    /// User's email address
    pub email: String,
}

impl AuthUser {
    /// Create AuthUser from identity token claims
    pub fn from_identity_claims(claims: IdentityClaims) -> Result<Self, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("Invalid user ID in token".to_string()))?;

        Ok(Self {
            user_id,
            email: claims.email,
        })
    }
}

/// Authentication errors
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No Authorization header present
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader(String),
    /// Token validation failed
    InvalidToken(String),
    /// Token has expired
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidHeader(_) => (StatusCode::UNAUTHORIZED, "Invalid authorization header"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired"),
        };

        let body = serde_json::json!({
            "error": message,
            "code": "UNAUTHORIZED"
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Extract and validate Bearer token from Authorization header
fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AuthError::InvalidHeader(
            "Authorization header must use Bearer scheme".to_string(),
        ));
    }

    Ok(&auth_header[7..])
}

/// Axum extractor for authenticated users
///
/// This extractor validates the JWT token from the Authorization header
/// and provides the authenticated user information to handlers.
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(
///     auth: AuthUser,
///     State(state): State<AppState>,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", auth.email)
/// }
/// ```
impl<S> FromRequestParts<S> for AuthUser
where
    S: HasTracks + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;

        match state.jwt_manager().verify_identity_token(token) {
            Ok(claims) => AuthUser::from_identity_claims(claims),
            Err(AppError::Jwt(e)) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                Err(AuthError::TokenExpired)
            }
            Err(_) => Err(AuthError::InvalidToken(
                "Token validation failed".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_claims(sub: &str) -> IdentityClaims {
        IdentityClaims {
            sub: sub.to_string(),
            email: "test@example.com".to_string(),
            name: Some("Test User".to_string()),
            iss: "https://songforge.test".to_string(),
            aud: "songforge".to_string(),
            token_type: "identity".to_string(),
            iat: 1000000,
            exp: 1003600,
        }
    }

    #[test]
    fn test_auth_user_from_identity_claims() {
        let claims = identity_claims("550e8400-e29b-41d4-a716-446655440000");

        let user = AuthUser::from_identity_claims(claims).unwrap();

        assert_eq!(
            user.user_id,
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
        );
        assert_eq!(user.email, "test@example.com");
    }

    #[test]
    fn test_auth_user_invalid_user_id() {
        let claims = identity_claims("not-a-uuid");

        let result = AuthUser::from_identity_claims(claims);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer test-token-123".parse().unwrap());

        let token = extract_bearer_token(&headers).unwrap();
        assert_eq!(token, "test-token-123");
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        let headers = axum::http::HeaderMap::new();
        let result = extract_bearer_token(&headers);
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        let result = extract_bearer_token(&headers);
        assert!(matches!(result, Err(AuthError::InvalidHeader(_))));
    }

    #[test]
    fn test_auth_error_into_response() {
        let errors = vec![
            AuthError::MissingToken,
            AuthError::InvalidHeader("test".to_string()),
            AuthError::InvalidToken("test".to_string()),
            AuthError::TokenExpired,
        ];

        for error in errors {
            let response = error.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
