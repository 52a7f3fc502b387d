//! Authentication Middleware
//!
//! Validates the bearer token and puts the caller's identity and effective
//! permissions into the request extensions.

use std::collections::BTreeSet;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::application::services::auth_service::decode_access_token;
use crate::application::services::{AuthError, Claims};
use crate::domain::Permission;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    /// Tenant every query of this request is scoped to
    pub company_id: i64,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
}

impl AuthUser {
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(permission.as_str())
    }

    /// 403 unless the caller holds `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, permission = %permission, "Permission denied");
            Err(AppError::Forbidden(format!(
                "Missing permission '{}'",
                permission
            )))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let invalid = || AppError::Unauthorized("Invalid token claims".into());
        Ok(Self {
            user_id: claims.sub.parse().map_err(|_| invalid())?,
            company_id: claims.company_id.parse().map_err(|_| invalid())?,
            username: claims.username,
            roles: claims.roles,
            permissions: claims.permissions.into_iter().collect(),
        })
    }
}

/// Resolve an `Authorization` header value to the caller.
pub fn authenticate(header: Option<&str>, secret: &str) -> Result<AuthUser, AppError> {
    let header = header.ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;

    let claims = decode_access_token(token.trim(), secret).map_err(|e| match e {
        AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    AuthUser::try_from(claims)
}

/// Rejects requests without a valid access token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let user = authenticate(header, &state.settings.jwt.secret)?;

    tracing::Span::current().record("user_id", user.user_id);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::auth_service::issue_tokens;
    use crate::config::JwtSettings;
    use crate::domain::User;
    use axum::http::StatusCode;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    fn create_test_token(permissions: &[&str], expiry_minutes: i64) -> String {
        let user = User {
            id: 42,
            company_id: 7,
            username: "ali".into(),
            ..User::default()
        };
        let settings = JwtSettings {
            secret: SECRET.into(),
            access_token_expiry_minutes: expiry_minutes,
            refresh_token_expiry_days: 7,
        };
        issue_tokens(
            &user,
            vec!["Sales".into()],
            permissions.iter().map(|p| p.to_string()).collect(),
            &settings,
        )
        .unwrap()
        .access_token
    }

    #[test]
    fn test_round_trip_through_decoder() {
        let token = create_test_token(&["customers.read", "chat.use"], 60);
        let user = authenticate(Some(&format!("Bearer {}", token)), SECRET).unwrap();

        assert_eq!(user.user_id, 42);
        assert_eq!(user.company_id, 7);
        assert_eq!(user.roles, vec!["Sales"]);
        assert!(user.has(Permission::CustomersRead));
        assert!(user.require(Permission::ChatUse).is_ok());
    }

    #[test]
    fn test_missing_permission_is_forbidden() {
        let token = create_test_token(&["customers.read"], 60);
        let user = authenticate(Some(&format!("Bearer {}", token)), SECRET).unwrap();

        let err = user.require(Permission::InvoicesDelete).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_rejects_bad_headers() {
        for header in [None, Some("Basic abc"), Some("Bearer not-a-jwt")] {
            let err = authenticate(header, SECRET).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let token = create_test_token(&[], 60);
        let result = authenticate(
            Some(&format!("Bearer {}", token)),
            "another-secret-that-is-at-least-32-chars",
        );
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_rejects_expired_token() {
        // Past the decoder's default 60s leeway
        let token = create_test_token(&[], -5);
        let result = authenticate(Some(&format!("Bearer {}", token)), SECRET);
        assert!(matches!(result, Err(AppError::Unauthorized(msg)) if msg == "Token expired"));
    }
}
