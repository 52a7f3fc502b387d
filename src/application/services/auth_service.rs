//! Authentication Service
//!
//! Handles tenant registration, login, JWT issuance and refresh-token
//! sessions.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::JwtSettings;
use crate::domain::value_objects::roles;
use crate::domain::{
    effective_permissions, CompanyRepository, MainCompany, RoleSeed, Session, SessionRepository,
    User, UserRepository,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create a tenant and its first administrator.
    async fn register(
        &self,
        registration: Registration,
    ) -> Result<(MainCompany, User, AuthTokens), AuthError>;

    /// Authenticate with email or username.
    async fn login(
        &self,
        login: &str,
        password: &str,
        client: ClientInfo,
    ) -> Result<AuthTokens, AuthError>;

    /// Exchange a refresh token for a new token pair (rotation).
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;

    /// Revoke the session behind a refresh token. Unknown tokens are ignored.
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
}

/// Tenant registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub company_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Where a login came from; stored on the session.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant the user belongs to
    pub company_id: String,
    pub username: String,
    /// Role names
    pub roles: Vec<String>,
    /// Effective permission names, sorted and deduplicated
    pub permissions: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User account is disabled")]
    UserInactive,

    #[error("Email already exists")]
    EmailExists,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error(transparent)]
    Repository(#[from] AppError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email/username or password".into())
            }
            AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
            AuthError::InvalidToken => AppError::Unauthorized("Invalid token".into()),
            AuthError::SessionNotFound => {
                AppError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::UserInactive => AppError::Forbidden("User account is disabled".into()),
            AuthError::EmailExists => AppError::Conflict("Email already exists".into()),
            AuthError::UsernameExists => AppError::Conflict("Username already exists".into()),
            AuthError::Repository(e) => e,
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash refresh token for storage
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Decode and validate an access token.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Sign claims for `user` and mint a fresh opaque refresh token.
pub fn issue_tokens(
    user: &User,
    roles: Vec<String>,
    permissions: Vec<String>,
    settings: &JwtSettings,
) -> Result<AuthTokens, AuthError> {
    let now = Utc::now();
    let access_expiry = now + Duration::minutes(settings.access_token_expiry_minutes);

    let claims = Claims {
        sub: user.id.to_string(),
        company_id: user.company_id.to_string(),
        username: user.username.clone(),
        roles,
        permissions,
        exp: access_expiry.timestamp(),
        iat: now.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

    // Opaque, carries no user data
    let refresh_token = format!("{}.{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

    Ok(AuthTokens {
        access_token,
        refresh_token,
        expires_in: settings.access_token_expiry_minutes * 60,
        token_type: "Bearer".to_string(),
    })
}

/// AuthService implementation
pub struct AuthServiceImpl<U, S, C>
where
    U: UserRepository,
    S: SessionRepository,
    C: CompanyRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    company_repo: Arc<C>,
    id_generator: Arc<SnowflakeGenerator>,
    jwt_settings: JwtSettings,
}

impl<U, S, C> AuthServiceImpl<U, S, C>
where
    U: UserRepository,
    S: SessionRepository,
    C: CompanyRepository,
{
    /// Create a new AuthServiceImpl
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        company_repo: Arc<C>,
        id_generator: Arc<SnowflakeGenerator>,
        jwt_settings: JwtSettings,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            company_repo,
            id_generator,
            jwt_settings,
        }
    }

    /// Load roles and permissions and sign a token pair.
    async fn tokens_for(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let role_names = self.user_repo.role_names(user.id).await?;
        let granted = self.user_repo.permission_names(user.id).await?;
        let permissions = effective_permissions(&role_names, granted.iter().map(String::as_str));

        issue_tokens(user, role_names, permissions, &self.jwt_settings)
    }

    async fn open_session(
        &self,
        user_id: i64,
        tokens: &AuthTokens,
        client: ClientInfo,
    ) -> Result<(), AuthError> {
        let mut session = Session::new(
            user_id,
            hash_refresh_token(&tokens.refresh_token),
            Utc::now() + Duration::days(self.jwt_settings.refresh_token_expiry_days),
        );
        session.user_agent = client.user_agent;
        session.ip_address = client.ip_address;

        self.session_repo.create(&session).await?;
        Ok(())
    }
}

#[async_trait]
impl<U, S, C> AuthService for AuthServiceImpl<U, S, C>
where
    U: UserRepository + 'static,
    S: SessionRepository + 'static,
    C: CompanyRepository + 'static,
{
    async fn register(
        &self,
        registration: Registration,
    ) -> Result<(MainCompany, User, AuthTokens), AuthError> {
        if self.user_repo.email_exists(&registration.email).await? {
            return Err(AuthError::EmailExists);
        }
        if self.user_repo.username_exists(&registration.username).await? {
            return Err(AuthError::UsernameExists);
        }

        let password_hash = hash_password(&registration.password)?;

        let company = MainCompany::new(self.id_generator.generate(), registration.company_name.trim());
        let owner = User {
            id: self.id_generator.generate(),
            company_id: company.id,
            username: registration.username.trim().to_string(),
            email: registration.email.trim().to_lowercase(),
            password_hash,
            first_name: registration.first_name,
            last_name: registration.last_name,
            ..User::default()
        };

        let seeds = RoleSeed::builtin(company.id, || self.id_generator.generate());
        let (company, user) = self
            .company_repo
            .create_with_owner(&company, &owner, &seeds, roles::ADMIN)
            .await?;

        let tokens = self.tokens_for(&user).await?;
        self.open_session(user.id, &tokens, ClientInfo::default()).await?;

        tracing::info!(company_id = company.id, user_id = user.id, "Tenant registered");
        Ok((company, user, tokens))
    }

    async fn login(
        &self,
        login: &str,
        password: &str,
        client: ClientInfo,
    ) -> Result<AuthTokens, AuthError> {
        let user = self
            .user_repo
            .find_by_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        let tokens = self.tokens_for(&user).await?;
        self.open_session(user.id, &tokens, client).await?;
        self.user_repo.touch_last_login(user.id).await?;

        tracing::info!(user_id = user.id, company_id = user.company_id, "User logged in");
        Ok(tokens)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let session = self
            .session_repo
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.is_active() {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !user.is_active {
            self.session_repo.revoke(session.id).await?;
            return Err(AuthError::UserInactive);
        }

        // Roles may have changed since the last token; claims are rebuilt.
        let tokens = self.tokens_for(&user).await?;
        let new_expires_at = Utc::now() + Duration::days(self.jwt_settings.refresh_token_expiry_days);

        self.session_repo
            .update_token_hash(session.id, &hash_refresh_token(&tokens.refresh_token), new_expires_at)
            .await?;

        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if let Some(session) = self
            .session_repo
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
        {
            self.session_repo.revoke(session.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        MockCompanyRepository, MockSessionRepository, MockUserRepository, Permission,
    };
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "test-secret-key-that-is-at-least-32-characters";

    fn create_test_settings() -> JwtSettings {
        JwtSettings {
            secret: SECRET.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn create_test_user(password: &str, is_active: bool) -> User {
        User {
            id: 100,
            company_id: 10,
            username: "sara".into(),
            email: "sara@example.com".into(),
            password_hash: hash_password(password).unwrap(),
            is_active,
            ..User::default()
        }
    }

    fn create_service(
        users: MockUserRepository,
        sessions: MockSessionRepository,
        companies: MockCompanyRepository,
    ) -> AuthServiceImpl<MockUserRepository, MockSessionRepository, MockCompanyRepository> {
        AuthServiceImpl::new(
            Arc::new(users),
            Arc::new(sessions),
            Arc::new(companies),
            Arc::new(SnowflakeGenerator::new(1, 0)),
            create_test_settings(),
        )
    }

    // ==================== Password & Token Helpers ====================

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_refresh_token_hash_is_stable_hex() {
        let a = hash_refresh_token("abc.def");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_refresh_token("abc.def"));
        assert_ne!(a, hash_refresh_token("abc.deg"));
    }

    #[test]
    fn test_issue_and_decode_round_trip() {
        let user = create_test_user("pw", true);
        let tokens = issue_tokens(
            &user,
            vec!["Sales".into()],
            vec!["customers.read".into()],
            &create_test_settings(),
        )
        .unwrap();

        let claims = decode_access_token(&tokens.access_token, SECRET).unwrap();
        assert_eq!(claims.sub, "100");
        assert_eq!(claims.company_id, "10");
        assert_eq!(claims.roles, vec!["Sales".to_string()]);
        assert_eq!(claims.permissions, vec!["customers.read".to_string()]);
        assert_eq!(tokens.expires_in, 900);
        assert_eq!(tokens.refresh_token.split('.').count(), 2);
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let user = create_test_user("pw", true);
        let tokens = issue_tokens(&user, vec![], vec![], &create_test_settings()).unwrap();

        let result = decode_access_token(&tokens.access_token, "another-secret-key-of-sufficient-length");
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_decode_expired_token() {
        let mut settings = create_test_settings();
        settings.access_token_expiry_minutes = -10;
        let user = create_test_user("pw", true);
        let tokens = issue_tokens(&user, vec![], vec![], &settings).unwrap();

        let result = decode_access_token(&tokens.access_token, SECRET);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    // ==================== Login ====================

    #[tokio::test]
    async fn test_login_admin_gets_all_permissions() {
        let user = create_test_user("secret-pass", true);
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_login()
            .with(eq("sara"))
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_role_names()
            .returning(|_| Ok(vec!["Admin".to_string()]));
        users.expect_permission_names().returning(|_| Ok(vec![]));
        users.expect_touch_last_login().times(1).returning(|_| Ok(()));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_create()
            .times(1)
            .returning(|s| Ok(s.clone()));

        let service = create_service(users, sessions, MockCompanyRepository::new());
        let tokens = service
            .login("sara", "secret-pass", ClientInfo::default())
            .await
            .unwrap();

        let claims = decode_access_token(&tokens.access_token, SECRET).unwrap();
        assert_eq!(claims.permissions.len(), Permission::ALL.len());
        assert!(claims.permissions.contains(&"invoices.send".to_string()));
    }

    #[tokio::test]
    async fn test_login_permissions_are_deduplicated() {
        let user = create_test_user("secret-pass", true);
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_login()
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_role_names()
            .returning(|_| Ok(vec!["Sales".to_string(), "Support".to_string()]));
        users.expect_permission_names().returning(|_| {
            Ok(vec![
                "invoices.read".to_string(),
                "customers.read".to_string(),
                "invoices.read".to_string(),
            ])
        });
        users.expect_touch_last_login().returning(|_| Ok(()));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().returning(|s| Ok(s.clone()));

        let service = create_service(users, sessions, MockCompanyRepository::new());
        let tokens = service
            .login("sara", "secret-pass", ClientInfo::default())
            .await
            .unwrap();

        let claims = decode_access_token(&tokens.access_token, SECRET).unwrap();
        assert_eq!(
            claims.permissions,
            vec!["customers.read".to_string(), "invoices.read".to_string()]
        );
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = create_test_user("secret-pass", true);
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_login()
            .returning(move |_| Ok(Some(user.clone())));

        let service = create_service(users, MockSessionRepository::new(), MockCompanyRepository::new());
        let result = service.login("sara", "nope", ClientInfo::default()).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_login().returning(|_| Ok(None));

        let service = create_service(users, MockSessionRepository::new(), MockCompanyRepository::new());
        let result = service.login("ghost", "whatever", ClientInfo::default()).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_inactive_user_is_forbidden() {
        let user = create_test_user("secret-pass", false);
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_login()
            .returning(move |_| Ok(Some(user.clone())));

        let service = create_service(users, MockSessionRepository::new(), MockCompanyRepository::new());
        let result = service.login("sara", "secret-pass", ClientInfo::default()).await;

        assert!(matches!(result, Err(AuthError::UserInactive)));
        let app: AppError = result.unwrap_err().into();
        assert_eq!(app.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    // ==================== Register ====================

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut users = MockUserRepository::new();
        users.expect_email_exists().returning(|_| Ok(true));

        let service = create_service(users, MockSessionRepository::new(), MockCompanyRepository::new());
        let result = service
            .register(Registration {
                company_name: "Pars".into(),
                username: "owner".into(),
                email: "owner@example.com".into(),
                password: "password123".into(),
                first_name: None,
                last_name: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::EmailExists)));
    }

    #[tokio::test]
    async fn test_register_creates_tenant_with_admin_owner() {
        let mut users = MockUserRepository::new();
        users.expect_email_exists().returning(|_| Ok(false));
        users.expect_username_exists().returning(|_| Ok(false));
        users
            .expect_role_names()
            .returning(|_| Ok(vec!["Admin".to_string()]));
        users.expect_permission_names().returning(|_| Ok(vec![]));

        let mut companies = MockCompanyRepository::new();
        companies
            .expect_create_with_owner()
            .withf(|company, owner, seeds, role| {
                company.name == "Pars"
                    && owner.company_id == company.id
                    && role == "Admin"
                    && seeds.iter().any(|s| s.role.name == "Admin")
                    && seeds.iter().all(|s| s.role.company_id == company.id)
            })
            .times(1)
            .returning(|c, u, _, _| Ok((c.clone(), u.clone())));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().times(1).returning(|s| Ok(s.clone()));

        let service = create_service(users, sessions, companies);
        let (company, user, tokens) = service
            .register(Registration {
                company_name: " Pars ".into(),
                username: "owner".into(),
                email: "Owner@Example.com".into(),
                password: "password123".into(),
                first_name: Some("Reza".into()),
                last_name: None,
            })
            .await
            .unwrap();

        assert_eq!(user.company_id, company.id);
        assert_eq!(user.email, "owner@example.com");
        let claims = decode_access_token(&tokens.access_token, SECRET).unwrap();
        assert_eq!(claims.company_id, company.id.to_string());
    }

    // ==================== Refresh & Logout ====================

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_by_token_hash().returning(|_| Ok(None));

        let service = create_service(MockUserRepository::new(), sessions, MockCompanyRepository::new());
        let result = service.refresh_token("missing.token").await;

        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token_hash() {
        let old_hash = hash_refresh_token("old.token");
        let session = Session::new(100, old_hash.clone(), Utc::now() + Duration::days(1));
        let session_id = session.id;
        let user = create_test_user("pw", true);

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_by_token_hash()
            .withf({
                let expected = old_hash.clone();
                move |hash| hash == expected
            })
            .returning(move |_| Ok(Some(session.clone())));
        sessions
            .expect_update_token_hash()
            .withf(move |id, hash, _| *id == session_id && hash != old_hash)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_role_names().returning(|_| Ok(vec![]));
        users.expect_permission_names().returning(|_| Ok(vec![]));

        let service = create_service(users, sessions, MockCompanyRepository::new());
        let tokens = service.refresh_token("old.token").await.unwrap();

        assert_ne!(tokens.refresh_token, "old.token");
    }

    #[tokio::test]
    async fn test_refresh_inactive_user_revokes_session() {
        let session = Session::new(100, hash_refresh_token("t.t"), Utc::now() + Duration::days(1));
        let user = create_test_user("pw", false);

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_by_token_hash()
            .returning(move |_| Ok(Some(session.clone())));
        sessions.expect_revoke().times(1).returning(|_| Ok(()));

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let service = create_service(users, sessions, MockCompanyRepository::new());
        let result = service.refresh_token("t.t").await;

        assert!(matches!(result, Err(AuthError::UserInactive)));
    }

    #[tokio::test]
    async fn test_logout_unknown_token_is_ok() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_by_token_hash().returning(|_| Ok(None));
        sessions.expect_revoke().never();

        let service = create_service(MockUserRepository::new(), sessions, MockCompanyRepository::new());
        assert!(service.logout("whatever").await.is_ok());
    }
}
