//! User Service
//!
//! Profile management for the signed-in user and user administration within
//! a tenant.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::parse_ids;
use crate::application::dto::request::{
    ChangePasswordRequest, CreateUserRequest, UpdateProfileRequest, UpdateUserRequest,
};
use crate::application::services::auth_service::{hash_password, verify_password, AuthError};
use crate::domain::value_objects::roles;
use crate::domain::{effective_permissions, RoleRepository, SessionRepository, User, UserRepository};
use crate::infrastructure::email::{EmailSender, OutgoingEmail};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageParams};
use crate::shared::snowflake::SnowflakeGenerator;

/// A user with role names and, where loaded, effective permissions.
#[derive(Debug, Clone)]
pub struct UserView {
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailExists,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("Unknown role id: {0}")]
    UnknownRole(i64),

    #[error("{0}")]
    SelfModification(&'static str),

    #[error(transparent)]
    Repository(#[from] AppError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for UserError {
    fn from(err: AuthError) -> Self {
        UserError::Internal(err.to_string())
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound("User not found".into()),
            UserError::EmailExists => AppError::Conflict("Email already exists".into()),
            UserError::UsernameExists => AppError::Conflict("Username already exists".into()),
            UserError::WrongPassword => AppError::BadRequest("Current password is incorrect".into()),
            UserError::UnknownRole(id) => AppError::validation(format!("role_ids: unknown role {}", id)),
            UserError::SelfModification(msg) => AppError::BadRequest(msg.into()),
            UserError::Repository(e) => e,
            UserError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[async_trait]
pub trait UserService: Send + Sync {
    /// The caller with roles and effective permissions.
    async fn get_me(&self, user_id: i64) -> Result<UserView, UserError>;

    async fn update_me(&self, user_id: i64, update: UpdateProfileRequest) -> Result<UserView, UserError>;

    /// Change the caller's password and revoke every refresh session.
    async fn change_password(&self, user_id: i64, request: ChangePasswordRequest) -> Result<(), UserError>;

    async fn list(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<Page<UserView>, UserError>;

    async fn get(&self, company_id: i64, id: i64) -> Result<UserView, UserError>;

    async fn create(&self, company_id: i64, request: CreateUserRequest) -> Result<UserView, UserError>;

    async fn update(
        &self,
        company_id: i64,
        actor_id: i64,
        id: i64,
        update: UpdateUserRequest,
    ) -> Result<UserView, UserError>;

    async fn set_roles(
        &self,
        company_id: i64,
        actor_id: i64,
        id: i64,
        role_ids: &[String],
    ) -> Result<UserView, UserError>;

    /// Disable login and revoke sessions. Users cannot deactivate themselves.
    async fn deactivate(&self, company_id: i64, actor_id: i64, id: i64) -> Result<(), UserError>;
}

pub struct UserServiceImpl<U, R, S>
where
    U: UserRepository,
    R: RoleRepository,
    S: SessionRepository,
{
    user_repo: Arc<U>,
    role_repo: Arc<R>,
    session_repo: Arc<S>,
    mailer: Arc<dyn EmailSender>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<U, R, S> UserServiceImpl<U, R, S>
where
    U: UserRepository,
    R: RoleRepository,
    S: SessionRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        role_repo: Arc<R>,
        session_repo: Arc<S>,
        mailer: Arc<dyn EmailSender>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            session_repo,
            mailer,
            id_generator,
        }
    }

    /// Load a user of the tenant; users of other tenants look missing.
    async fn tenant_user(&self, company_id: i64, id: i64) -> Result<User, UserError> {
        self.user_repo
            .find_by_id(id)
            .await?
            .filter(|u| u.company_id == company_id)
            .ok_or(UserError::NotFound)
    }

    async fn view(&self, user: User) -> Result<UserView, UserError> {
        let roles = self.user_repo.role_names(user.id).await?;
        Ok(UserView {
            user,
            roles,
            permissions: Vec::new(),
        })
    }

    /// Parse role ids and check each names a role of the tenant.
    async fn resolve_roles(
        &self,
        company_id: i64,
        role_ids: &[String],
    ) -> Result<Vec<i64>, UserError> {
        let mut ids = parse_ids(role_ids, "role_ids")?;
        ids.sort_unstable();
        ids.dedup();

        let found = self.role_repo.find_by_ids(company_id, &ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|r| r.id == **id)) {
            return Err(UserError::UnknownRole(*missing));
        }
        Ok(ids)
    }

    async fn send_welcome(&self, user: &User) {
        let email = OutgoingEmail {
            to: user.email.clone(),
            subject: "Your CRM account".to_string(),
            body: format!(
                "Hello {},\n\nAn account has been created for you.\nUsername: {}\n\nPlease sign in and change your password.",
                user.full_name(),
                user.username
            ),
            attachments: Vec::new(),
        };
        if let Err(e) = self.mailer.send(email).await {
            tracing::warn!(user_id = user.id, error = %e, "Welcome email failed");
        }
    }
}

#[async_trait]
impl<U, R, S> UserService for UserServiceImpl<U, R, S>
where
    U: UserRepository + 'static,
    R: RoleRepository + 'static,
    S: SessionRepository + 'static,
{
    async fn get_me(&self, user_id: i64) -> Result<UserView, UserError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;

        let mut view = self.view(user).await?;
        let granted = self.user_repo.permission_names(user_id).await?;
        view.permissions = effective_permissions(&view.roles, granted.iter().map(String::as_str));
        Ok(view)
    }

    async fn update_me(&self, user_id: i64, update: UpdateProfileRequest) -> Result<UserView, UserError> {
        let mut user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;

        if let Some(email) = update.email {
            let email = email.trim().to_lowercase();
            if email != user.email {
                if self.user_repo.email_exists(&email).await? {
                    return Err(UserError::EmailExists);
                }
                user.email = email;
            }
        }
        if let Some(first_name) = update.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = update.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }

        let user = self.user_repo.update(&user).await?;
        self.get_me(user.id).await
    }

    async fn change_password(&self, user_id: i64, request: ChangePasswordRequest) -> Result<(), UserError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(UserError::WrongPassword);
        }

        let hash = hash_password(&request.new_password)?;
        self.user_repo.update_password(user_id, &hash).await?;
        let revoked = self.session_repo.revoke_all_for_user(user_id).await?;

        tracing::info!(user_id, revoked_sessions = revoked, "Password changed");
        Ok(())
    }

    async fn list(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<Page<UserView>, UserError> {
        let (users, total) = self.user_repo.list(company_id, search, page).await?;

        let mut views = Vec::with_capacity(users.len());
        for user in users {
            views.push(self.view(user).await?);
        }
        Ok(Page::new(views, total, page))
    }

    async fn get(&self, company_id: i64, id: i64) -> Result<UserView, UserError> {
        let user = self.tenant_user(company_id, id).await?;
        self.view(user).await
    }

    async fn create(&self, company_id: i64, request: CreateUserRequest) -> Result<UserView, UserError> {
        let email = request.email.trim().to_lowercase();
        if self.user_repo.email_exists(&email).await? {
            return Err(UserError::EmailExists);
        }
        if self.user_repo.username_exists(request.username.trim()).await? {
            return Err(UserError::UsernameExists);
        }

        let role_ids = self.resolve_roles(company_id, &request.role_ids).await?;
        let user = User {
            id: self.id_generator.generate(),
            company_id,
            username: request.username.trim().to_string(),
            email,
            password_hash: hash_password(&request.password)?,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            ..User::default()
        };

        let user = self.user_repo.create(&user, &role_ids).await?;
        tracing::info!(company_id, user_id = user.id, "User created");

        self.send_welcome(&user).await;
        self.view(user).await
    }

    async fn update(
        &self,
        company_id: i64,
        actor_id: i64,
        id: i64,
        update: UpdateUserRequest,
    ) -> Result<UserView, UserError> {
        let mut user = self.tenant_user(company_id, id).await?;

        if let Some(email) = update.email {
            let email = email.trim().to_lowercase();
            if email != user.email {
                if self.user_repo.email_exists(&email).await? {
                    return Err(UserError::EmailExists);
                }
                user.email = email;
            }
        }
        if let Some(first_name) = update.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = update.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(is_active) = update.is_active {
            if !is_active && id == actor_id {
                return Err(UserError::SelfModification("You cannot deactivate your own account"));
            }
            user.is_active = is_active;
        }

        let user = self.user_repo.update(&user).await?;
        if !user.is_active {
            self.session_repo.revoke_all_for_user(user.id).await?;
        }
        self.view(user).await
    }

    async fn set_roles(
        &self,
        company_id: i64,
        actor_id: i64,
        id: i64,
        role_ids: &[String],
    ) -> Result<UserView, UserError> {
        let user = self.tenant_user(company_id, id).await?;
        let ids = self.resolve_roles(company_id, role_ids).await?;

        if id == actor_id {
            let current = self.user_repo.role_names(id).await?;
            if current.iter().any(|r| r == roles::ADMIN) {
                let keeps_admin = self
                    .role_repo
                    .find_by_ids(company_id, &ids)
                    .await?
                    .iter()
                    .any(|r| r.is_admin());
                if !keeps_admin {
                    return Err(UserError::SelfModification(
                        "You cannot remove the Admin role from yourself",
                    ));
                }
            }
        }

        self.user_repo.set_roles(id, &ids).await?;
        self.view(user).await
    }

    async fn deactivate(&self, company_id: i64, actor_id: i64, id: i64) -> Result<(), UserError> {
        if id == actor_id {
            return Err(UserError::SelfModification("You cannot deactivate your own account"));
        }
        let mut user = self.tenant_user(company_id, id).await?;
        user.is_active = false;

        self.user_repo.update(&user).await?;
        self.session_repo.revoke_all_for_user(id).await?;

        tracing::info!(company_id, user_id = id, "User deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockRoleRepository, MockSessionRepository, MockUserRepository, Role};
    use crate::infrastructure::email::MockEmailSender;
    use mockall::predicate::*;

    fn create_test_user(id: i64, company_id: i64) -> User {
        User {
            id,
            company_id,
            username: format!("user{}", id),
            email: format!("user{}@example.com", id),
            password_hash: hash_password("old-password").unwrap(),
            ..User::default()
        }
    }

    fn create_service(
        users: MockUserRepository,
        roles: MockRoleRepository,
        sessions: MockSessionRepository,
        mailer: MockEmailSender,
    ) -> UserServiceImpl<MockUserRepository, MockRoleRepository, MockSessionRepository> {
        UserServiceImpl::new(
            Arc::new(users),
            Arc::new(roles),
            Arc::new(sessions),
            Arc::new(mailer),
            Arc::new(SnowflakeGenerator::new(1, 0)),
        )
    }

    // ==================== Tenant Isolation ====================

    #[tokio::test]
    async fn test_get_user_of_other_tenant_is_not_found() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(5))
            .returning(|_| Ok(Some(create_test_user(5, 99))));

        let service = create_service(
            users,
            MockRoleRepository::new(),
            MockSessionRepository::new(),
            MockEmailSender::new(),
        );
        let result = service.get(1, 5).await;

        assert!(matches!(result, Err(UserError::NotFound)));
    }

    // ==================== Create ====================

    #[tokio::test]
    async fn test_create_user_sends_welcome_email() {
        let mut users = MockUserRepository::new();
        users.expect_email_exists().returning(|_| Ok(false));
        users.expect_username_exists().returning(|_| Ok(false));
        users
            .expect_create()
            .withf(|u, role_ids| u.company_id == 1 && role_ids == [7])
            .times(1)
            .returning(|u, _| Ok(u.clone()));
        users
            .expect_role_names()
            .returning(|_| Ok(vec!["Sales".to_string()]));

        let mut roles = MockRoleRepository::new();
        roles
            .expect_find_by_ids()
            .withf(|company_id, ids| *company_id == 1 && ids == [7])
            .returning(|company_id, _| Ok(vec![Role::new(7, company_id, "Sales", None)]));

        let mut mailer = MockEmailSender::new();
        mailer
            .expect_send()
            .withf(|email| email.to == "new@example.com")
            .times(1)
            .returning(|_| Ok(()));

        let service = create_service(users, roles, MockSessionRepository::new(), mailer);
        let view = service
            .create(
                1,
                CreateUserRequest {
                    username: "newbie".into(),
                    email: "New@Example.com".into(),
                    password: "password123".into(),
                    first_name: None,
                    last_name: None,
                    phone: None,
                    role_ids: vec!["7".into()],
                },
            )
            .await
            .unwrap();

        assert_eq!(view.roles, vec!["Sales".to_string()]);
        assert_eq!(view.user.email, "new@example.com");
    }

    #[tokio::test]
    async fn test_create_user_with_unknown_role() {
        let mut users = MockUserRepository::new();
        users.expect_email_exists().returning(|_| Ok(false));
        users.expect_username_exists().returning(|_| Ok(false));
        users.expect_create().never();

        let mut roles = MockRoleRepository::new();
        roles.expect_find_by_ids().returning(|_, _| Ok(vec![]));

        let service = create_service(users, roles, MockSessionRepository::new(), MockEmailSender::new());
        let result = service
            .create(
                1,
                CreateUserRequest {
                    username: "newbie".into(),
                    email: "new@example.com".into(),
                    password: "password123".into(),
                    first_name: None,
                    last_name: None,
                    phone: None,
                    role_ids: vec!["42".into()],
                },
            )
            .await;

        assert!(matches!(result, Err(UserError::UnknownRole(42))));
    }

    #[tokio::test]
    async fn test_set_roles_rejects_role_of_other_tenant() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_user(id, 1))));
        users.expect_set_roles().never();

        // Role 9 belongs to tenant 2.
        let mut roles = MockRoleRepository::new();
        roles.expect_find_by_ids().returning(|company_id, _| {
            Ok(if company_id == 2 {
                vec![Role::new(9, 2, "Admin", None)]
            } else {
                vec![]
            })
        });

        let service = create_service(users, roles, MockSessionRepository::new(), MockEmailSender::new());
        let result = service.set_roles(1, 3, 5, &["9".to_string()]).await;

        assert!(matches!(result, Err(UserError::UnknownRole(9))));
    }

    // ==================== Password ====================

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_user(id, 1))));
        users.expect_update_password().times(1).returning(|_, _| Ok(()));

        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_revoke_all_for_user()
            .with(eq(3))
            .times(1)
            .returning(|_| Ok(2));

        let service = create_service(users, MockRoleRepository::new(), sessions, MockEmailSender::new());
        service
            .change_password(
                3,
                ChangePasswordRequest {
                    current_password: "old-password".into(),
                    new_password: "new-password".into(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_password_wrong_current() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_user(id, 1))));
        users.expect_update_password().never();

        let service = create_service(
            users,
            MockRoleRepository::new(),
            MockSessionRepository::new(),
            MockEmailSender::new(),
        );
        let result = service
            .change_password(
                3,
                ChangePasswordRequest {
                    current_password: "guess".into(),
                    new_password: "new-password".into(),
                },
            )
            .await;

        assert!(matches!(result, Err(UserError::WrongPassword)));
    }

    // ==================== Deactivate ====================

    #[tokio::test]
    async fn test_cannot_deactivate_self() {
        let service = create_service(
            MockUserRepository::new(),
            MockRoleRepository::new(),
            MockSessionRepository::new(),
            MockEmailSender::new(),
        );
        let result = service.deactivate(1, 3, 3).await;

        assert!(matches!(result, Err(UserError::SelfModification(_))));
    }

    #[tokio::test]
    async fn test_deactivate_revokes_sessions() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_user(id, 1))));
        users
            .expect_update()
            .withf(|u| !u.is_active)
            .times(1)
            .returning(|u| Ok(u.clone()));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_revoke_all_for_user().times(1).returning(|_| Ok(1));

        let service = create_service(users, MockRoleRepository::new(), sessions, MockEmailSender::new());
        assert!(service.deactivate(1, 3, 4).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_cannot_drop_own_admin_role() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(create_test_user(id, 1))));
        users
            .expect_role_names()
            .returning(|_| Ok(vec!["Admin".to_string()]));
        users.expect_set_roles().never();

        let mut roles = MockRoleRepository::new();
        roles
            .expect_find_by_ids()
            .returning(|company_id, _| Ok(vec![Role::new(8, company_id, "Sales", None)]));

        let service = create_service(users, roles, MockSessionRepository::new(), MockEmailSender::new());
        let result = service.set_roles(1, 3, 3, &["8".to_string()]).await;

        assert!(matches!(result, Err(UserError::SelfModification(_))));
    }
}
