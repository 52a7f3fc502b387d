//! Role Service
//!
//! Role CRUD and permission grants, always within the caller's tenant. The
//! `Admin` role cannot be renamed, deleted or have its grants changed; it
//! implicitly holds every permission.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::request::{CreateRoleRequest, UpdateRoleRequest};
use crate::domain::{Permission, PermissionRecord, Role, RoleRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// A role and the permission names granted to it.
#[derive(Debug, Clone)]
pub struct RoleView {
    pub role: Role,
    pub permissions: Vec<String>,
}

/// Role service errors
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("Role not found")]
    NotFound,

    #[error("The Admin role cannot be modified")]
    AdminProtected,

    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    #[error("Role name already exists")]
    NameExists,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<RoleError> for AppError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::NotFound => AppError::NotFound("Role not found".into()),
            RoleError::AdminProtected => {
                AppError::Forbidden("The Admin role cannot be modified".into())
            }
            RoleError::UnknownPermission(name) => {
                AppError::validation(format!("permissions: unknown permission '{}'", name))
            }
            RoleError::NameExists => AppError::Conflict("Role name already exists".into()),
            RoleError::Repository(e) => e,
        }
    }
}

/// Check every name against the permission catalogue; returns them sorted
/// and deduplicated.
pub fn validate_permissions(names: &[String]) -> Result<Vec<String>, RoleError> {
    let mut valid = names
        .iter()
        .map(|name| {
            Permission::parse(name.trim())
                .map(|p| p.as_str().to_string())
                .ok_or_else(|| RoleError::UnknownPermission(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    valid.sort();
    valid.dedup();
    Ok(valid)
}

#[async_trait]
pub trait RoleService: Send + Sync {
    async fn list(&self, company_id: i64) -> Result<Vec<RoleView>, RoleError>;

    async fn get(&self, company_id: i64, id: i64) -> Result<RoleView, RoleError>;

    async fn create(
        &self,
        company_id: i64,
        request: CreateRoleRequest,
    ) -> Result<RoleView, RoleError>;

    async fn update(
        &self,
        company_id: i64,
        id: i64,
        update: UpdateRoleRequest,
    ) -> Result<RoleView, RoleError>;

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), RoleError>;

    async fn set_permissions(
        &self,
        company_id: i64,
        id: i64,
        permissions: &[String],
    ) -> Result<RoleView, RoleError>;

    /// The permission catalogue.
    async fn permissions(&self) -> Result<Vec<PermissionRecord>, RoleError>;
}

pub struct RoleServiceImpl<R: RoleRepository> {
    role_repo: Arc<R>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R: RoleRepository> RoleServiceImpl<R> {
    pub fn new(role_repo: Arc<R>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            role_repo,
            id_generator,
        }
    }

    async fn find(&self, company_id: i64, id: i64) -> Result<Role, RoleError> {
        self.role_repo
            .find_by_id(company_id, id)
            .await?
            .ok_or(RoleError::NotFound)
    }

    async fn view(&self, role: Role) -> Result<RoleView, RoleError> {
        let permissions = if role.is_admin() {
            Permission::ALL.iter().map(|p| p.as_str().to_string()).collect()
        } else {
            self.role_repo.permissions_of(role.id).await?
        };
        Ok(RoleView { role, permissions })
    }

    async fn ensure_name_free(
        &self,
        company_id: i64,
        name: &str,
        except: Option<i64>,
    ) -> Result<(), RoleError> {
        match self.role_repo.find_by_name(company_id, name).await? {
            Some(existing) if Some(existing.id) != except => Err(RoleError::NameExists),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<R: RoleRepository + 'static> RoleService for RoleServiceImpl<R> {
    async fn list(&self, company_id: i64) -> Result<Vec<RoleView>, RoleError> {
        let roles = self.role_repo.list(company_id).await?;
        let mut views = Vec::with_capacity(roles.len());
        for role in roles {
            views.push(self.view(role).await?);
        }
        Ok(views)
    }

    async fn get(&self, company_id: i64, id: i64) -> Result<RoleView, RoleError> {
        let role = self.find(company_id, id).await?;
        self.view(role).await
    }

    async fn create(
        &self,
        company_id: i64,
        request: CreateRoleRequest,
    ) -> Result<RoleView, RoleError> {
        let permissions = validate_permissions(&request.permissions)?;
        let name = request.name.trim().to_string();
        self.ensure_name_free(company_id, &name, None).await?;

        let role = Role::new(self.id_generator.generate(), company_id, name, request.description);
        let role = self.role_repo.create(&role, &permissions).await?;

        tracing::info!(role_id = role.id, role = %role.name, "Role created");
        Ok(RoleView { role, permissions })
    }

    async fn update(
        &self,
        company_id: i64,
        id: i64,
        update: UpdateRoleRequest,
    ) -> Result<RoleView, RoleError> {
        let mut role = self.find(company_id, id).await?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name != role.name {
                if role.is_admin() {
                    return Err(RoleError::AdminProtected);
                }
                self.ensure_name_free(company_id, &name, Some(id)).await?;
                role.name = name;
            }
        }
        if let Some(description) = update.description {
            role.description = description;
        }

        let role = self.role_repo.update(&role).await?;
        self.view(role).await
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<(), RoleError> {
        let role = self.find(company_id, id).await?;
        if role.is_admin() {
            return Err(RoleError::AdminProtected);
        }
        self.role_repo.delete(company_id, id).await?;
        tracing::info!(role_id = id, company_id, "Role deleted");
        Ok(())
    }

    async fn set_permissions(
        &self,
        company_id: i64,
        id: i64,
        permissions: &[String],
    ) -> Result<RoleView, RoleError> {
        let role = self.find(company_id, id).await?;
        if role.is_admin() {
            return Err(RoleError::AdminProtected);
        }
        let permissions = validate_permissions(permissions)?;

        self.role_repo.set_permissions(role.id, &permissions).await?;
        self.view(role).await
    }

    async fn permissions(&self) -> Result<Vec<PermissionRecord>, RoleError> {
        Ok(self.role_repo.list_permissions().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockRoleRepository;
    use mockall::predicate::*;

    fn create_service(repo: MockRoleRepository) -> RoleServiceImpl<MockRoleRepository> {
        RoleServiceImpl::new(Arc::new(repo), Arc::new(SnowflakeGenerator::new(1, 0)))
    }

    #[test]
    fn test_validate_permissions() {
        let names = vec![
            "invoices.read".to_string(),
            "customers.read".to_string(),
            "invoices.read".to_string(),
        ];
        assert_eq!(
            validate_permissions(&names).unwrap(),
            vec!["customers.read".to_string(), "invoices.read".to_string()]
        );

        let bad = vec!["invoices.fly".to_string()];
        assert!(matches!(
            validate_permissions(&bad),
            Err(RoleError::UnknownPermission(name)) if name == "invoices.fly"
        ));
    }

    // ==== Admin protection ====

    #[tokio::test]
    async fn test_admin_role_cannot_be_deleted() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_id()
            .returning(|company_id, id| Ok(Some(Role::new(id, company_id, "Admin", None))));
        repo.expect_delete().never();

        let result = create_service(repo).delete(1, 1).await;
        assert!(matches!(result, Err(RoleError::AdminProtected)));
    }

    #[tokio::test]
    async fn test_admin_role_cannot_be_renamed() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_id()
            .returning(|company_id, id| Ok(Some(Role::new(id, company_id, "Admin", None))));

        let result = create_service(repo)
            .update(
                1,
                1,
                UpdateRoleRequest {
                    name: Some("Root".into()),
                    description: None,
                },
            )
            .await;
        assert!(matches!(result, Err(RoleError::AdminProtected)));
    }

    #[tokio::test]
    async fn test_admin_grants_cannot_be_replaced() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_id()
            .returning(|company_id, id| Ok(Some(Role::new(id, company_id, "Admin", None))));
        repo.expect_set_permissions().never();

        let result = create_service(repo)
            .set_permissions(1, 1, &["customers.read".to_string()])
            .await;
        assert!(matches!(result, Err(RoleError::AdminProtected)));
    }

    #[tokio::test]
    async fn test_admin_view_lists_every_permission() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_id()
            .returning(|company_id, id| Ok(Some(Role::new(id, company_id, "Admin", None))));
        repo.expect_permissions_of().never();

        let view = create_service(repo).get(1, 1).await.unwrap();
        assert_eq!(view.permissions.len(), Permission::ALL.len());
    }

    // ==== Tenant isolation ====

    /// Repository holding role 555 for tenant 1 only.
    fn repo_with_tenant_role() -> MockRoleRepository {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_id().returning(|company_id, id| {
            Ok((company_id == 1 && id == 555).then(|| Role::new(555, 1, "Manager", None)))
        });
        repo
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_delete_role() {
        let mut repo = repo_with_tenant_role();
        repo.expect_delete().never();

        let result = create_service(repo).delete(2, 555).await;
        assert!(matches!(result, Err(RoleError::NotFound)));
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_modify_role() {
        let mut repo = repo_with_tenant_role();
        repo.expect_update().never();
        repo.expect_set_permissions().never();
        let service = create_service(repo);

        let renamed = service
            .update(
                2,
                555,
                UpdateRoleRequest {
                    name: Some("Owner".into()),
                    description: None,
                },
            )
            .await;
        assert!(matches!(renamed, Err(RoleError::NotFound)));

        let regranted = service
            .set_permissions(2, 555, &["users.write".to_string()])
            .await;
        assert!(matches!(regranted, Err(RoleError::NotFound)));

        assert!(matches!(service.get(2, 555).await, Err(RoleError::NotFound)));
    }

    #[tokio::test]
    async fn test_owner_tenant_can_delete_role() {
        let mut repo = repo_with_tenant_role();
        repo.expect_delete()
            .with(eq(1), eq(555))
            .times(1)
            .returning(|_, _| Ok(()));

        create_service(repo).delete(1, 555).await.unwrap();
    }

    // ==== Create ====

    #[tokio::test]
    async fn test_create_role_with_duplicate_name() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_name()
            .with(eq(7), eq("Support"))
            .returning(|company_id, name| Ok(Some(Role::new(9, company_id, name, None))));
        repo.expect_create().never();

        let result = create_service(repo)
            .create(
                7,
                CreateRoleRequest {
                    name: "Support".into(),
                    description: None,
                    permissions: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(RoleError::NameExists)));
    }

    #[tokio::test]
    async fn test_create_role_grants_permissions_atomically() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_name().returning(|_, _| Ok(None));
        repo.expect_create()
            .withf(|role, perms| role.company_id == 7 && perms == ["customers.read".to_string()])
            .times(1)
            .returning(|r, _| Ok(r.clone()));
        repo.expect_set_permissions().never();

        let view = create_service(repo)
            .create(
                7,
                CreateRoleRequest {
                    name: "Support".into(),
                    description: Some("Helpdesk".into()),
                    permissions: vec!["customers.read".into()],
                },
            )
            .await
            .unwrap();
        assert_eq!(view.role.name, "Support");
        assert_eq!(view.role.company_id, 7);
        assert_eq!(view.permissions, vec!["customers.read".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_grants() {
        let mut repo = MockRoleRepository::new();
        repo.expect_find_by_name().returning(|_, _| Ok(None));
        repo.expect_create()
            .returning(|_, _| Err(AppError::Conflict("A role with this name already exists".into())));
        repo.expect_set_permissions().never();

        let result = create_service(repo)
            .create(
                7,
                CreateRoleRequest {
                    name: "Support".into(),
                    description: None,
                    permissions: vec!["customers.read".into()],
                },
            )
            .await;
        assert!(matches!(result, Err(RoleError::Repository(AppError::Conflict(_)))));
    }
}
