//! Startup seeding.
//!
//! Inserts the permission catalogue, and optionally a bootstrap tenant with
//! its built-in roles and first admin when the database holds no users.
//! Every step is idempotent so it runs on each boot.

use std::sync::Arc;

use crate::application::services::auth_service::hash_password;
use crate::config::SeedSettings;
use crate::domain::{
    roles, CompanyRepository, MainCompany, Permission, PermissionRecord, RoleRepository, RoleSeed,
    User, UserRepository,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// What a seeding run produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// Roles created for the bootstrap tenant.
    pub roles: Vec<String>,
    pub admin_created: bool,
}

pub struct Seeder<R, U, C>
where
    R: RoleRepository,
    U: UserRepository,
    C: CompanyRepository,
{
    role_repo: Arc<R>,
    user_repo: Arc<U>,
    company_repo: Arc<C>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R, U, C> Seeder<R, U, C>
where
    R: RoleRepository,
    U: UserRepository,
    C: CompanyRepository,
{
    pub fn new(
        role_repo: Arc<R>,
        user_repo: Arc<U>,
        company_repo: Arc<C>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            role_repo,
            user_repo,
            company_repo,
            id_generator,
        }
    }

    pub async fn run(&self, settings: &SeedSettings) -> Result<SeedReport, AppError> {
        let mut report = SeedReport::default();
        if !settings.enabled {
            tracing::debug!("Seeding disabled");
            return Ok(report);
        }

        let catalogue: Vec<PermissionRecord> = Permission::ALL
            .iter()
            .map(|p| PermissionRecord {
                name: p.as_str().to_string(),
                description: Some(p.description().to_string()),
            })
            .collect();
        self.role_repo.seed_permissions(&catalogue).await?;

        if let Some(created) = self.seed_admin(settings).await? {
            report.roles = created;
            report.admin_created = true;
        }

        tracing::info!(
            permissions = catalogue.len(),
            roles = report.roles.len(),
            admin_created = report.admin_created,
            "Seeding complete"
        );
        Ok(report)
    }

    /// Returns the names of the roles created with the bootstrap tenant.
    async fn seed_admin(&self, settings: &SeedSettings) -> Result<Option<Vec<String>>, AppError> {
        let email = settings.admin_email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(None);
        }
        if self.user_repo.count().await? > 0 {
            tracing::debug!("Users exist, skipping bootstrap admin");
            return Ok(None);
        }
        if settings.admin_password.len() < 8 {
            return Err(AppError::Internal(
                "seed.admin_password must be at least 8 characters".into(),
            ));
        }

        let password_hash = hash_password(&settings.admin_password)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let company = MainCompany::new(self.id_generator.generate(), settings.company_name.trim());
        let admin = User {
            id: self.id_generator.generate(),
            company_id: company.id,
            username: settings.admin_username.trim().to_string(),
            email,
            password_hash,
            ..User::default()
        };

        let seeds = RoleSeed::builtin(company.id, || self.id_generator.generate());
        let (company, admin) = self
            .company_repo
            .create_with_owner(&company, &admin, &seeds, roles::ADMIN)
            .await?;
        tracing::warn!(
            company_id = company.id,
            user_id = admin.id,
            email = %admin.email,
            "Bootstrap admin created; change its password"
        );
        Ok(Some(seeds.into_iter().map(|s| s.role.name).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockCompanyRepository, MockRoleRepository, MockUserRepository};

    fn create_test_settings(admin_email: &str) -> SeedSettings {
        SeedSettings {
            enabled: true,
            company_name: "Acme".into(),
            admin_email: admin_email.into(),
            admin_username: "admin".into(),
            admin_password: "change-me-now".into(),
        }
    }

    fn role_repo_accepting_seeds() -> MockRoleRepository {
        let mut roles = MockRoleRepository::new();
        roles
            .expect_seed_permissions()
            .withf(|records| records.len() == Permission::ALL.len())
            .times(1)
            .returning(|_| Ok(()));
        roles
    }

    fn create_seeder(
        roles: MockRoleRepository,
        users: MockUserRepository,
        companies: MockCompanyRepository,
    ) -> Seeder<MockRoleRepository, MockUserRepository, MockCompanyRepository> {
        Seeder::new(
            Arc::new(roles),
            Arc::new(users),
            Arc::new(companies),
            Arc::new(SnowflakeGenerator::new(1, 0)),
        )
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let mut settings = create_test_settings("admin@acme.test");
        settings.enabled = false;

        let report = create_seeder(
            MockRoleRepository::new(),
            MockUserRepository::new(),
            MockCompanyRepository::new(),
        )
        .run(&settings)
        .await
        .unwrap();
        assert_eq!(report, SeedReport::default());
    }

    #[tokio::test]
    async fn test_seeds_catalogue_without_admin() {
        let mut companies = MockCompanyRepository::new();
        companies.expect_create_with_owner().never();

        let report = create_seeder(role_repo_accepting_seeds(), MockUserRepository::new(), companies)
            .run(&create_test_settings(""))
            .await
            .unwrap();

        assert!(report.roles.is_empty());
        assert!(!report.admin_created);
    }

    #[tokio::test]
    async fn test_creates_admin_on_empty_database() {
        let mut users = MockUserRepository::new();
        users.expect_count().returning(|| Ok(0));
        let mut companies = MockCompanyRepository::new();
        companies
            .expect_create_with_owner()
            .withf(|company, owner, seeds, role| {
                company.name == "Acme"
                    && owner.email == "admin@acme.test"
                    && owner.company_id == company.id
                    && owner.password_hash.starts_with("$argon2")
                    && role == "Admin"
                    && seeds.iter().all(|s| s.role.company_id == company.id)
            })
            .times(1)
            .returning(|c, u, _, _| Ok((c.clone(), u.clone())));

        let report = create_seeder(role_repo_accepting_seeds(), users, companies)
            .run(&create_test_settings(" Admin@Acme.test "))
            .await
            .unwrap();
        assert!(report.admin_created);
        assert_eq!(report.roles, vec!["Admin", "Manager", "Sales"]);
    }

    #[tokio::test]
    async fn test_admin_role_gets_every_permission() {
        let mut users = MockUserRepository::new();
        users.expect_count().returning(|| Ok(0));
        let mut companies = MockCompanyRepository::new();
        companies
            .expect_create_with_owner()
            .withf(|_, _, seeds, _| {
                seeds
                    .iter()
                    .filter(|s| s.role.is_admin())
                    .all(|s| s.permissions.len() == Permission::ALL.len())
            })
            .times(1)
            .returning(|c, u, _, _| Ok((c.clone(), u.clone())));

        create_seeder(role_repo_accepting_seeds(), users, companies)
            .run(&create_test_settings("admin@acme.test"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_skips_admin_when_users_exist() {
        let mut users = MockUserRepository::new();
        users.expect_count().returning(|| Ok(3));
        let mut companies = MockCompanyRepository::new();
        companies.expect_create_with_owner().never();

        let report = create_seeder(role_repo_accepting_seeds(), users, companies)
            .run(&create_test_settings("admin@acme.test"))
            .await
            .unwrap();
        assert!(!report.admin_created);
    }
}
