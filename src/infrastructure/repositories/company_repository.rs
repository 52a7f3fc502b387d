//! Main company (tenant) repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::role_repository::insert_role;
use super::user_repository::insert_user;
use crate::domain::{CompanyRepository, MainCompany, RoleSeed, User};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: i64,
    name: String,
    economic_code: Option<String>,
    national_id: Option<String>,
    registration_number: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    logo_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CompanyRow {
    fn into_company(self) -> MainCompany {
        MainCompany {
            id: self.id,
            name: self.name,
            economic_code: self.economic_code,
            national_id: self.national_id,
            registration_number: self.registration_number,
            phone: self.phone,
            address: self.address,
            postal_code: self.postal_code,
            logo_url: self.logo_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCompanyRepository {
    pool: PgPool,
}

impl PgCompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyRepository for PgCompanyRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<MainCompany>, AppError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT id, name, economic_code, national_id, registration_number, phone,
                   address, postal_code, logo_url, created_at, updated_at
            FROM main_companies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_company()))
    }

    async fn update(&self, company: &MainCompany) -> Result<MainCompany, AppError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            UPDATE main_companies
            SET name = $2, economic_code = $3, national_id = $4, registration_number = $5,
                phone = $6, address = $7, postal_code = $8, logo_url = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, economic_code, national_id, registration_number, phone,
                      address, postal_code, logo_url, created_at, updated_at
            "#,
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(&company.economic_code)
        .bind(&company.national_id)
        .bind(&company.registration_number)
        .bind(&company.phone)
        .bind(&company.address)
        .bind(&company.postal_code)
        .bind(&company.logo_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".into()))?;

        Ok(row.into_company())
    }

    async fn create_with_owner(
        &self,
        company: &MainCompany,
        owner: &User,
        roles: &[RoleSeed],
        owner_role: &str,
    ) -> Result<(MainCompany, User), AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            INSERT INTO main_companies (id, name, economic_code, national_id, registration_number,
                                        phone, address, postal_code, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, economic_code, national_id, registration_number, phone,
                      address, postal_code, logo_url, created_at, updated_at
            "#,
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(&company.economic_code)
        .bind(&company.national_id)
        .bind(&company.registration_number)
        .bind(&company.phone)
        .bind(&company.address)
        .bind(&company.postal_code)
        .bind(&company.logo_url)
        .fetch_one(&mut *tx)
        .await?;

        let mut owner_role_id = None;
        for seed in roles {
            let role = insert_role(&mut tx, &seed.role, &seed.permissions).await?;
            if role.name == owner_role {
                owner_role_id = Some(role.id);
            }
        }
        let role_id = owner_role_id
            .ok_or_else(|| AppError::Internal(format!("Role '{}' is not among the seeds", owner_role)))?;

        let user = insert_user(&mut tx, owner, &[role_id]).await?;

        tx.commit().await?;
        Ok((row.into_company(), user))
    }
}
