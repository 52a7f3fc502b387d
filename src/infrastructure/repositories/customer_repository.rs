//! Customer Repository Implementation
//!
//! Individuals and companies share the contact tables (`customer_addresses`,
//! `customer_emails`, `customer_phones`); each contact row points at exactly
//! one owner through `individual_id` or `company_id`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    Address, ContactInfo, ContactPhone, CustomerCompany, CustomerIndividual, CustomerKind,
    CustomerRef, CustomerRepository, EmailAddress, PhoneKind,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{like_pattern, PageParams};

const IN_USE_MESSAGE: &str = "Customer is referenced by invoices and cannot be deleted";

/// Owner column of the contact tables for a customer kind.
fn owner_column(kind: CustomerKind) -> &'static str {
    match kind {
        CustomerKind::Individual => "individual_id",
        CustomerKind::Company => "company_id",
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IndividualRow {
    id: i64,
    company_id: i64,
    first_name: String,
    last_name: String,
    national_code: Option<String>,
    birth_date: Option<NaiveDate>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IndividualRow {
    fn into_individual(self, contacts: ContactInfo) -> CustomerIndividual {
        CustomerIndividual {
            id: self.id,
            company_id: self.company_id,
            first_name: self.first_name,
            last_name: self.last_name,
            national_code: self.national_code,
            birth_date: self.birth_date,
            description: self.description,
            contacts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: i64,
    company_id: i64,
    name: String,
    economic_code: Option<String>,
    national_id: Option<String>,
    registration_number: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CompanyRow {
    fn into_company(self, contacts: ContactInfo) -> CustomerCompany {
        CustomerCompany {
            id: self.id,
            company_id: self.company_id,
            name: self.name,
            economic_code: self.economic_code,
            national_id: self.national_id,
            registration_number: self.registration_number,
            description: self.description,
            contacts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i64,
    owner_id: i64,
    province: Option<String>,
    city: Option<String>,
    street: String,
    postal_code: Option<String>,
    is_primary: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct EmailRow {
    id: i64,
    owner_id: i64,
    address: String,
    is_primary: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct PhoneRow {
    id: i64,
    owner_id: i64,
    number: String,
    kind: String,
    is_primary: bool,
}

/// PostgreSQL customer repository implementation.
#[derive(Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the contact rows of many customers of one kind at once.
    async fn load_contacts(
        &self,
        kind: CustomerKind,
        ids: &[i64],
    ) -> Result<HashMap<i64, ContactInfo>, AppError> {
        let mut map: HashMap<i64, ContactInfo> = HashMap::new();
        if ids.is_empty() {
            return Ok(map);
        }
        let owner = owner_column(kind);

        let addresses = sqlx::query_as::<_, AddressRow>(&format!(
            r#"
            SELECT id, {owner} AS owner_id, province, city, street, postal_code, is_primary
            FROM customer_addresses
            WHERE {owner} = ANY($1)
            ORDER BY position
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let emails = sqlx::query_as::<_, EmailRow>(&format!(
            r#"
            SELECT id, {owner} AS owner_id, address, is_primary
            FROM customer_emails
            WHERE {owner} = ANY($1)
            ORDER BY position
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let phones = sqlx::query_as::<_, PhoneRow>(&format!(
            r#"
            SELECT id, {owner} AS owner_id, number, kind, is_primary
            FROM customer_phones
            WHERE {owner} = ANY($1)
            ORDER BY position
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        for a in addresses {
            map.entry(a.owner_id).or_default().addresses.push(Address {
                id: a.id,
                province: a.province,
                city: a.city,
                street: a.street,
                postal_code: a.postal_code,
                is_primary: a.is_primary,
            });
        }
        for e in emails {
            map.entry(e.owner_id).or_default().emails.push(EmailAddress {
                id: e.id,
                address: e.address,
                is_primary: e.is_primary,
            });
        }
        for p in phones {
            map.entry(p.owner_id).or_default().phones.push(ContactPhone {
                id: p.id,
                number: p.number,
                kind: PhoneKind::from_str(&p.kind),
                is_primary: p.is_primary,
            });
        }

        Ok(map)
    }

    async fn contacts_of(&self, kind: CustomerKind, id: i64) -> Result<ContactInfo, AppError> {
        Ok(self
            .load_contacts(kind, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default())
    }
}

/// Delete and re-insert the contact rows of one customer inside a transaction.
async fn replace_contacts(
    tx: &mut Transaction<'_, Postgres>,
    kind: CustomerKind,
    owner_id: i64,
    contacts: &ContactInfo,
) -> Result<(), AppError> {
    let owner = owner_column(kind);

    for table in ["customer_addresses", "customer_emails", "customer_phones"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE {owner} = $1"))
            .bind(owner_id)
            .execute(&mut **tx)
            .await?;
    }

    for (position, a) in contacts.addresses.iter().enumerate() {
        sqlx::query(&format!(
            r#"
            INSERT INTO customer_addresses (id, {owner}, province, city, street, postal_code,
                                            is_primary, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#
        ))
        .bind(a.id)
        .bind(owner_id)
        .bind(&a.province)
        .bind(&a.city)
        .bind(&a.street)
        .bind(&a.postal_code)
        .bind(a.is_primary)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }

    for (position, e) in contacts.emails.iter().enumerate() {
        sqlx::query(&format!(
            r#"
            INSERT INTO customer_emails (id, {owner}, address, is_primary, position)
            VALUES ($1, $2, $3, $4, $5)
            "#
        ))
        .bind(e.id)
        .bind(owner_id)
        .bind(&e.address)
        .bind(e.is_primary)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }

    for (position, p) in contacts.phones.iter().enumerate() {
        sqlx::query(&format!(
            r#"
            INSERT INTO customer_phones (id, {owner}, number, kind, is_primary, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#
        ))
        .bind(p.id)
        .bind(owner_id)
        .bind(&p.number)
        .bind(p.kind.as_str())
        .bind(p.is_primary)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn list_individuals(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<(Vec<CustomerIndividual>, i64), AppError> {
        let pattern = search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, IndividualRow>(
            r#"
            SELECT id, company_id, first_name, last_name, national_code, birth_date,
                   description, created_at, updated_at
            FROM customer_individuals
            WHERE company_id = $1
              AND ($2::TEXT IS NULL
                   OR first_name ILIKE $2 OR last_name ILIKE $2 OR national_code ILIKE $2
                   OR (first_name || ' ' || last_name) ILIKE $2)
            ORDER BY last_name, first_name, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(company_id)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM customer_individuals
            WHERE company_id = $1
              AND ($2::TEXT IS NULL
                   OR first_name ILIKE $2 OR last_name ILIKE $2 OR national_code ILIKE $2
                   OR (first_name || ' ' || last_name) ILIKE $2)
            "#,
        )
        .bind(company_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut contacts = self.load_contacts(CustomerKind::Individual, &ids).await?;

        let items = rows
            .into_iter()
            .map(|r| {
                let c = contacts.remove(&r.id).unwrap_or_default();
                r.into_individual(c)
            })
            .collect();

        Ok((items, total))
    }

    async fn find_individual(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<CustomerIndividual>, AppError> {
        let row = sqlx::query_as::<_, IndividualRow>(
            r#"
            SELECT id, company_id, first_name, last_name, national_code, birth_date,
                   description, created_at, updated_at
            FROM customer_individuals
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let contacts = self.contacts_of(CustomerKind::Individual, row.id).await?;
                Ok(Some(row.into_individual(contacts)))
            }
            None => Ok(None),
        }
    }

    async fn create_individual(
        &self,
        customer: &CustomerIndividual,
    ) -> Result<CustomerIndividual, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, IndividualRow>(
            r#"
            INSERT INTO customer_individuals (id, company_id, first_name, last_name,
                                              national_code, birth_date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, company_id, first_name, last_name, national_code, birth_date,
                      description, created_at, updated_at
            "#,
        )
        .bind(customer.id)
        .bind(customer.company_id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.national_code)
        .bind(customer.birth_date)
        .bind(&customer.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "A customer with this national code already exists")
        })?;

        replace_contacts(&mut tx, CustomerKind::Individual, row.id, &customer.contacts).await?;
        tx.commit().await?;

        Ok(row.into_individual(customer.contacts.clone()))
    }

    async fn update_individual(
        &self,
        customer: &CustomerIndividual,
    ) -> Result<CustomerIndividual, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, IndividualRow>(
            r#"
            UPDATE customer_individuals
            SET first_name = $3, last_name = $4, national_code = $5, birth_date = $6,
                description = $7, updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, first_name, last_name, national_code, birth_date,
                      description, created_at, updated_at
            "#,
        )
        .bind(customer.company_id)
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.national_code)
        .bind(customer.birth_date)
        .bind(&customer.description)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "A customer with this national code already exists")
        })?
        .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;

        replace_contacts(&mut tx, CustomerKind::Individual, row.id, &customer.contacts).await?;
        tx.commit().await?;

        Ok(row.into_individual(customer.contacts.clone()))
    }

    async fn delete_individual(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM customer_individuals WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_foreign_key_violation(e, IN_USE_MESSAGE))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Customer not found".into()));
        }
        Ok(())
    }

    async fn list_companies(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<(Vec<CustomerCompany>, i64), AppError> {
        let pattern = search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT id, company_id, name, economic_code, national_id, registration_number,
                   description, created_at, updated_at
            FROM customer_companies
            WHERE company_id = $1
              AND ($2::TEXT IS NULL
                   OR name ILIKE $2 OR national_id ILIKE $2 OR economic_code ILIKE $2)
            ORDER BY name, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(company_id)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM customer_companies
            WHERE company_id = $1
              AND ($2::TEXT IS NULL
                   OR name ILIKE $2 OR national_id ILIKE $2 OR economic_code ILIKE $2)
            "#,
        )
        .bind(company_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut contacts = self.load_contacts(CustomerKind::Company, &ids).await?;

        let items = rows
            .into_iter()
            .map(|r| {
                let c = contacts.remove(&r.id).unwrap_or_default();
                r.into_company(c)
            })
            .collect();

        Ok((items, total))
    }

    async fn find_company(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<CustomerCompany>, AppError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT id, company_id, name, economic_code, national_id, registration_number,
                   description, created_at, updated_at
            FROM customer_companies
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let contacts = self.contacts_of(CustomerKind::Company, row.id).await?;
                Ok(Some(row.into_company(contacts)))
            }
            None => Ok(None),
        }
    }

    async fn create_company(&self, customer: &CustomerCompany) -> Result<CustomerCompany, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            INSERT INTO customer_companies (id, company_id, name, economic_code, national_id,
                                            registration_number, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, company_id, name, economic_code, national_id, registration_number,
                      description, created_at, updated_at
            "#,
        )
        .bind(customer.id)
        .bind(customer.company_id)
        .bind(&customer.name)
        .bind(&customer.economic_code)
        .bind(&customer.national_id)
        .bind(&customer.registration_number)
        .bind(&customer.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "A company with this national id already exists")
        })?;

        replace_contacts(&mut tx, CustomerKind::Company, row.id, &customer.contacts).await?;
        tx.commit().await?;

        Ok(row.into_company(customer.contacts.clone()))
    }

    async fn update_company(&self, customer: &CustomerCompany) -> Result<CustomerCompany, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            UPDATE customer_companies
            SET name = $3, economic_code = $4, national_id = $5, registration_number = $6,
                description = $7, updated_at = NOW()
            WHERE company_id = $1 AND id = $2
            RETURNING id, company_id, name, economic_code, national_id, registration_number,
                      description, created_at, updated_at
            "#,
        )
        .bind(customer.company_id)
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.economic_code)
        .bind(&customer.national_id)
        .bind(&customer.registration_number)
        .bind(&customer.description)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "A company with this national id already exists")
        })?
        .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;

        replace_contacts(&mut tx, CustomerKind::Company, row.id, &customer.contacts).await?;
        tx.commit().await?;

        Ok(row.into_company(customer.contacts.clone()))
    }

    async fn delete_company(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM customer_companies WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_foreign_key_violation(e, IN_USE_MESSAGE))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Customer not found".into()));
        }
        Ok(())
    }

    async fn exists(&self, company_id: i64, customer: CustomerRef) -> Result<bool, AppError> {
        let table = match customer.kind {
            CustomerKind::Individual => "customer_individuals",
            CustomerKind::Company => "customer_companies",
        };
        let found = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE company_id = $1 AND id = $2)"
        ))
        .bind(company_id)
        .bind(customer.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }
}
