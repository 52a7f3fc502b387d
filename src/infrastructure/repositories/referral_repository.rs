//! Referral Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{CustomerRef, ReferralDirection, ReferralRepository, ReferralStatus, UserReferral};
use crate::shared::error::AppError;

const REFERRAL_COLUMNS: &str = "id, company_id, referrer_id, referred_user_id, \
                                customer_individual_id, customer_company_id, note, status, \
                                responded_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: i64,
    company_id: i64,
    referrer_id: i64,
    referred_user_id: i64,
    customer_individual_id: Option<i64>,
    customer_company_id: Option<i64>,
    note: Option<String>,
    status: String,
    responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ReferralRow {
    fn into_referral(self) -> Result<UserReferral, AppError> {
        let customer = CustomerRef::from_columns(self.customer_individual_id, self.customer_company_id)
            .ok_or_else(|| AppError::Internal(format!("Referral {} has no customer", self.id)))?;

        Ok(UserReferral {
            id: self.id,
            company_id: self.company_id,
            referrer_id: self.referrer_id,
            referred_user_id: self.referred_user_id,
            customer,
            note: self.note,
            status: ReferralStatus::from_str(&self.status),
            responded_at: self.responded_at,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL referral repository implementation.
#[derive(Clone)]
pub struct PgReferralRepository {
    pool: PgPool,
}

impl PgReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralRepository for PgReferralRepository {
    async fn create(&self, referral: &UserReferral) -> Result<UserReferral, AppError> {
        let (individual_id, customer_company_id) = referral.customer.columns();

        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            r#"
            INSERT INTO user_referrals (id, company_id, referrer_id, referred_user_id,
                                        customer_individual_id, customer_company_id, note, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {REFERRAL_COLUMNS}
            "#
        ))
        .bind(referral.id)
        .bind(referral.company_id)
        .bind(referral.referrer_id)
        .bind(referral.referred_user_id)
        .bind(individual_id)
        .bind(customer_company_id)
        .bind(&referral.note)
        .bind(referral.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.into_referral()
    }

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<UserReferral>, AppError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM user_referrals WHERE company_id = $1 AND id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_referral()).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        direction: ReferralDirection,
    ) -> Result<Vec<UserReferral>, AppError> {
        let column = match direction {
            ReferralDirection::Sent => "referrer_id",
            ReferralDirection::Received => "referred_user_id",
        };

        let rows = sqlx::query_as::<_, ReferralRow>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM user_referrals WHERE {column} = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_referral()).collect()
    }

    async fn respond(
        &self,
        id: i64,
        status: ReferralStatus,
    ) -> Result<Option<UserReferral>, AppError> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!(
            r#"
            UPDATE user_referrals
            SET status = $2, responded_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {REFERRAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_referral()).transpose()
    }
}
