//! Referral Service
//!
//! A user hands a customer over to a colleague of the same tenant, who then
//! accepts or rejects it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::request::CreateReferralRequest;
use crate::application::dto::{parse_customer_ref, parse_id};
use crate::domain::{
    CustomerRepository, ReferralDirection, ReferralRepository, ReferralStatus, UserReferral,
    UserRepository,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("Referral not found")]
    NotFound,

    #[error("You cannot refer a customer to yourself")]
    SelfReferral,

    #[error("referred_user_id: unknown or inactive user")]
    UnknownUser,

    #[error("customer_id: customer does not exist")]
    CustomerNotFound,

    #[error("Only the referred user can respond")]
    NotRecipient,

    #[error("status: a response must be 'accepted' or 'rejected'")]
    InvalidResponse,

    #[error("This referral has already been answered")]
    AlreadyAnswered,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ReferralError> for AppError {
    fn from(err: ReferralError) -> Self {
        match err {
            ReferralError::NotFound => AppError::NotFound("Referral not found".into()),
            e @ (ReferralError::SelfReferral
            | ReferralError::UnknownUser
            | ReferralError::CustomerNotFound
            | ReferralError::InvalidResponse) => AppError::validation(e.to_string()),
            e @ ReferralError::NotRecipient => AppError::Forbidden(e.to_string()),
            e @ ReferralError::AlreadyAnswered => AppError::Conflict(e.to_string()),
            ReferralError::Repository(e) => e,
        }
    }
}

#[async_trait]
pub trait ReferralService: Send + Sync {
    async fn create(
        &self,
        company_id: i64,
        referrer_id: i64,
        request: CreateReferralRequest,
    ) -> Result<UserReferral, ReferralError>;

    async fn list(&self, user_id: i64, direction: ReferralDirection) -> Result<Vec<UserReferral>, ReferralError>;

    async fn respond(
        &self,
        company_id: i64,
        user_id: i64,
        id: i64,
        status: ReferralStatus,
    ) -> Result<UserReferral, ReferralError>;
}

pub struct ReferralServiceImpl<R, U, C>
where
    R: ReferralRepository,
    U: UserRepository,
    C: CustomerRepository,
{
    referral_repo: Arc<R>,
    user_repo: Arc<U>,
    customer_repo: Arc<C>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R, U, C> ReferralServiceImpl<R, U, C>
where
    R: ReferralRepository,
    U: UserRepository,
    C: CustomerRepository,
{
    pub fn new(
        referral_repo: Arc<R>,
        user_repo: Arc<U>,
        customer_repo: Arc<C>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            referral_repo,
            user_repo,
            customer_repo,
            id_generator,
        }
    }
}

#[async_trait]
impl<R, U, C> ReferralService for ReferralServiceImpl<R, U, C>
where
    R: ReferralRepository + 'static,
    U: UserRepository + 'static,
    C: CustomerRepository + 'static,
{
    async fn create(
        &self,
        company_id: i64,
        referrer_id: i64,
        request: CreateReferralRequest,
    ) -> Result<UserReferral, ReferralError> {
        let referred_user_id = parse_id(&request.referred_user_id, "referred_user_id")?;
        if referred_user_id == referrer_id {
            return Err(ReferralError::SelfReferral);
        }

        let active = self
            .user_repo
            .active_ids_in_company(company_id, &[referred_user_id])
            .await?;
        if !active.contains(&referred_user_id) {
            return Err(ReferralError::UnknownUser);
        }

        let customer = parse_customer_ref(&request.customer_kind, &request.customer_id)?;
        if !self.customer_repo.exists(company_id, customer).await? {
            return Err(ReferralError::CustomerNotFound);
        }

        let referral = UserReferral {
            id: self.id_generator.generate(),
            company_id,
            referrer_id,
            referred_user_id,
            customer,
            note: request
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            status: ReferralStatus::Pending,
            responded_at: None,
            created_at: Utc::now(),
        };

        let referral = self.referral_repo.create(&referral).await?;
        tracing::info!(company_id, referral_id = referral.id, referred_user_id, "Customer referred");
        Ok(referral)
    }

    async fn list(&self, user_id: i64, direction: ReferralDirection) -> Result<Vec<UserReferral>, ReferralError> {
        Ok(self.referral_repo.list_for_user(user_id, direction).await?)
    }

    async fn respond(
        &self,
        company_id: i64,
        user_id: i64,
        id: i64,
        status: ReferralStatus,
    ) -> Result<UserReferral, ReferralError> {
        if status == ReferralStatus::Pending {
            return Err(ReferralError::InvalidResponse);
        }

        let referral = self
            .referral_repo
            .find_by_id(company_id, id)
            .await?
            .ok_or(ReferralError::NotFound)?;
        if referral.referred_user_id != user_id {
            return Err(ReferralError::NotRecipient);
        }

        self.referral_repo
            .respond(id, status)
            .await?
            .ok_or(ReferralError::AlreadyAnswered)
    }
}
