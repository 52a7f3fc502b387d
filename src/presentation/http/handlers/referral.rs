//! Referral Handlers
//!
//! Handing a customer over to a colleague in the same company.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::parse_id;
use crate::application::dto::request::{
    CreateReferralRequest, ReferralQuery, RespondReferralRequest,
};
use crate::application::dto::response::ReferralResponse;
use crate::application::services::{ReferralService, ReferralServiceImpl};
use crate::domain::Permission;
use crate::infrastructure::repositories::{
    PgCustomerRepository, PgReferralRepository, PgUserRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn referral_service(state: &AppState) -> impl ReferralService {
    ReferralServiceImpl::new(
        Arc::new(PgReferralRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgCustomerRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

/// `?direction=sent|received`, received by default
pub async fn list_referrals(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ReferralQuery>,
) -> Result<Json<Vec<ReferralResponse>>, AppError> {
    auth.require(Permission::ReferralsUse)?;
    let referrals = referral_service(&state)
        .list(auth.user_id, query.direction.unwrap_or_default())
        .await?;
    Ok(Json(referrals.into_iter().map(Into::into).collect()))
}

pub async fn create_referral(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateReferralRequest>,
) -> Result<(StatusCode, Json<ReferralResponse>), AppError> {
    auth.require(Permission::ReferralsUse)?;
    validate(&body)?;
    let referral = referral_service(&state)
        .create(auth.company_id, auth.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(referral.into())))
}

/// Accept or reject a referral addressed to the caller
pub async fn respond_referral(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(referral_id): Path<String>,
    Json(body): Json<RespondReferralRequest>,
) -> Result<Json<ReferralResponse>, AppError> {
    auth.require(Permission::ReferralsUse)?;
    let id = parse_id(&referral_id, "referral_id")?;
    let referral = referral_service(&state)
        .respond(auth.company_id, auth.user_id, id, body.status)
        .await?;
    Ok(Json(referral.into()))
}
