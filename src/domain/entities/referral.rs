//! Customer referrals between colleagues.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::customer::CustomerRef;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl ReferralStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A user handing a customer over to a colleague.
///
/// Maps to `user_referrals`.
#[derive(Debug, Clone, Serialize)]
pub struct UserReferral {
    pub id: i64,
    pub company_id: i64,
    pub referrer_id: i64,
    pub referred_user_id: i64,
    pub customer: CustomerRef,
    pub note: Option<String>,
    pub status: ReferralStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Which side of a referral the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralDirection {
    Sent,
    #[default]
    Received,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    async fn create(&self, referral: &UserReferral) -> Result<UserReferral, AppError>;

    async fn find_by_id(&self, company_id: i64, id: i64) -> Result<Option<UserReferral>, AppError>;

    /// Referrals sent or received by the user, newest first.
    async fn list_for_user(
        &self,
        user_id: i64,
        direction: ReferralDirection,
    ) -> Result<Vec<UserReferral>, AppError>;

    /// Set the status of a pending referral. Returns `None` when it was no
    /// longer pending.
    async fn respond(
        &self,
        id: i64,
        status: ReferralStatus,
    ) -> Result<Option<UserReferral>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [ReferralStatus::Pending, ReferralStatus::Accepted, ReferralStatus::Rejected] {
            assert_eq!(ReferralStatus::from_str(status.as_str()), status);
        }
        assert_eq!(ReferralStatus::from_str("whatever"), ReferralStatus::Pending);
    }
}
