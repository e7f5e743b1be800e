//! Referral reward Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::domain::aggregates::order::UnknownStatus;
use crate::domain::value_objects::UserId;

/// Reward earned by a referring client once the referred appointment happens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub user_id: UserId,
    pub appointment_id: String,
    pub referrer_id: Option<UserId>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: RewardStatus,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus { #[default] Pending, Approved, Rejected, Redeemed }

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Redeemed => "redeemed",
        }
    }
}

impl FromStr for RewardStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "redeemed" => Ok(Self::Redeemed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl Reward {
    pub fn new(user_id: UserId, appointment_id: impl Into<String>, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            user_id, appointment_id: appointment_id.into(), referrer_id: None, amount,
            status: RewardStatus::Pending, reviewed_by: None, created_at: now, updated_at: now,
        }
    }

    pub fn review(&mut self, status: RewardStatus, admin_id: impl Into<String>) {
        self.status = status;
        self.reviewed_by = Some(admin_id.into());
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub redeemed: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub approved_value: Decimal,
}

impl RewardStats {
    pub fn tally<'a>(rewards: impl IntoIterator<Item = &'a Reward>) -> Self {
        rewards.into_iter().fold(Self::default(), |mut stats, r| {
            stats.total += 1;
            match r.status {
                RewardStatus::Pending => stats.pending += 1,
                RewardStatus::Approved => {
                    stats.approved += 1;
                    stats.approved_value += r.amount;
                }
                RewardStatus::Rejected => stats.rejected += 1,
                RewardStatus::Redeemed => stats.redeemed += 1,
            }
            stats
        })
    }
}
