//! Referral reward administration.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::{Reward, RewardStats, RewardStatus, UnknownStatus, UserId};
use crate::store::{RewardRepository, StoreError};

#[derive(Error, Debug)]
pub enum RewardError {
    #[error("Invalid reward status: {0}")]
    InvalidRewardStatus(String),

    #[error("Reward not found")]
    RewardNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UnknownStatus> for RewardError {
    fn from(e: UnknownStatus) -> Self { Self::InvalidRewardStatus(e.0) }
}

#[derive(Debug, Serialize)]
pub struct RewardListing {
    pub rewards: Vec<Reward>,
    pub stats: RewardStats,
}

pub struct RewardService {
    rewards: Arc<dyn RewardRepository>,
}

impl RewardService {
    pub fn new(rewards: Arc<dyn RewardRepository>) -> Self { Self { rewards } }

    /// `filter` is a status name or `all`; stats always cover the whole collection.
    pub async fn list(&self, filter: Option<&str>) -> Result<RewardListing, RewardError> {
        let status = match filter {
            None | Some("") | Some("all") => None,
            Some(s) => Some(s.parse::<RewardStatus>()?),
        };
        let all = self.rewards.list_rewards(None).await?;
        let stats = RewardStats::tally(&all);
        let rewards = match status {
            None => all,
            Some(s) => all.into_iter().filter(|r| r.status == s).collect(),
        };
        Ok(RewardListing { rewards, stats })
    }

    pub async fn update(&self, user_id: &UserId, appointment_id: &str, status: &str, admin_id: &str) -> Result<Reward, RewardError> {
        let status: RewardStatus = status.parse()?;
        let mut reward = self.rewards.get_reward(user_id, appointment_id).await?.ok_or(RewardError::RewardNotFound)?;
        let previous = reward.status;
        reward.review(status, admin_id);
        self.rewards.save_reward(&reward).await?;
        info!(%user_id, appointment_id, admin_id, from = previous.as_str(), to = status.as_str(), "reward reviewed");
        Ok(reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    async fn seeded() -> RewardService {
        let store = Arc::new(MemoryStore::new());
        store.save_reward(&Reward::new(UserId::new("u1"), "appt-1", Decimal::new(25, 0))).await.unwrap();
        store.save_reward(&Reward::new(UserId::new("u2"), "appt-2", Decimal::new(40, 0))).await.unwrap();
        RewardService::new(store)
    }

    #[tokio::test]
    async fn review_updates_status_and_stats() {
        let svc = seeded().await;
        let reward = svc.update(&UserId::new("u1"), "appt-1", "approved", "admin-7").await.unwrap();
        assert_eq!(reward.status, RewardStatus::Approved);
        assert_eq!(reward.reviewed_by.as_deref(), Some("admin-7"));

        let approved = svc.list(Some("approved")).await.unwrap();
        assert_eq!(approved.rewards.len(), 1);
        assert_eq!(approved.stats.total, 2);
        assert_eq!(approved.stats.pending, 1);
        assert_eq!(approved.stats.approved_value, Decimal::new(25, 0));
        assert_eq!(svc.list(Some("all")).await.unwrap().rewards.len(), 2);
    }

    #[tokio::test]
    async fn rejects_unknown_status_and_missing_reward() {
        let svc = seeded().await;
        assert!(matches!(svc.update(&UserId::new("u1"), "appt-1", "paid", "a").await, Err(RewardError::InvalidRewardStatus(_))));
        assert!(matches!(svc.update(&UserId::new("u9"), "appt-1", "approved", "a").await, Err(RewardError::RewardNotFound)));
        assert!(matches!(svc.list(Some("archived")).await, Err(RewardError::InvalidRewardStatus(_))));
    }
}
