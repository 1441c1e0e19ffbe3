use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{Transaction, TransactionType};
use crate::db::repository::{RepositoryError, WasteRepository};

#[derive(Clone)]
pub struct RewardService {
    repository: Arc<dyn WasteRepository>,
}

impl RewardService {
    pub fn new(repository: Arc<dyn WasteRepository>) -> Self {
        Self { repository }
    }

    pub async fn award(
        &self,
        user_id: Uuid,
        kind: TransactionType,
        points: i64,
        description: &str,
    ) -> Result<Transaction, RepositoryError> {
        let transaction = Transaction::new(user_id, kind, points, description.to_string());
        self.repository.record_transaction(&transaction).await?;
        log::info!("Awarded {} points to {} ({})", points, user_id, kind.as_str());
        Ok(transaction)
    }

    /// Earned minus redeemed, never below zero.
    pub async fn balance(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        let transactions = self.repository.transactions_for_user(user_id).await?;
        let balance = transactions.iter().fold(0i64, |total, t| {
            if t.kind.is_earning() {
                total + t.amount
            } else {
                total - t.amount
            }
        });
        Ok(balance.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_repository::MemoryRepository;

    #[tokio::test]
    async fn balance_is_earned_minus_redeemed() {
        let rewards = RewardService::new(Arc::new(MemoryRepository::new()));
        let user_id = Uuid::new_v4();
        rewards
            .award(user_id, TransactionType::EarnedReport, 10, "report")
            .await
            .unwrap();
        rewards
            .award(user_id, TransactionType::EarnedCollect, 20, "collect")
            .await
            .unwrap();
        rewards
            .award(user_id, TransactionType::Redeemed, 5, "voucher")
            .await
            .unwrap();

        assert_eq!(rewards.balance(user_id).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn balance_never_goes_negative() {
        let rewards = RewardService::new(Arc::new(MemoryRepository::new()));
        let user_id = Uuid::new_v4();
        rewards
            .award(user_id, TransactionType::Redeemed, 50, "voucher")
            .await
            .unwrap();

        assert_eq!(rewards.balance(user_id).await.unwrap(), 0);
        assert_eq!(rewards.balance(Uuid::new_v4()).await.unwrap(), 0);
    }
}
