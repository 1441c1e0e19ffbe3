use async_trait::async_trait;
use uuid::Uuid;

use super::models::{NewReport, Report, Transaction, User};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// Storage for users, reports and reward transactions.
#[async_trait]
pub trait WasteRepository: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn create_report(&self, report: NewReport) -> Result<Report, RepositoryError>;

    /// Newest first.
    async fn recent_reports(&self, limit: usize) -> Result<Vec<Report>, RepositoryError>;

    async fn record_transaction(&self, transaction: &Transaction) -> Result<(), RepositoryError>;

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, RepositoryError>;
}
