use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{NewReport, Report, Transaction, User};
use super::repository::{RepositoryError, WasteRepository};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    reports: Vec<Report>,
    transactions: Vec<Transaction>,
}

/// Process-local store, used when no DynamoDB tables are configured.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WasteRepository for MemoryRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(RepositoryError::InvalidData(format!(
                "User {} already exists",
                user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn create_report(&self, report: NewReport) -> Result<Report, RepositoryError> {
        let report = Report::from_new(report);
        self.state.write().await.reports.push(report.clone());
        Ok(report)
    }

    async fn recent_reports(&self, limit: usize) -> Result<Vec<Report>, RepositoryError> {
        let state = self.state.read().await;
        let mut reports = state.reports.clone();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit);
        Ok(reports)
    }

    async fn record_transaction(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .transactions
            .push(transaction.clone());
        Ok(())
    }

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}
