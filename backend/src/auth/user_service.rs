use std::sync::Arc;

use crate::db::models::User;
use crate::db::repository::{RepositoryError, WasteRepository};

pub const DEFAULT_USER_NAME: &str = "Anonymous User";

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("A valid email address is required")]
    InvalidEmail,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn WasteRepository>,
    admin_emails: Arc<Vec<String>>,
}

impl UserService {
    pub fn new(repository: Arc<dyn WasteRepository>, admin_emails: Vec<String>) -> Self {
        Self {
            repository,
            admin_emails: Arc::new(admin_emails),
        }
    }

    fn normalize_email(email: &str) -> Result<String, UserError> {
        let email = email.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
            _ => Err(UserError::InvalidEmail),
        }
    }

    fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin == email)
    }

    pub async fn find(&self, email: &str) -> Result<Option<User>, UserError> {
        let email = Self::normalize_email(email)?;
        Ok(self.repository.get_user_by_email(&email).await?)
    }

    /// Returns the stored user for `email`, creating one on first sight.
    pub async fn get_or_create(&self, email: &str, name: Option<&str>) -> Result<User, UserError> {
        let email = Self::normalize_email(email)?;
        if let Some(user) = self.repository.get_user_by_email(&email).await? {
            return Ok(user);
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_USER_NAME)
            .to_string();
        let is_admin = self.is_admin(&email);
        let user = User::new(email, name, is_admin);
        self.repository.create_user(&user).await?;
        log::info!("Created user {} (admin: {})", user.email, user.is_admin);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_repository::MemoryRepository;

    fn service(admins: &[&str]) -> UserService {
        UserService::new(
            Arc::new(MemoryRepository::new()),
            admins.iter().map(|a| a.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn creates_once_then_reuses() {
        let users = service(&[]);
        let first = users.get_or_create(" Sam@Example.com ", Some("Sam")).await.unwrap();
        let second = users.get_or_create("sam@example.com", Some("Other")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Sam");
        assert_eq!(second.email, "sam@example.com");
    }

    #[tokio::test]
    async fn missing_name_defaults() {
        let users = service(&[]);
        let user = users.get_or_create("x@y.z", Some("  ")).await.unwrap();
        assert_eq!(user.name, DEFAULT_USER_NAME);
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn admin_emails_grant_admin() {
        let users = service(&["boss@example.com"]);
        let user = users.get_or_create("Boss@example.com", None).await.unwrap();
        assert!(user.is_admin);
    }

    #[tokio::test]
    async fn invalid_emails_are_rejected() {
        let users = service(&[]);
        assert!(matches!(
            users.get_or_create("not-an-email", None).await,
            Err(UserError::InvalidEmail)
        ));
        assert!(matches!(users.find("@nowhere").await, Err(UserError::InvalidEmail)));
    }
}
