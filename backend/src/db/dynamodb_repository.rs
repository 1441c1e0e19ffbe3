use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::models::{NewReport, Report, Transaction, TransactionType, User};
use super::repository::{RepositoryError, WasteRepository};

type Item = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    users_table: String,
    reports_table: String,
    transactions_table: String,
}

impl DynamoDbRepository {
    pub fn new(
        client: Client,
        users_table: String,
        reports_table: String,
        transactions_table: String,
    ) -> Self {
        Self {
            client,
            users_table,
            reports_table,
            transactions_table,
        }
    }

    async fn put(&self, table: &str, item: Item) -> Result<(), RepositoryError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB put_item failed on '{}': {:?}", table, e);
                RepositoryError::DynamoDb(e.to_string())
            })?;
        Ok(())
    }

    /// Scans every page of `table`, optionally filtered by `attribute = value`.
    async fn scan_all(
        &self,
        table: &str,
        filter: Option<(&str, AttributeValue)>,
    ) -> Result<Vec<Item>, RepositoryError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(start_key.take());
            if let Some((attribute, value)) = &filter {
                request = request
                    .filter_expression("#attr = :value")
                    .expression_attribute_names("#attr", *attribute)
                    .expression_attribute_values(":value", value.clone());
            }

            let result = request
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            if let Some(page) = result.items {
                items.extend(page);
            }
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        log::debug!("Scanned {} items from '{}'", items.len(), table);
        Ok(items)
    }

    fn user_to_item(user: &User) -> Item {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(user.id.to_string()));
        item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
        item.insert("name".to_string(), AttributeValue::S(user.name.clone()));
        item.insert("is_admin".to_string(), AttributeValue::Bool(user.is_admin));
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(user.created_at.to_rfc3339()),
        );
        item
    }

    fn report_to_item(report: &Report) -> Result<Item, RepositoryError> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(report.id.to_string()));
        item.insert(
            "user_id".to_string(),
            AttributeValue::S(report.user_id.to_string()),
        );
        item.insert(
            "location".to_string(),
            AttributeValue::S(report.location.clone()),
        );
        item.insert(
            "waste_type".to_string(),
            AttributeValue::S(report.waste_type.clone()),
        );
        item.insert("amount".to_string(), AttributeValue::S(report.amount.clone()));
        if let Some(image_url) = &report.image_url {
            item.insert("image_url".to_string(), AttributeValue::S(image_url.clone()));
        }
        if let Some(verification) = &report.verification_result {
            item.insert(
                "verification_result".to_string(),
                AttributeValue::S(serde_json::to_string(verification)?),
            );
        }
        item.insert("status".to_string(), AttributeValue::S(report.status.clone()));
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(report.created_at.to_rfc3339()),
        );
        Ok(item)
    }

    fn transaction_to_item(transaction: &Transaction) -> Item {
        let mut item = HashMap::new();
        item.insert(
            "id".to_string(),
            AttributeValue::S(transaction.id.to_string()),
        );
        item.insert(
            "user_id".to_string(),
            AttributeValue::S(transaction.user_id.to_string()),
        );
        item.insert(
            "type".to_string(),
            AttributeValue::S(transaction.kind.as_str().to_string()),
        );
        item.insert(
            "amount".to_string(),
            AttributeValue::N(transaction.amount.to_string()),
        );
        item.insert(
            "description".to_string(),
            AttributeValue::S(transaction.description.clone()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(transaction.created_at.to_rfc3339()),
        );
        item
    }
}

// Helpers for reading DynamoDB items
fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

fn get_uuid(item: &Item, key: &str) -> Result<Uuid, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn get_timestamp(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid {}", key)))
}

fn parse_user(item: &Item) -> Result<User, RepositoryError> {
    Ok(User {
        id: get_uuid(item, "id")?,
        email: get_string(item, "email")?,
        name: get_string(item, "name")?,
        is_admin: *item
            .get("is_admin")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(&false),
        created_at: get_timestamp(item, "created_at")?,
    })
}

fn parse_report(item: &Item) -> Result<Report, RepositoryError> {
    let verification_result = match get_optional_string(item, "verification_result") {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };

    Ok(Report {
        id: get_uuid(item, "id")?,
        user_id: get_uuid(item, "user_id")?,
        location: get_string(item, "location")?,
        waste_type: get_string(item, "waste_type")?,
        amount: get_string(item, "amount")?,
        image_url: get_optional_string(item, "image_url"),
        verification_result,
        status: get_optional_string(item, "status").unwrap_or_else(|| "pending".to_string()),
        created_at: get_timestamp(item, "created_at")?,
    })
}

fn parse_transaction(item: &Item) -> Result<Transaction, RepositoryError> {
    let raw_kind = get_string(item, "type")?;
    let kind = TransactionType::parse(&raw_kind)
        .ok_or_else(|| RepositoryError::InvalidData(format!("Unknown type {}", raw_kind)))?;
    let amount = item
        .get("amount")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<i64>().ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid amount".to_string()))?;

    Ok(Transaction {
        id: get_uuid(item, "id")?,
        user_id: get_uuid(item, "user_id")?,
        kind,
        amount,
        description: get_optional_string(item, "description").unwrap_or_default(),
        created_at: get_timestamp(item, "created_at")?,
    })
}

#[async_trait]
impl WasteRepository for DynamoDbRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let items = self
            .scan_all(
                &self.users_table,
                Some(("email", AttributeValue::S(email.to_lowercase()))),
            )
            .await?;
        items.first().map(parse_user).transpose()
    }

    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        log::info!(
            "Creating user in DynamoDB table '{}': {}",
            self.users_table,
            user.email
        );
        self.put(&self.users_table, Self::user_to_item(user)).await
    }

    async fn create_report(&self, report: NewReport) -> Result<Report, RepositoryError> {
        let report = Report::from_new(report);
        self.put(&self.reports_table, Self::report_to_item(&report)?)
            .await?;
        log::info!("Stored report {} for user {}", report.id, report.user_id);
        Ok(report)
    }

    async fn recent_reports(&self, limit: usize) -> Result<Vec<Report>, RepositoryError> {
        let items = self.scan_all(&self.reports_table, None).await?;
        let mut reports = Vec::with_capacity(items.len());
        for item in &items {
            match parse_report(item) {
                Ok(report) => reports.push(report),
                Err(e) => log::warn!("Skipping unreadable report item: {}", e),
            }
        }
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit);
        Ok(reports)
    }

    async fn record_transaction(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        self.put(
            &self.transactions_table,
            Self::transaction_to_item(transaction),
        )
        .await
    }

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let items = self
            .scan_all(
                &self.transactions_table,
                Some(("user_id", AttributeValue::S(user_id.to_string()))),
            )
            .await?;
        items.iter().map(parse_transaction).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ClassificationResult;

    #[test]
    fn report_items_round_trip() {
        let report = Report::from_new(NewReport {
            user_id: Uuid::new_v4(),
            location: "Main St".into(),
            waste_type: "Plastic Bottles".into(),
            amount: "2 kg".into(),
            image_url: Some("images/u/abc.png".into()),
            verification_result: Some(ClassificationResult {
                waste_type: "Plastic Bottles".into(),
                quantity: "2 kg".into(),
                confidence: 0.9,
            }),
        });

        let item = DynamoDbRepository::report_to_item(&report).unwrap();
        let parsed = parse_report(&item).unwrap();
        assert_eq!(parsed.id, report.id);
        assert_eq!(parsed.image_url, report.image_url);
        assert_eq!(parsed.verification_result, report.verification_result);
        assert_eq!(parsed.created_at, report.created_at);
    }

    #[test]
    fn transaction_amount_is_numeric() {
        let transaction = Transaction::new(
            Uuid::new_v4(),
            TransactionType::Redeemed,
            25,
            "voucher".into(),
        );
        let item = DynamoDbRepository::transaction_to_item(&transaction);
        assert_eq!(item.get("amount"), Some(&AttributeValue::N("25".into())));
        assert_eq!(parse_transaction(&item).unwrap().kind, TransactionType::Redeemed);
    }

    #[test]
    fn user_without_admin_flag_is_not_admin() {
        let user = User::new("a@b.c".into(), "A".into(), true);
        let mut item = DynamoDbRepository::user_to_item(&user);
        item.remove("is_admin");
        assert!(!parse_user(&item).unwrap().is_admin);
    }
}
