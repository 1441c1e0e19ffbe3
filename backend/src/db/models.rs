use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ClassificationResult, ReportView, UserView};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, name: String, is_admin: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            is_admin,
            created_at: Utc::now(),
        }
    }

    pub fn to_view(&self, balance: i64) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            is_admin: self.is_admin,
            balance,
        }
    }
}

/// What the report-submission step hands to persistence.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: Uuid,
    pub location: String,
    pub waste_type: String,
    pub amount: String,
    pub image_url: Option<String>,
    pub verification_result: Option<ClassificationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub location: String,
    pub waste_type: String,
    pub amount: String,
    pub image_url: Option<String>,
    pub verification_result: Option<serde_json::Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn from_new(new_report: NewReport) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new_report.user_id,
            location: new_report.location,
            waste_type: new_report.waste_type,
            amount: new_report.amount,
            image_url: new_report.image_url,
            verification_result: new_report
                .verification_result
                .map(|result| serde_json::json!(result)),
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn to_view(&self) -> ReportView {
        ReportView {
            id: self.id,
            user_id: self.user_id,
            location: self.location.clone(),
            waste_type: self.waste_type.clone(),
            amount: self.amount.clone(),
            image_url: self.image_url.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    EarnedReport,
    EarnedCollect,
    Redeemed,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::EarnedReport => "earned_report",
            TransactionType::EarnedCollect => "earned_collect",
            TransactionType::Redeemed => "redeemed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "earned_report" => Some(TransactionType::EarnedReport),
            "earned_collect" => Some(TransactionType::EarnedCollect),
            "redeemed" => Some(TransactionType::Redeemed),
            _ => None,
        }
    }

    pub fn is_earning(&self) -> bool {
        !matches!(self, TransactionType::Redeemed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionType,
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(user_id: Uuid, kind: TransactionType, amount: i64, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            amount,
            description,
            created_at: Utc::now(),
        }
    }
}
