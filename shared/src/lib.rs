use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Waste classification produced by image verification and attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub waste_type: String,
    /// Always canonical `"<number> kg"`.
    pub quantity: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl ClassificationResult {
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;

    /// Result used when the classifier answered but its answer could not be read.
    pub fn fallback() -> Self {
        Self {
            waste_type: "Unknown".to_string(),
            quantity: "1 kg".to_string(),
            confidence: Self::DEFAULT_CONFIDENCE,
        }
    }

    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerificationState {
    #[default]
    Idle,
    Verifying,
    Success,
    Failure,
}

impl VerificationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationState::Success | VerificationState::Failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Loading,
    Success,
    Warning,
    Error,
}

/// Human readable status message shown to the user as a toast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            attempt: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn loading(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Loading, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub state: VerificationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClassificationResult>,
    /// Machine readable failure code, e.g. `rate_limited`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReportRequest {
    pub location: String,
    pub waste_type: String,
    pub amount: String,
    /// `data:` URL of the image the report was verified with.
    #[serde(default)]
    pub image_preview: Option<String>,
    #[serde(default)]
    pub verification: Option<ClassificationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub location: String,
    pub waste_type: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReportView {
    pub fn created_date(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Events pushed to a user's browser over `/api/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Notice { notice: Notice },
    VerificationStateChanged { session_id: Uuid, state: VerificationState },
    BalanceUpdated { balance: i64 },
    LoggedOut,
}
