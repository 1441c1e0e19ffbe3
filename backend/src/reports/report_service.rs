use shared::{ServerEvent, SubmitReportRequest};
use std::sync::Arc;

use super::reward_service::RewardService;
use crate::db::models::{NewReport, Report, TransactionType, User};
use crate::db::repository::{RepositoryError, WasteRepository};
use crate::events::EventBus;
use crate::storage::s3_service::{DataUrlImage, S3Service, S3ServiceError};

pub const REPORT_REWARD_POINTS: i64 = 10;
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const MAX_RECENT_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Image upload failed: {0}")]
    Storage(#[from] S3ServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct ReportService {
    repository: Arc<dyn WasteRepository>,
    storage: Option<S3Service>,
    rewards: RewardService,
    events: EventBus,
}

fn required(value: &str, field: &'static str) -> Result<String, ReportError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ReportError::MissingField(field));
    }
    Ok(value.to_string())
}

impl ReportService {
    pub fn new(
        repository: Arc<dyn WasteRepository>,
        storage: Option<S3Service>,
        rewards: RewardService,
        events: EventBus,
    ) -> Self {
        Self {
            repository,
            storage,
            rewards,
            events,
        }
    }

    async fn store_preview(
        &self,
        user: &User,
        preview: Option<String>,
    ) -> Result<Option<String>, ReportError> {
        let Some(preview) = preview.filter(|p| !p.trim().is_empty()) else {
            return Ok(None);
        };
        let Some(storage) = &self.storage else {
            return Ok(Some(preview));
        };
        match DataUrlImage::parse(&preview)? {
            Some(image) => Ok(Some(storage.store_report_image(user.id, &image).await?)),
            None => Ok(Some(preview)),
        }
    }

    /// Persists a report and credits the reporter.
    pub async fn submit(
        &self,
        user: &User,
        request: SubmitReportRequest,
    ) -> Result<Report, ReportError> {
        let location = required(&request.location, "Location")?;
        let waste_type = required(&request.waste_type, "Waste type")?;
        let amount = required(&request.amount, "Amount")?;
        let image_url = self.store_preview(user, request.image_preview).await?;

        let report = self
            .repository
            .create_report(NewReport {
                user_id: user.id,
                location,
                waste_type,
                amount,
                image_url,
                verification_result: request.verification,
            })
            .await?;

        self.rewards
            .award(
                user.id,
                TransactionType::EarnedReport,
                REPORT_REWARD_POINTS,
                "Points earned for reporting waste",
            )
            .await?;
        let balance = self.rewards.balance(user.id).await?;
        self.events
            .publish(user.id, ServerEvent::BalanceUpdated { balance });

        Ok(report)
    }

    pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<Report>, ReportError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        Ok(self.repository.recent_reports(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_repository::MemoryRepository;
    use shared::ClassificationResult;

    fn service() -> (ReportService, EventBus) {
        let repository: Arc<dyn WasteRepository> = Arc::new(MemoryRepository::new());
        let events = EventBus::default();
        let service = ReportService::new(
            repository.clone(),
            None,
            RewardService::new(repository),
            events.clone(),
        );
        (service, events)
    }

    fn request() -> SubmitReportRequest {
        SubmitReportRequest {
            location: "Riverside Park".into(),
            waste_type: "Plastic Bottles".into(),
            amount: "2 kg".into(),
            image_preview: Some("data:image/png;base64,aGVsbG8=".into()),
            verification: Some(ClassificationResult {
                waste_type: "Plastic Bottles".into(),
                quantity: "2 kg".into(),
                confidence: 0.9,
            }),
        }
    }

    #[tokio::test]
    async fn submit_stores_report_and_awards_points() {
        let (reports, events) = service();
        let mut rx = events.subscribe();
        let user = User::new("a@b.c".into(), "A".into(), false);

        let report = reports.submit(&user, request()).await.unwrap();

        assert_eq!(report.user_id, user.id);
        assert_eq!(report.status, "pending");
        // Without S3 the preview is kept inline.
        assert_eq!(
            report.image_url.as_deref(),
            Some("data:image/png;base64,aGVsbG8=")
        );
        assert_eq!(
            report.verification_result.as_ref().unwrap()["confidence"],
            serde_json::json!(0.9)
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, user.id);
        assert_eq!(event.event, ServerEvent::BalanceUpdated { balance: 10 });
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let (reports, _) = service();
        let user = User::new("a@b.c".into(), "A".into(), false);
        let mut bad = request();
        bad.location = "   ".into();

        assert!(matches!(
            reports.submit(&user, bad).await,
            Err(ReportError::MissingField("Location"))
        ));
        assert!(reports.recent(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_limit_is_clamped() {
        let (reports, _) = service();
        let user = User::new("a@b.c".into(), "A".into(), false);
        for _ in 0..3 {
            reports.submit(&user, request()).await.unwrap();
        }

        assert_eq!(reports.recent(Some(0)).await.unwrap().len(), 1);
        assert_eq!(reports.recent(Some(500)).await.unwrap().len(), 3);
        assert_eq!(reports.recent(None).await.unwrap().len(), 3);
    }
}
