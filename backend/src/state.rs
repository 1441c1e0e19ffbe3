use actix_web::web;
use std::sync::Arc;

use crate::auth::user_service::UserService;
use crate::config::VerificationConfig;
use crate::db::repository::WasteRepository;
use crate::events::EventBus;
use crate::reports::report_service::ReportService;
use crate::reports::reward_service::RewardService;
use crate::storage::s3_service::S3Service;
use crate::verification::classifier::ClassificationService;
use crate::verification::controller::VerificationController;
use crate::verification::session::VerificationSessions;

/// Everything the handlers pull out of `web::Data`.
#[derive(Clone)]
pub struct AppServices {
    pub controller: VerificationController,
    pub sessions: VerificationSessions,
    pub users: UserService,
    pub reports: ReportService,
    pub rewards: RewardService,
    pub events: EventBus,
    pub max_image_bytes: usize,
}

impl AppServices {
    pub fn new(
        repository: Arc<dyn WasteRepository>,
        classifier: Arc<dyn ClassificationService>,
        storage: Option<S3Service>,
        verification: VerificationConfig,
        admin_emails: Vec<String>,
        events: EventBus,
    ) -> Self {
        let rewards = RewardService::new(repository.clone());
        let max_image_bytes = verification.max_image_bytes;
        Self {
            controller: VerificationController::new(classifier, verification, events.clone()),
            sessions: VerificationSessions::new(),
            users: UserService::new(repository.clone(), admin_emails),
            reports: ReportService::new(repository, storage, rewards.clone(), events.clone()),
            rewards,
            events,
            max_image_bytes,
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.controller.clone()))
            .app_data(web::Data::new(self.sessions.clone()))
            .app_data(web::Data::new(self.users.clone()))
            .app_data(web::Data::new(self.reports.clone()))
            .app_data(web::Data::new(self.rewards.clone()))
            .app_data(web::Data::new(self.events.clone()))
            .app_data(web::Data::new(UploadLimit(self.max_image_bytes)));
    }
}

/// Bytes of an uploaded image kept before the rest is discarded.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);
