use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt, future, stream};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use shared::{CreateUserRequest, ReportView, ServerEvent, SubmitReportRequest};

use crate::auth::current_user::{CurrentUser, USER_EMAIL_COOKIE};
use crate::auth::user_service::{UserError, UserService};
use crate::events::EventBus;
use crate::reports::report_service::{ReportError, ReportService};
use crate::reports::reward_service::RewardService;
use crate::search::search_navigation;
use crate::state::UploadLimit;
use crate::storage::s3_service::S3ServiceError;
use crate::verification::controller::{ImageUpload, VerificationController};
use crate::verification::session::VerificationSessions;

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Deserialize)]
struct ReportsQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: String) {
    cfg.service(web::resource("/api/users").route(web::post().to(login)))
        .service(web::resource("/api/users/me").route(web::get().to(me)))
        .service(web::resource("/api/logout").route(web::post().to(logout)))
        .service(web::resource("/api/verify").route(web::post().to(verify_image)))
        .service(
            web::resource("/api/reports")
                .route(web::post().to(submit_report))
                .route(web::get().to(recent_reports)),
        )
        .service(web::resource("/api/search").route(web::get().to(search)))
        .service(web::resource("/api/events").route(web::get().to(event_stream)))
        .service(Files::new("/static", frontend_dir).index_file("index.html"));
}

fn user_error_response(e: UserError) -> HttpResponse {
    match e {
        UserError::InvalidEmail => HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string())),
        UserError::Repository(inner) => {
            error!("User repository error: {:?}", inner);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to load user"))
        }
    }
}

fn report_error_response(e: ReportError) -> HttpResponse {
    match e {
        ReportError::MissingField(_)
        | ReportError::Storage(
            S3ServiceError::InvalidFormat
            | S3ServiceError::FileTooLarge
            | S3ServiceError::MalformedDataUrl,
        ) => HttpResponse::BadRequest().json(ErrorResponse::new(e.to_string())),
        ReportError::Storage(S3ServiceError::S3(_)) | ReportError::Repository(_) => {
            error!("Report handling failed: {:?}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to save report"))
        }
    }
}

async fn login(
    users: web::Data<UserService>,
    rewards: web::Data<RewardService>,
    body: web::Json<CreateUserRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    let user = match users.get_or_create(&request.email, request.name.as_deref()).await {
        Ok(user) => user,
        Err(e) => return user_error_response(e),
    };
    let balance = match rewards.balance(user.id).await {
        Ok(balance) => balance,
        Err(e) => {
            error!("Failed to compute balance for {}: {:?}", user.id, e);
            0
        }
    };

    info!("User {} signed in", user.email);
    let cookie = Cookie::build(USER_EMAIL_COOKIE, user.email.clone())
        .path("/")
        .same_site(SameSite::Lax)
        .finish();
    HttpResponse::Ok().cookie(cookie).json(user.to_view(balance))
}

async fn me(user: CurrentUser, rewards: web::Data<RewardService>) -> HttpResponse {
    let CurrentUser(user) = user;
    match rewards.balance(user.id).await {
        Ok(balance) => HttpResponse::Ok().json(user.to_view(balance)),
        Err(e) => {
            error!("Failed to compute balance for {}: {:?}", user.id, e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Failed to load balance"))
        }
    }
}

async fn logout(user: Option<CurrentUser>, events: web::Data<EventBus>) -> HttpResponse {
    if let Some(CurrentUser(user)) = user {
        info!("User {} logged out", user.email);
        events.publish(user.id, ServerEvent::LoggedOut);
    }
    let mut cookie = Cookie::build(USER_EMAIL_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(serde_json::json!({ "success": true }))
}

/// Reads the `image` field, keeping at most `limit + 1` bytes so oversize
/// uploads are still reported as too large.
async fn read_image_field(
    mut payload: Multipart,
    limit: usize,
) -> Result<Option<ImageUpload>, Error> {
    let mut upload = None;

    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some("image") {
            while field.try_next().await?.is_some() {}
            continue;
        }

        let declared_mime = field.content_type().map(|mime| mime.to_string());
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            let room = limit.saturating_add(1).saturating_sub(bytes.len());
            bytes.extend_from_slice(&data[..data.len().min(room)]);
        }
        upload = Some(ImageUpload::new(bytes, declared_mime.as_deref()));
    }

    Ok(upload)
}

async fn verify_image(
    user: CurrentUser,
    controller: web::Data<VerificationController>,
    sessions: web::Data<VerificationSessions>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let CurrentUser(user) = user;
    let image = read_image_field(payload, limit.0).await?;

    let ticket = sessions.begin(user.id);
    let outcome = controller.verify(image.as_ref(), &ticket).await;
    ticket.finish();

    info!(
        "Verification for {} ended in state {} after {} attempts",
        user.email, outcome.state, outcome.attempts
    );
    Ok(HttpResponse::Ok().json(outcome.into_response()))
}

async fn submit_report(
    user: CurrentUser,
    reports: web::Data<ReportService>,
    body: web::Json<SubmitReportRequest>,
) -> HttpResponse {
    let CurrentUser(user) = user;
    match reports.submit(&user, body.into_inner()).await {
        Ok(report) => {
            info!("Report {} submitted by {}", report.id, user.email);
            HttpResponse::Created().json(report.to_view())
        }
        Err(e) => report_error_response(e),
    }
}

async fn recent_reports(
    reports: web::Data<ReportService>,
    query: web::Query<ReportsQuery>,
) -> HttpResponse {
    match reports.recent(query.limit).await {
        Ok(reports) => {
            let views: Vec<ReportView> = reports.iter().map(|r| r.to_view()).collect();
            HttpResponse::Ok().json(views)
        }
        Err(e) => report_error_response(e),
    }
}

async fn search(query: web::Query<SearchQuery>) -> HttpResponse {
    let q = query.q.as_deref().unwrap_or_default();
    HttpResponse::Ok().json(search_navigation(q))
}

async fn event_stream(user: CurrentUser, events: web::Data<EventBus>) -> HttpResponse {
    let CurrentUser(user) = user;
    info!("Opening event stream for {}", user.email);

    let opened = stream::once(future::ready(Ok::<_, Error>(web::Bytes::from_static(
        b": connected\n\n",
    ))));
    let updates = events.user_stream(user.id).filter_map(|event| {
        future::ready(match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(web::Bytes::from(format!("data: {}\n\n", json)))),
            Err(e) => {
                warn!("Dropping unserializable event: {}", e);
                None
            }
        })
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(opened.chain(updates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use crate::db::memory_repository::MemoryRepository;
    use crate::state::AppServices;
    use crate::verification::classifier::testing::ScriptedClassifier;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use shared::{UserView, VerificationState, VerifyResponse};
    use std::sync::Arc;
    use std::time::Duration;

    const BOUNDARY: &str = "----wastewatch-test";
    const PNG: [u8; 10] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn services(classifier: ScriptedClassifier) -> AppServices {
        AppServices::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(classifier),
            None,
            VerificationConfig {
                retry_delay: Duration::ZERO,
                ..VerificationConfig::default()
            },
            vec!["admin@example.com".to_string()],
            EventBus::default(),
        )
    }

    fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"waste.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn verify_request(field: &str, bytes: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/verify")
            .cookie(Cookie::new(USER_EMAIL_COOKIE, "ana@example.com"))
            .insert_header((
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(field, bytes))
    }

    fn login_request(email: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/users")
            .set_json(CreateUserRequest {
                email: email.to_string(),
                name: Some("Ana".to_string()),
            })
    }

    #[actix_web::test]
    async fn login_creates_user_and_sets_cookie() {
        let services = services(ScriptedClassifier::new(Vec::new()));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;

        let resp = test::call_service(&app, login_request("admin@example.com").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == USER_EMAIL_COOKIE)
            .map(|c| c.value().to_string());
        assert_eq!(cookie.as_deref(), Some("admin@example.com"));

        let user: UserView = test::read_body_json(resp).await;
        assert!(user.is_admin);
        assert_eq!(user.balance, 0);
    }

    #[actix_web::test]
    async fn protected_routes_require_a_user() {
        let services = services(ScriptedClassifier::new(Vec::new()));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/users/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Not logged in");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/users/me")
                .insert_header(("X-User-Email", "ghost@example.com"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn verify_returns_classification() {
        let services = services(ScriptedClassifier::replying(
            r#"{"wasteType": "Plastic Bottles", "quantity": "2 kg", "confidence": 0.9}"#,
        ));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;
        test::call_service(&app, login_request("ana@example.com").to_request()).await;

        let body: VerifyResponse =
            test::call_and_read_body_json(&app, verify_request("image", &PNG).to_request()).await;

        assert_eq!(body.state, VerificationState::Success);
        assert_eq!(body.attempts, 1);
        let result = body.result.unwrap();
        assert_eq!(result.waste_type, "Plastic Bottles");
        assert_eq!(result.quantity, "2 kg");
    }

    #[actix_web::test]
    async fn unbounded_upload_limit_still_reads_the_image() {
        let services = services(ScriptedClassifier::replying(
            r#"{"wasteType": "Glass", "quantity": "1 kg"}"#,
        ));
        let app = test::init_service(
            App::new()
                .configure(|cfg| {
                    services.register(cfg);
                    configure_routes(cfg, ".".to_string());
                })
                .app_data(web::Data::new(UploadLimit(usize::MAX))),
        )
        .await;
        test::call_service(&app, login_request("ana@example.com").to_request()).await;

        let body: VerifyResponse =
            test::call_and_read_body_json(&app, verify_request("image", &PNG).to_request()).await;

        assert_eq!(body.state, VerificationState::Success);
        assert_eq!(body.result.unwrap().waste_type, "Glass");
    }

    #[actix_web::test]
    async fn verify_without_image_field_stays_idle() {
        let services = services(ScriptedClassifier::new(Vec::new()));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;
        test::call_service(&app, login_request("ana@example.com").to_request()).await;

        let body: VerifyResponse =
            test::call_and_read_body_json(&app, verify_request("other", &PNG).to_request()).await;

        assert_eq!(body.state, VerificationState::Idle);
        assert_eq!(body.error.as_deref(), Some("no_image_selected"));
        assert_eq!(body.attempts, 0);
        assert_eq!(body.notices.len(), 1);
    }

    #[actix_web::test]
    async fn submitted_reports_earn_points_and_are_listed() {
        let services = services(ScriptedClassifier::new(Vec::new()));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;
        test::call_service(&app, login_request("ana@example.com").to_request()).await;

        let submit = test::TestRequest::post()
            .uri("/api/reports")
            .cookie(Cookie::new(USER_EMAIL_COOKIE, "ana@example.com"))
            .set_json(SubmitReportRequest {
                location: "Riverside Park".into(),
                waste_type: "Glass".into(),
                amount: "1 kg".into(),
                image_preview: None,
                verification: None,
            })
            .to_request();
        let resp = test::call_service(&app, submit).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let me: UserView = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/users/me")
                .cookie(Cookie::new(USER_EMAIL_COOKIE, "ana@example.com"))
                .to_request(),
        )
        .await;
        assert_eq!(me.balance, 10);

        let reports: Vec<ReportView> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/reports?limit=5").to_request(),
        )
        .await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].location, "Riverside Park");
    }

    #[actix_web::test]
    async fn blank_report_fields_are_bad_requests() {
        let services = services(ScriptedClassifier::new(Vec::new()));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;
        test::call_service(&app, login_request("ana@example.com").to_request()).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/reports")
                .cookie(Cookie::new(USER_EMAIL_COOKIE, "ana@example.com"))
                .set_json(SubmitReportRequest {
                    location: "Riverside Park".into(),
                    waste_type: "".into(),
                    amount: "1 kg".into(),
                    image_preview: None,
                    verification: None,
                })
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn search_filters_navigation() {
        let services = services(ScriptedClassifier::new(Vec::new()));
        let app = test::init_service(App::new().configure(|cfg| {
            services.register(cfg);
            configure_routes(cfg, ".".to_string());
        }))
        .await;

        let results: Vec<shared::SearchResult> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/search?q=reward").to_request(),
        )
        .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "/rewards");
    }
}
