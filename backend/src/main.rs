mod auth;
mod config;
mod db;
mod events;
mod reports;
mod routes;
mod search;
mod state;
mod storage;
mod verification;

use actix_cors::Cors;
use actix_web::{App, HttpServer};
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use config::AppConfig;
use db::dynamodb_repository::DynamoDbRepository;
use db::memory_repository::MemoryRepository;
use db::repository::WasteRepository;
use events::{EventBus, spawn_event_logger};
use routes::configure_routes;
use state::AppServices;
use std::env;
use std::sync::Arc;
use storage::s3_service::S3Service;
use verification::gemini::GeminiClient;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let aws_config = if config.dynamo.is_some() || config.s3_bucket.is_some() {
        Some(aws_config::defaults(BehaviorVersion::latest()).load().await)
    } else {
        None
    };

    let repository: Arc<dyn WasteRepository> = match (&config.dynamo, &aws_config) {
        (Some(tables), Some(aws_config)) => {
            log::info!(
                "Using DynamoDB tables {}, {}, {}",
                tables.users,
                tables.reports,
                tables.transactions
            );
            Arc::new(DynamoDbRepository::new(
                DynamoDbClient::new(aws_config),
                tables.users.clone(),
                tables.reports.clone(),
                tables.transactions.clone(),
            ))
        }
        _ => {
            log::warn!("DynamoDB tables not configured; data is kept in memory only");
            Arc::new(MemoryRepository::new())
        }
    };

    let storage = match (&config.s3_bucket, &aws_config) {
        (Some(bucket), Some(aws_config)) => {
            log::info!("Report images go to S3 bucket {}", bucket);
            Some(S3Service::new(S3Client::new(aws_config), bucket.clone()))
        }
        _ => None,
    };

    let classifier = GeminiClient::new(&config.gemini).map_err(|e| {
        log::error!("Failed to set up classification client: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    if config.gemini.api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set; verification requests will be rejected");
    }

    let events = EventBus::default();
    spawn_event_logger(&events);

    let services = AppServices::new(
        repository,
        Arc::new(classifier),
        storage,
        config.verification.clone(),
        config.admin_emails.clone(),
        events,
    );

    let frontend_dir = config.frontend_dir.clone();
    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                        actix_web::http::header::HeaderName::from_static("x-user-email"),
                    ])
                    .max_age(3600),
            )
            .configure(|cfg| {
                services.register(cfg);
                configure_routes(cfg, frontend_dir.clone());
            })
    })
    .bind(&bind_address)?
    .run()
    .await
}
