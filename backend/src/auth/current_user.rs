use actix_web::error::InternalError;
use actix_web::{FromRequest, HttpRequest, HttpResponse, web};
use futures::future::LocalBoxFuture;

use super::user_service::{UserError, UserService};
use crate::db::models::User;
use crate::routes::ErrorResponse;

pub const USER_EMAIL_COOKIE: &str = "userEmail";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// The stored user behind the `userEmail` cookie (or `X-User-Email` header).
pub struct CurrentUser(pub User);

fn request_email(req: &HttpRequest) -> Option<String> {
    req.cookie(USER_EMAIL_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(USER_EMAIL_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .filter(|email| !email.trim().is_empty())
}

fn reject(response: HttpResponse, reason: &'static str) -> actix_web::Error {
    InternalError::from_response(reason, response).into()
}

impl FromRequest for CurrentUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let users = req.app_data::<web::Data<UserService>>().cloned();
        let email = request_email(req);
        let path = req.path().to_string();

        Box::pin(async move {
            let Some(users) = users else {
                log::error!("UserService is not registered; cannot resolve user for {}", path);
                return Err(reject(
                    HttpResponse::InternalServerError().json(ErrorResponse::new("Server misconfigured")),
                    "missing user service",
                ));
            };
            let Some(email) = email else {
                log::warn!("No user email on request for path: {}", path);
                return Err(reject(
                    HttpResponse::Unauthorized().json(ErrorResponse::new("Not logged in")),
                    "not logged in",
                ));
            };

            match users.find(&email).await {
                Ok(Some(user)) => Ok(CurrentUser(user)),
                Ok(None) | Err(UserError::InvalidEmail) => {
                    log::warn!("Unknown user '{}' for path: {}", email, path);
                    Err(reject(
                        HttpResponse::Unauthorized().json(ErrorResponse::new("Unknown user")),
                        "unknown user",
                    ))
                }
                Err(e) => {
                    log::error!("Failed to load user '{}': {}", email, e);
                    Err(reject(
                        HttpResponse::InternalServerError()
                            .json(ErrorResponse::new("Failed to load user")),
                        "user lookup failed",
                    ))
                }
            }
        })
    }
}
