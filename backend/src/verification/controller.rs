use shared::{ClassificationResult, Notice, ServerEvent, VerificationState, VerifyResponse};
use std::sync::Arc;

use super::classifier::{ClassificationService, ClassifierError, VerificationRequest};
use super::parser::{ParseError, indicates_no_waste, read_classification};
use super::session::SessionTicket;
use crate::config::VerificationConfig;
use crate::events::EventBus;

const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// An uploaded image waiting to be verified.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageUpload {
    /// Keeps the declared media type when it is an image type, otherwise sniffs the bytes.
    pub fn new(bytes: Vec<u8>, declared_mime: Option<&str>) -> Self {
        let mime_type = match declared_mime {
            Some(mime) if mime.starts_with("image/") => mime.to_string(),
            _ => image::guess_format(&bytes)
                .map(|format| format.to_mime_type().to_string())
                .unwrap_or_else(|_| UNKNOWN_MIME_TYPE.to_string()),
        };
        Self { bytes, mime_type }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("Please select an image first")]
    NoImageSelected,
    #[error("Image too large. Please use an image under {}MB", .limit / (1024 * 1024))]
    ImageTooLarge { size: usize, limit: usize },
    #[error("API key missing. Check environment variables.")]
    MissingCredential,
    #[error("API rate limit reached. Please try again in a moment.")]
    RateLimited,
    #[error("Image format not supported. Please try a different image.")]
    InvalidImageFormat,
    #[error("Maximum retry attempts reached. Please try with a different image.")]
    MaxRetriesReached { last_error: Option<String> },
    #[error("No waste detected in the image. Please upload a clear image of waste.")]
    NoWasteDetected,
    #[error("Verification was superseded by a newer request")]
    Superseded,
}

impl VerificationFailure {
    pub fn code(&self) -> &'static str {
        match self {
            VerificationFailure::NoImageSelected => "no_image_selected",
            VerificationFailure::ImageTooLarge { .. } => "image_too_large",
            VerificationFailure::MissingCredential => "missing_credential",
            VerificationFailure::RateLimited => "rate_limited",
            VerificationFailure::InvalidImageFormat => "invalid_image_format",
            VerificationFailure::MaxRetriesReached { .. } => "max_retries_reached",
            VerificationFailure::NoWasteDetected => "no_waste_detected",
            VerificationFailure::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub state: VerificationState,
    pub result: Option<ClassificationResult>,
    pub failure: Option<VerificationFailure>,
    /// Classification calls actually made.
    pub attempts: u32,
    pub notices: Vec<Notice>,
}

impl VerificationOutcome {
    pub fn into_response(self) -> VerifyResponse {
        VerifyResponse {
            state: self.state,
            result: self.result,
            error: self.failure.map(|f| f.code().to_string()),
            attempts: self.attempts,
            notices: self.notices,
        }
    }
}

/// Collects what one verification chain reports while it runs.
struct Progress<'a> {
    events: &'a EventBus,
    ticket: &'a SessionTicket,
    notices: Vec<Notice>,
    attempts: u32,
}

impl<'a> Progress<'a> {
    fn new(events: &'a EventBus, ticket: &'a SessionTicket) -> Self {
        Self {
            events,
            ticket,
            notices: Vec::new(),
            attempts: 0,
        }
    }

    fn notify(&mut self, notice: Notice) {
        self.events.publish(
            self.ticket.user_id,
            ServerEvent::Notice {
                notice: notice.clone(),
            },
        );
        self.notices.push(notice);
    }

    fn transition(&self, state: VerificationState) {
        self.events.publish(
            self.ticket.user_id,
            ServerEvent::VerificationStateChanged {
                session_id: self.ticket.session_id,
                state,
            },
        );
    }

    fn finish(
        self,
        state: VerificationState,
        result: Option<ClassificationResult>,
        failure: Option<VerificationFailure>,
    ) -> VerificationOutcome {
        VerificationOutcome {
            state,
            result,
            failure,
            attempts: self.attempts,
            notices: self.notices,
        }
    }

    /// Input problems: reported, but verification never started.
    fn reject(mut self, failure: VerificationFailure) -> VerificationOutcome {
        self.notify(Notice::error(failure.to_string()));
        self.finish(VerificationState::Idle, None, Some(failure))
    }

    fn fail(mut self, failure: VerificationFailure) -> VerificationOutcome {
        self.transition(VerificationState::Failure);
        self.notify(Notice::error(failure.to_string()));
        self.finish(VerificationState::Failure, None, Some(failure))
    }

    fn succeed(mut self, result: ClassificationResult, notice: Notice) -> VerificationOutcome {
        self.transition(VerificationState::Success);
        self.notify(notice);
        self.finish(VerificationState::Success, Some(result), None)
    }

    fn superseded(self) -> VerificationOutcome {
        log::info!(
            "Dropping result of superseded verification {}",
            self.ticket.session_id
        );
        self.finish(
            VerificationState::Idle,
            None,
            Some(VerificationFailure::Superseded),
        )
    }
}

/// Runs the verify workflow: validate, classify, retry transient faults,
/// read the answer, and hand back exactly one outcome.
#[derive(Clone)]
pub struct VerificationController {
    classifier: Arc<dyn ClassificationService>,
    config: VerificationConfig,
    events: EventBus,
}

impl VerificationController {
    pub fn new(
        classifier: Arc<dyn ClassificationService>,
        config: VerificationConfig,
        events: EventBus,
    ) -> Self {
        Self {
            classifier,
            config,
            events,
        }
    }

    pub async fn verify(
        &self,
        image: Option<&ImageUpload>,
        ticket: &SessionTicket,
    ) -> VerificationOutcome {
        self.verify_from(image, 0, ticket).await
    }

    /// `attempt` is 0-indexed; a chain never makes more than `max_retries` calls.
    pub async fn verify_from(
        &self,
        image: Option<&ImageUpload>,
        mut attempt: u32,
        ticket: &SessionTicket,
    ) -> VerificationOutcome {
        let mut progress = Progress::new(&self.events, ticket);

        let Some(image) = image.filter(|image| !image.bytes.is_empty()) else {
            return progress.reject(VerificationFailure::NoImageSelected);
        };
        if image.bytes.len() > self.config.max_image_bytes {
            return progress.reject(VerificationFailure::ImageTooLarge {
                size: image.bytes.len(),
                limit: self.config.max_image_bytes,
            });
        }
        if !self.classifier.has_credential() {
            log::error!("Classification service has no API credential configured");
            return progress.reject(VerificationFailure::MissingCredential);
        }

        let max_retries = self.config.max_retries;
        let mut last_error = None;

        loop {
            if !ticket.is_current() {
                return progress.superseded();
            }
            if attempt >= max_retries {
                log::warn!(
                    "Verification {} gave up after {} attempts: {:?}",
                    ticket.session_id,
                    progress.attempts,
                    last_error
                );
                return progress.fail(VerificationFailure::MaxRetriesReached { last_error });
            }

            let attempt_number = attempt + 1;
            progress.transition(VerificationState::Verifying);
            progress.notify(
                Notice::loading(format!(
                    "Analyzing image (Attempt {}/{})...",
                    attempt_number, max_retries
                ))
                .with_attempt(attempt_number),
            );

            let request = VerificationRequest {
                image: &image.bytes,
                mime_type: &image.mime_type,
                attempt_number,
            };
            progress.attempts += 1;
            let reply = self.classifier.classify(&request, &self.config.prompt).await;

            if !ticket.is_current() {
                return progress.superseded();
            }

            match reply {
                Ok(text) => return self.conclude(progress, &text),
                Err(ClassifierError::RateLimited(message)) => {
                    log::warn!("Classification rate limited: {}", message);
                    return progress.fail(VerificationFailure::RateLimited);
                }
                Err(ClassifierError::InvalidArgument(message)) => {
                    log::warn!("Classification rejected the image: {}", message);
                    return progress.fail(VerificationFailure::InvalidImageFormat);
                }
                Err(ClassifierError::Transient(message)) => {
                    log::error!("Verification attempt {} failed: {}", attempt_number, message);
                    last_error = Some(message);
                    attempt += 1;
                    if attempt < max_retries {
                        progress.notify(
                            Notice::warning(format!(
                                "Verification failed. Retrying... ({}/{})",
                                attempt_number, max_retries
                            ))
                            .with_attempt(attempt_number),
                        );
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
    }

    /// The no-waste label is checked before the quantity is interpreted, so
    /// answers like `{"wasteType":"None","quantity":"N/A"}` still reject.
    fn conclude(&self, progress: Progress<'_>, text: &str) -> VerificationOutcome {
        let answer = match read_classification(text) {
            Ok(answer) => answer,
            Err(e) => return Self::fall_back(progress, &e, text),
        };
        if indicates_no_waste(&answer.waste_type, &self.config.no_waste_labels) {
            log::info!("Classifier found no waste ({})", answer.waste_type);
            return progress.fail(VerificationFailure::NoWasteDetected);
        }

        match answer.into_result() {
            Err(e) => Self::fall_back(progress, &e, text),
            Ok(result) => {
                log::info!(
                    "Verified {} ({}) with confidence {:.2}",
                    result.waste_type,
                    result.quantity,
                    result.confidence
                );
                progress.succeed(result, Notice::success("Image verified successfully"))
            }
        }
    }

    fn fall_back(progress: Progress<'_>, error: &ParseError, text: &str) -> VerificationOutcome {
        log::warn!("Failed to parse classifier response ({}): {}", error, text);
        progress.succeed(
            ClassificationResult::fallback(),
            Notice::warning("AI response was unclear. Using default values."),
        )
    }
}
