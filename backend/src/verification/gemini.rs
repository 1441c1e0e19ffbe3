use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::classifier::{ClassificationService, ClassifierError, VerificationRequest};
use crate::config::GeminiConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum GeminiSetupError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid Gemini base URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Google Gemini `generateContent` client with inline base64 image parts.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    api_key: Option<String>,
    endpoint: Url,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiSetupError> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            endpoint: Self::endpoint(&config.base_url, &config.model)?,
        })
    }

    fn endpoint(base_url: &str, model: &str) -> Result<Url, url::ParseError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)?.join(&format!("v1beta/models/{}:generateContent", model))
    }

    fn request_body<'a>(
        request: &'a VerificationRequest<'_>,
        prompt: &'a str,
    ) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: request.mime_type,
                            data: BASE64.encode(request.image),
                        },
                    },
                ],
            }],
        }
    }

    fn classify_error(status: StatusCode, body: &str) -> ClassifierError {
        let (api_status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.status, envelope.error.message),
            Err(_) => (String::new(), body.trim().to_string()),
        };

        if status == StatusCode::TOO_MANY_REQUESTS
            || api_status == "RESOURCE_EXHAUSTED"
            || body.contains("RESOURCE_EXHAUSTED")
        {
            ClassifierError::RateLimited(message)
        } else if api_status == "INVALID_ARGUMENT" || body.contains("INVALID_ARGUMENT") {
            ClassifierError::InvalidArgument(message)
        } else {
            ClassifierError::Transient(format!("HTTP {}: {}", status.as_u16(), message))
        }
    }

    fn response_text(response: GenerateContentResponse) -> Result<String, ClassifierError> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ClassifierError::Transient("Empty response from AI".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl ClassificationService for GeminiClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn classify(
        &self,
        request: &VerificationRequest<'_>,
        prompt: &str,
    ) -> Result<String, ClassifierError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ClassifierError::InvalidArgument("API key missing".to_string()))?;

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", api_key);

        log::debug!(
            "Sending {} byte {} image to Gemini (attempt {})",
            request.image.len(),
            request.mime_type,
            request.attempt_number
        );

        let response = self
            .http_client
            .post(url)
            .json(&Self::request_body(request, prompt))
            .send()
            .await
            .map_err(|e| ClassifierError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = Self::classify_error(status, &body);
            log::warn!("Gemini returned {}: {}", status, error);
            return Err(error);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Transient(format!("Unreadable response: {}", e)))?;

        Self::response_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};

    #[test]
    fn builds_generate_content_endpoint() {
        let url = GeminiClient::endpoint(DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL).unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );

        let proxied = GeminiClient::endpoint("http://localhost:9000/proxy", "m").unwrap();
        assert_eq!(
            proxied.as_str(),
            "http://localhost:9000/proxy/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn request_body_carries_prompt_and_base64_image() {
        let request = VerificationRequest {
            image: b"abc",
            mime_type: "image/png",
            attempt_number: 1,
        };
        let body = serde_json::to_value(GeminiClient::request_body(&request, "describe")).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
    }

    #[test]
    fn classifies_rate_limit_errors() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            GeminiClient::classify_error(StatusCode::TOO_MANY_REQUESTS, body),
            ClassifierError::RateLimited(m) if m == "Quota exceeded"
        ));
        assert!(matches!(
            GeminiClient::classify_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ClassifierError::RateLimited(_)
        ));
    }

    #[test]
    fn classifies_invalid_argument_errors() {
        let body = r#"{"error":{"code":400,"message":"Unsupported MIME type","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            GeminiClient::classify_error(StatusCode::BAD_REQUEST, body),
            ClassifierError::InvalidArgument(_)
        ));
    }

    #[test]
    fn other_errors_are_transient() {
        let body = r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#;
        assert!(matches!(
            GeminiClient::classify_error(StatusCode::SERVICE_UNAVAILABLE, body),
            ClassifierError::Transient(m) if m.contains("503")
        ));
        assert!(matches!(
            GeminiClient::classify_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            ClassifierError::Transient(_)
        ));
    }

    #[test]
    fn joins_candidate_text_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"wasteType\":"},{"text":"\"Paper\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            GeminiClient::response_text(response).unwrap(),
            r#"{"wasteType":"Paper"}"#
        );
    }

    #[test]
    fn empty_response_is_transient() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(
            GeminiClient::response_text(response),
            Err(ClassifierError::Transient(_))
        ));
    }

    #[test]
    fn missing_key_means_no_credential() {
        let client = GeminiClient::new(&GeminiConfig {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
        .unwrap();
        assert!(!client.has_credential());
    }
}
