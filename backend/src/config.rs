use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_PROMPT: &str = r#"Analyze this image of waste and provide a JSON response with the following fields:
    - wasteType: the type of waste shown (e.g., "Plastic Bottles", "Electronic Waste", "Food Waste")
    - quantity: estimated amount in kilograms only (e.g., "2 kg", "0.5 kg")
    - confidence: a number between 0 and 1 indicating confidence in the analysis

    Important: Always provide the quantity in kilograms (kg) only.

    Format the response as valid JSON only, like:
    {"wasteType": "...", "quantity": "... kg", "confidence": 0.9}"#;

/// Inline image data above this is refused by the classification service.
pub const MAX_IMAGE_BYTES_CEILING: usize = 20 * 1024 * 1024;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Failed to read verification config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse verification config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Tuning for the image verification controller.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_image_bytes: usize,
    pub prompt: String,
    pub no_waste_labels: Vec<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            max_image_bytes: 10 * 1024 * 1024,
            prompt: DEFAULT_PROMPT.to_string(),
            no_waste_labels: vec![
                "no waste".to_string(),
                "none".to_string(),
                "no waste detected".to_string(),
            ],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct VerificationFile {
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_image_bytes: Option<usize>,
    prompt: Option<String>,
    no_waste_labels: Option<Vec<String>>,
}

impl VerificationConfig {
    /// Overlays the keys present in `yaml` on top of the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: VerificationFile = serde_yaml::from_str(yaml)?;
        let defaults = Self::default();

        let max_retries = file.max_retries.unwrap_or(defaults.max_retries);
        if max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_retries",
                value: "0".to_string(),
            });
        }

        let max_image_bytes = file.max_image_bytes.unwrap_or(defaults.max_image_bytes);
        if max_image_bytes == 0 || max_image_bytes > MAX_IMAGE_BYTES_CEILING {
            return Err(ConfigError::InvalidValue {
                key: "max_image_bytes",
                value: max_image_bytes.to_string(),
            });
        }

        Ok(Self {
            max_retries,
            retry_delay: file
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            max_image_bytes,
            prompt: file.prompt.unwrap_or(defaults.prompt),
            no_waste_labels: file
                .no_waste_labels
                .map(|labels| labels.into_iter().map(|l| l.trim().to_lowercase()).collect())
                .unwrap_or(defaults.no_waste_labels),
        })
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct DynamoTables {
    pub users: String,
    pub reports: String,
    pub transactions: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub frontend_dir: String,
    pub gemini: GeminiConfig,
    /// `None` keeps everything in memory.
    pub dynamo: Option<DynamoTables>,
    pub s3_bucket: Option<String>,
    pub admin_emails: Vec<String>,
    pub verification: VerificationConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !v.contains("your_"))
        };

        let port = match configured("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw,
            })?,
            None => 8081,
        };

        let frontend_dir = configured("FRONTEND_DIR").unwrap_or_else(|| {
            match configured("CARGO_MANIFEST_DIR") {
                Some(manifest_dir) => format!("{}/../frontend/dist", manifest_dir),
                None => "/usr/src/app/frontend/dist".to_string(),
            }
        });

        let gemini = GeminiConfig {
            api_key: configured("GEMINI_API_KEY"),
            model: configured("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: configured("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
        };

        let dynamo = match (
            configured("DYNAMODB_USERS_TABLE"),
            configured("DYNAMODB_REPORTS_TABLE"),
            configured("DYNAMODB_TRANSACTIONS_TABLE"),
        ) {
            (Some(users), Some(reports), Some(transactions)) => Some(DynamoTables {
                users,
                reports,
                transactions,
            }),
            _ => None,
        };

        let admin_emails = configured("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let verification = match configured("VERIFICATION_CONFIG") {
            Some(path) => VerificationConfig::load(&path)?,
            None => VerificationConfig::default(),
        };

        Ok(Self {
            port,
            frontend_dir,
            gemini,
            dynamo,
            s3_bucket: configured("S3_BUCKET_NAME"),
            admin_emails,
            verification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8081);
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert!(config.dynamo.is_none());
        assert_eq!(config.verification.max_retries, 3);
        assert_eq!(config.verification.retry_delay, Duration::from_secs(2));
        assert_eq!(config.verification.max_image_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn placeholder_api_key_counts_as_missing() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "your_gemini_key")])).unwrap();
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn dynamo_requires_all_tables() {
        let partial = AppConfig::from_lookup(lookup_from(&[("DYNAMODB_USERS_TABLE", "users")]))
            .unwrap();
        assert!(partial.dynamo.is_none());

        let full = AppConfig::from_lookup(lookup_from(&[
            ("DYNAMODB_USERS_TABLE", "users"),
            ("DYNAMODB_REPORTS_TABLE", "reports"),
            ("DYNAMODB_TRANSACTIONS_TABLE", "transactions"),
        ]))
        .unwrap();
        assert_eq!(full.dynamo.unwrap().reports, "reports");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn admin_emails_are_normalised() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("ADMIN_EMAILS", " Admin@Example.com, ,ops@x.io")]))
                .unwrap();
        assert_eq!(config.admin_emails, vec!["admin@example.com", "ops@x.io"]);
    }

    #[test]
    fn verification_yaml_overrides_only_given_keys() {
        let config = VerificationConfig::from_yaml("max_retries: 5\nretry_delay_ms: 250\n").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
        assert_eq!(config.prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn zero_retries_is_rejected() {
        assert!(VerificationConfig::from_yaml("max_retries: 0").is_err());
    }

    #[test]
    fn image_limit_must_stay_within_the_ceiling() {
        let huge = format!("max_image_bytes: {}", usize::MAX);
        assert!(matches!(
            VerificationConfig::from_yaml(&huge),
            Err(ConfigError::InvalidValue { key: "max_image_bytes", .. })
        ));
        assert!(VerificationConfig::from_yaml("max_image_bytes: 0").is_err());

        let config = VerificationConfig::from_yaml("max_image_bytes: 1048576").unwrap();
        assert_eq!(config.max_image_bytes, 1024 * 1024);
    }
}
