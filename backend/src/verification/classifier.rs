use async_trait::async_trait;

/// One classification attempt for one image. Dropped once the attempt resolves.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    pub image: &'a [u8],
    pub mime_type: &'a str,
    /// 1-indexed.
    pub attempt_number: u32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    /// The service is throttling us; retrying right away only makes it worse.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The service rejected the image itself.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Transient(String),
}

/// External vision model that labels a waste image.
///
/// Implementations return the raw response text; reading it is the caller's job.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    fn has_credential(&self) -> bool;

    async fn classify(
        &self,
        request: &VerificationRequest<'_>,
        prompt: &str,
    ) -> Result<String, ClassifierError>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed list of responses, one per call.
    pub struct ScriptedClassifier {
        responses: Mutex<VecDeque<Result<String, ClassifierError>>>,
        calls: AtomicU32,
        credential: bool,
    }

    impl ScriptedClassifier {
        pub fn new(responses: Vec<Result<String, ClassifierError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
                credential: true,
            }
        }

        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        pub fn without_credential() -> Self {
            Self {
                credential: false,
                ..Self::new(Vec::new())
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClassificationService for ScriptedClassifier {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn classify(
            &self,
            _request: &VerificationRequest<'_>,
            _prompt: &str,
        ) -> Result<String, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClassifierError::Transient("script exhausted".into())))
        }
    }
}
