use std::{future::Future, time::Duration};

use rand::Rng;
use reqwest::StatusCode;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1 << exponent);

        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };

        backoff.saturating_add(Duration::from_millis(jitter))
    }
}

/// A single failed request, before classification.
#[derive(Debug, thiserror::Error)]
pub enum RequestFailure {
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl RequestFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestFailure::Status { status, .. } => Some(*status),
            RequestFailure::Transport(error) => error.status(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("network error after {attempts} attempt(s): {source}")]
    Network {
        attempts: u32,
        #[source]
        source: RequestFailure,
    },
    #[error("authentication failed: {0}")]
    Authentication(#[source] RequestFailure),
    #[error("validation failed: {0}")]
    Validation(#[source] RequestFailure),
    #[error("request rejected: {0}")]
    Api(#[source] RequestFailure),
}

impl ServiceError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ServiceError::Network { source, .. } => source.status(),
            ServiceError::Authentication(source) | ServiceError::Validation(source) | ServiceError::Api(source) => {
                source.status()
            }
        }
    }
}

/// Runs `op`, retrying transport failures and server errors with exponential backoff.
///
/// 401/403 become `Authentication`, 400/422 become `Validation` (400 is not an auth failure),
/// other 4xx become `Api`; none of these are retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let failure = match op().await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        match failure.status() {
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(ServiceError::Authentication(failure))
            }
            Some(StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY) => {
                return Err(ServiceError::Validation(failure))
            }
            Some(status) if status.is_client_error() => return Err(ServiceError::Api(failure)),
            _ if attempt >= max_attempts => {
                return Err(ServiceError::Network {
                    attempts: attempt,
                    source: failure,
                })
            }
            _ => {
                let delay = policy.delay(attempt);
                tracing::warn!(attempt, ?delay, "request failed, retrying: {failure}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
