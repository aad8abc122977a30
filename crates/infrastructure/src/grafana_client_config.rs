use std::fmt::{Debug, Formatter};
use std::time::Duration;

use grafsdk_core::{AppError, AppResult};
use url::Url;

/// Default request timeout for Grafana calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of attempts for retryable requests.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Default linear backoff step between retries, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Credentials attached to every Grafana request.
#[derive(Clone, PartialEq, Eq)]
pub enum GrafanaCredentials {
    /// No authorization header.
    Anonymous,
    /// Service account token or API key sent as a bearer token.
    ApiKey(String),
    /// HTTP basic authentication.
    Basic {
        /// Grafana login.
        username: String,
        /// Grafana password.
        password: String,
    },
}

impl Debug for GrafanaCredentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => formatter.write_str("Anonymous"),
            Self::ApiKey(_) => formatter.write_str("ApiKey(<redacted>)"),
            Self::Basic { username, .. } => formatter
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Connection settings for [`crate::HttpFolderApi`].
#[derive(Debug, Clone)]
pub struct GrafanaClientConfig {
    /// Grafana root URL, possibly with a sub-path.
    pub base_url: Url,
    /// Request credentials.
    pub credentials: GrafanaCredentials,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts for retryable requests, at least one.
    pub max_attempts: u8,
    /// Linear backoff step, at least 50 ms.
    pub retry_backoff_ms: u64,
}

impl GrafanaClientConfig {
    /// Creates a config with default timeout and retry policy.
    pub fn new(base_url: &str, credentials: GrafanaCredentials) -> AppResult<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|error| {
            AppError::Validation(format!("invalid Grafana URL '{base_url}': {error}"))
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Grafana URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "Grafana URL '{base_url}' cannot carry a path"
            )));
        }

        Ok(Self {
            base_url,
            credentials,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        })
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the retry policy. Values are clamped to the minimums.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u8, retry_backoff_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff_ms = retry_backoff_ms.max(50);
        self
    }
}
