use std::env;
use std::time::Duration;

use grafsdk_core::{AppError, AppResult};
use grafsdk_infrastructure::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT, GrafanaClientConfig,
    GrafanaCredentials,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_GRAFANA_URL: &str = "http://127.0.0.1:3000";

/// Loads the Grafana client configuration from the process environment.
pub fn load_client_config() -> AppResult<GrafanaClientConfig> {
    load_client_config_from(|name| env::var(name).ok())
}

/// Loads the Grafana client configuration through an arbitrary variable lookup.
pub fn load_client_config_from<F>(lookup: F) -> AppResult<GrafanaClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    };

    let base_url = read("GRAFANA_URL").unwrap_or_else(|| DEFAULT_GRAFANA_URL.to_owned());
    let credentials = match (read("GRAFANA_API_KEY"), read("GRAFANA_USER")) {
        (Some(api_key), _) => GrafanaCredentials::ApiKey(api_key),
        (None, Some(username)) => GrafanaCredentials::Basic {
            username,
            password: read("GRAFANA_PASSWORD").ok_or_else(|| {
                AppError::Validation("GRAFANA_PASSWORD is required with GRAFANA_USER".to_owned())
            })?,
        },
        (None, None) => GrafanaCredentials::Anonymous,
    };

    let timeout_secs = parse_var(&read, "GRAFANA_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?;
    let max_attempts = parse_var(&read, "GRAFANA_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
    let retry_backoff_ms = parse_var(&read, "GRAFANA_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?;

    if timeout_secs == 0 {
        return Err(AppError::Validation(
            "GRAFANA_TIMEOUT_SECS must be greater than zero".to_owned(),
        ));
    }

    if max_attempts == 0 {
        return Err(AppError::Validation(
            "GRAFANA_MAX_ATTEMPTS must be greater than zero".to_owned(),
        ));
    }

    Ok(GrafanaClientConfig::new(base_url.as_str(), credentials)?
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_retry(max_attempts, retry_backoff_ms))
}

/// Whether `GRAFANA_DRY_RUN` asks for an in-process Grafana instead of the HTTP API.
pub fn dry_run_enabled() -> bool {
    dry_run_from(|name| env::var(name).ok())
}

/// Reads the dry-run switch through an arbitrary variable lookup.
pub fn dry_run_from<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("GRAFANA_DRY_RUN")
        .unwrap_or_else(|| "false".to_owned())
        .trim()
        .eq_ignore_ascii_case("true")
}

/// Installs the global tracing subscriber, writing to stderr.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_var<T, R>(read: &R, name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    R: Fn(&str) -> Option<String>,
{
    match read(name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
