use std::time::Duration;

use async_trait::async_trait;
use grafsdk_application::FolderApi;
use grafsdk_core::{AppError, AppResult};
use grafsdk_domain::{ApiMessage, Folder, FolderPermission, FolderPermissionList};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::{GrafanaClientConfig, GrafanaCredentials};

/// HTTP implementation of the folder port against a live Grafana instance.
pub struct HttpFolderApi {
    http_client: reqwest::Client,
    config: GrafanaClientConfig,
}

impl HttpFolderApi {
    /// Creates an adapter with its own HTTP client.
    pub fn new(config: GrafanaClientConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

        Ok(Self::with_client(http_client, config))
    }

    /// Creates an adapter sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client, config: GrafanaClientConfig) -> Self {
        let config = GrafanaClientConfig {
            max_attempts: config.max_attempts.max(1),
            retry_backoff_ms: config.retry_backoff_ms.max(50),
            ..config
        };

        Self {
            http_client,
            config,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        folder_endpoint(&self.config.base_url, segments)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.credentials {
            GrafanaCredentials::Anonymous => builder,
            GrafanaCredentials::ApiKey(token) => builder.bearer_auth(token),
            GrafanaCredentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn execute<T, F>(&self, operation: &str, method: Method, mut build: F) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: FnMut(&reqwest::Client, Method) -> reqwest::RequestBuilder,
    {
        let max_attempts = if method == Method::GET {
            self.config.max_attempts
        } else {
            1
        };
        let mut attempt = 0_u8;
        let mut last_error: Option<AppError> = None;

        while attempt < max_attempts {
            attempt = attempt.saturating_add(1);
            let request = self.authorize(
                build(&self.http_client, method.clone()).header("Accept", "application/json"),
            );

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(operation, status = response.status().as_u16(), "grafana request succeeded");
                    return response.json::<T>().await.map_err(|error| {
                        AppError::Internal(format!(
                            "failed to parse {operation} response body: {error}"
                        ))
                    });
                }
                Ok(response) if is_transient(response.status()) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_owned());
                    warn!(
                        operation,
                        attempt,
                        status = status.as_u16(),
                        "transient grafana response"
                    );
                    last_error = Some(status_error(operation, status, body.as_str()));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_owned());
                    return Err(status_error(operation, status, body.as_str()));
                }
                Err(error) => {
                    warn!(operation, attempt, error = %error, "grafana transport error");
                    last_error = Some(AppError::Internal(format!(
                        "{operation} transport error: {error}"
                    )));
                }
            }

            if attempt < max_attempts {
                let delay = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Internal(format!("{operation} exhausted retries"))))
    }
}

#[async_trait]
impl FolderApi for HttpFolderApi {
    async fn list_folders(&self, limit: u32) -> AppResult<Vec<Folder>> {
        let mut url = self.endpoint(&[])?;
        url.query_pairs_mut()
            .append_pair("limit", limit.to_string().as_str());

        self.execute("list folders", Method::GET, |client, method| {
            client.request(method, url.clone())
        })
        .await
    }

    async fn folder_by_uid(&self, uid: &str) -> AppResult<Folder> {
        let url = self.endpoint(&[uid])?;
        self.execute("get folder", Method::GET, |client, method| {
            client.request(method, url.clone())
        })
        .await
    }

    async fn folder_by_id(&self, id: i64) -> AppResult<Folder> {
        let id = id.to_string();
        let url = self.endpoint(&["id", id.as_str()])?;
        self.execute("get folder by id", Method::GET, |client, method| {
            client.request(method, url.clone())
        })
        .await
    }

    async fn create_folder(&self, folder: &Folder) -> AppResult<Folder> {
        let url = self.endpoint(&[])?;
        self.execute("create folder", Method::POST, |client, method| {
            client.request(method, url.clone()).json(folder)
        })
        .await
    }

    async fn update_folder(&self, folder: &Folder) -> AppResult<Folder> {
        let url = self.endpoint(&[folder.uid.as_str()])?;
        self.execute("update folder", Method::PUT, |client, method| {
            client.request(method, url.clone()).json(folder)
        })
        .await
    }

    async fn delete_folder(&self, uid: &str) -> AppResult<ApiMessage> {
        let url = self.endpoint(&[uid])?;
        self.execute("delete folder", Method::DELETE, |client, method| {
            client.request(method, url.clone())
        })
        .await
    }

    async fn folder_permissions(&self, uid: &str) -> AppResult<Vec<FolderPermission>> {
        let url = self.endpoint(&[uid, "permissions"])?;
        self.execute("get folder permissions", Method::GET, |client, method| {
            client.request(method, url.clone())
        })
        .await
    }

    async fn replace_folder_permissions(
        &self,
        uid: &str,
        permissions: &FolderPermissionList,
    ) -> AppResult<ApiMessage> {
        let url = self.endpoint(&[uid, "permissions"])?;
        self.execute(
            "update folder permissions",
            Method::POST,
            |client, method| client.request(method, url.clone()).json(permissions),
        )
        .await
    }
}

/// Builds `<base>/api/folders/<segments..>`, percent-encoding each segment.
fn folder_endpoint(base_url: &Url, segments: &[&str]) -> AppResult<Url> {
    let mut url = base_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| AppError::Validation(format!("Grafana URL '{base_url}' cannot carry a path")))?
        .pop_if_empty()
        .extend(["api", "folders"])
        .extend(segments);

    Ok(url)
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Maps a non-success Grafana response to an error category.
fn status_error(operation: &str, status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ApiMessage>(body)
        .ok()
        .map(|message| message.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_owned());
    let message = format!("{operation} returned status {}: {detail}", status.as_u16());

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::Validation(message)
        }
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => AppError::Conflict(message),
        _ => AppError::Internal(message),
    }
}

#[cfg(test)]
mod tests;
