//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod grafana_client_config;
mod http_folder_api;
mod in_memory_folder_api;

pub use grafana_client_config::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT, GrafanaClientConfig,
    GrafanaCredentials,
};
pub use http_folder_api::HttpFolderApi;
pub use in_memory_folder_api::InMemoryFolderApi;
