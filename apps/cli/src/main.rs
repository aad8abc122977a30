//! Command-line client for Grafana folders and folder permissions.

#![forbid(unsafe_code)]

mod cli_config;
mod command;

use std::env;
use std::sync::Arc;

use grafsdk_application::{FolderApi, FolderService};
use grafsdk_core::{AppError, AppResult};
use grafsdk_infrastructure::{GrafanaClientConfig, HttpFolderApi, InMemoryFolderApi};
use serde_json::Value;
use tracing::info;

use crate::command::Command;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    cli_config::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    let config = cli_config::load_client_config()?;
    let dry_run = cli_config::dry_run_enabled();

    info!(
        grafana_url = %config.base_url,
        dry_run,
        max_attempts = config.max_attempts,
        timeout_secs = config.timeout.as_secs(),
        command = command.name(),
        "grafsdk-cli started"
    );

    let service = FolderService::new(folder_api(config, dry_run)?);
    let output = run(&service, command).await?;

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|error| AppError::Internal(format!("failed to render output: {error}")))?;
    println!("{rendered}");

    Ok(())
}

/// Picks the live HTTP adapter, or an empty in-process Grafana for dry runs.
fn folder_api(config: GrafanaClientConfig, dry_run: bool) -> AppResult<Arc<dyn FolderApi>> {
    if dry_run {
        return Ok(Arc::new(InMemoryFolderApi::new()));
    }

    Ok(Arc::new(HttpFolderApi::new(config)?))
}

async fn run(service: &FolderService, command: Command) -> AppResult<Value> {
    match command {
        Command::List { limit } => to_json(&service.list_folders(limit).await?),
        Command::Get { uid } => to_json(&service.folder(uid.as_str()).await?),
        Command::Create { title, uid } => {
            let folder = service.create_folder(title.as_str(), uid).await?;
            info!(folder_uid = %folder.uid, folder_id = folder.id, "folder created");
            to_json(&folder)
        }
        Command::Rename { uid, title } => {
            let folder = service.rename_folder(uid.as_str(), title.as_str()).await?;
            info!(folder_uid = %folder.uid, version = folder.version, "folder renamed");
            to_json(&folder)
        }
        Command::Delete { uid } => to_json(&service.delete_folder(uid.as_str()).await?),
        Command::Permissions { uid } => {
            to_json(&service.folder_permissions(uid.as_str()).await?)
        }
        Command::ResetPermissions { uid } => {
            let written = service.apply_default_permissions(uid.as_str()).await?;
            info!(folder_uid = %uid, "folder permissions reset to role defaults");
            to_json(&written)
        }
        Command::Grant { uid, item } => {
            let subject = item.subject.to_string();
            let written = service.grant_permission(uid.as_str(), item).await?;
            info!(folder_uid = %uid, subject = %subject, "folder permission granted");
            to_json(&written)
        }
        Command::Revoke { uid, subject } => {
            let written = service.revoke_permission(uid.as_str(), &subject).await?;
            info!(folder_uid = %uid, subject = %subject, "folder permission revoked");
            to_json(&written)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|error| AppError::Internal(format!("failed to encode output: {error}")))
}
