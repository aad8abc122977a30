//! Application services and ports.

#![forbid(unsafe_code)]

mod folder_ports;
mod folder_service;

pub use folder_ports::FolderApi;
pub use folder_service::{DEFAULT_FOLDER_LIST_LIMIT, FolderService};
