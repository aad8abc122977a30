//! Grafana folder and folder-permission resources as exchanged over the HTTP API.

#![forbid(unsafe_code)]

mod folder;
mod permission;

pub use folder::{ApiMessage, Folder};
pub use permission::{
    DEFAULT_ROLES_FOLDER_PERMISSIONS, FolderPermission, FolderPermissionItem,
    FolderPermissionList, PermissionLevel, PermissionSubject, ROLE_ADMIN, ROLE_EDITOR,
    ROLE_VIEWER, RoleName,
};
