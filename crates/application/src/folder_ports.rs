use async_trait::async_trait;
use grafsdk_core::AppResult;
use grafsdk_domain::{ApiMessage, Folder, FolderPermission, FolderPermissionList};

/// Port for Grafana's folder and folder-permission endpoints.
#[async_trait]
pub trait FolderApi: Send + Sync {
    /// Lists folders visible to the caller, capped at `limit`.
    async fn list_folders(&self, limit: u32) -> AppResult<Vec<Folder>>;

    /// Returns one folder by uid.
    async fn folder_by_uid(&self, uid: &str) -> AppResult<Folder>;

    /// Returns one folder by instance-local id.
    async fn folder_by_id(&self, id: i64) -> AppResult<Folder>;

    /// Creates a folder and returns the stored representation.
    async fn create_folder(&self, folder: &Folder) -> AppResult<Folder>;

    /// Updates the folder identified by `folder.uid`.
    async fn update_folder(&self, folder: &Folder) -> AppResult<Folder>;

    /// Deletes a folder and everything stored in it.
    async fn delete_folder(&self, uid: &str) -> AppResult<ApiMessage>;

    /// Lists resolved grants for a folder, inherited ones included.
    async fn folder_permissions(&self, uid: &str) -> AppResult<Vec<FolderPermission>>;

    /// Replaces the direct grants of a folder.
    async fn replace_folder_permissions(
        &self,
        uid: &str,
        permissions: &FolderPermissionList,
    ) -> AppResult<ApiMessage>;
}
