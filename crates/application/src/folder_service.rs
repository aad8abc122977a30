use std::sync::Arc;

use grafsdk_core::{AppError, AppResult, NonEmptyString};
use grafsdk_domain::{
    ApiMessage, Folder, FolderPermission, FolderPermissionItem, FolderPermissionList,
    PermissionSubject,
};

use crate::FolderApi;

/// Folder list size requested when the caller does not choose one.
pub const DEFAULT_FOLDER_LIST_LIMIT: u32 = 1000;

/// Application service for folder and folder-permission use-cases.
#[derive(Clone)]
pub struct FolderService {
    api: Arc<dyn FolderApi>,
}

impl FolderService {
    /// Creates a service from a folder API implementation.
    #[must_use]
    pub fn new(api: Arc<dyn FolderApi>) -> Self {
        Self { api }
    }

    /// Lists folders, defaulting to [`DEFAULT_FOLDER_LIST_LIMIT`].
    pub async fn list_folders(&self, limit: Option<u32>) -> AppResult<Vec<Folder>> {
        let limit = limit.unwrap_or(DEFAULT_FOLDER_LIST_LIMIT);
        if limit == 0 {
            return Err(AppError::Validation(
                "folder list limit must be greater than zero".to_owned(),
            ));
        }

        self.api.list_folders(limit).await
    }

    /// Returns one folder by uid.
    pub async fn folder(&self, uid: &str) -> AppResult<Folder> {
        let uid = NonEmptyString::named("folder uid", uid)?;
        self.api.folder_by_uid(uid.as_str()).await
    }

    /// Returns one folder by instance-local id.
    pub async fn folder_by_id(&self, id: i64) -> AppResult<Folder> {
        if id <= 0 {
            return Err(AppError::Validation(format!(
                "folder id must be positive, got {id}"
            )));
        }

        self.api.folder_by_id(id).await
    }

    /// Creates a folder. Grafana generates the uid when none is given.
    pub async fn create_folder(&self, title: &str, uid: Option<String>) -> AppResult<Folder> {
        let title = NonEmptyString::named("folder title", title)?;
        let uid = uid
            .map(|uid| NonEmptyString::named("folder uid", uid))
            .transpose()?;

        let mut folder = Folder::with_title(title);
        if let Some(uid) = uid {
            folder.uid = uid.into();
        }

        self.api.create_folder(&folder).await
    }

    /// Renames a folder, failing with a conflict if it changed since it was read.
    pub async fn rename_folder(&self, uid: &str, title: &str) -> AppResult<Folder> {
        let title = NonEmptyString::named("folder title", title)?;
        let mut folder = self.folder(uid).await?;

        folder.title = title.into();
        folder.overwrite = false;

        self.api.update_folder(&folder).await
    }

    /// Deletes a folder.
    pub async fn delete_folder(&self, uid: &str) -> AppResult<ApiMessage> {
        let uid = NonEmptyString::named("folder uid", uid)?;
        self.api.delete_folder(uid.as_str()).await
    }

    /// Lists resolved grants for a folder.
    pub async fn folder_permissions(&self, uid: &str) -> AppResult<Vec<FolderPermission>> {
        let uid = NonEmptyString::named("folder uid", uid)?;
        self.api.folder_permissions(uid.as_str()).await
    }

    /// Replaces the direct grants of a folder.
    pub async fn replace_permissions(
        &self,
        uid: &str,
        permissions: &FolderPermissionList,
    ) -> AppResult<ApiMessage> {
        let uid = NonEmptyString::named("folder uid", uid)?;
        self.api
            .replace_folder_permissions(uid.as_str(), permissions)
            .await
    }

    /// Resets a folder to the default Viewer and Editor role grants.
    pub async fn apply_default_permissions(&self, uid: &str) -> AppResult<FolderPermissionList> {
        let permissions = FolderPermissionList::default_roles();
        self.replace_permissions(uid, &permissions).await?;
        Ok(permissions)
    }

    /// Adds or replaces the direct grant for `item.subject`, keeping all others.
    pub async fn grant_permission(
        &self,
        uid: &str,
        item: FolderPermissionItem,
    ) -> AppResult<FolderPermissionList> {
        let mut items = self.direct_grant_items(uid).await?;

        match items
            .iter_mut()
            .find(|existing| existing.subject == item.subject)
        {
            Some(existing) => existing.permission = item.permission,
            None => items.push(item),
        }

        let permissions = FolderPermissionList::new(items);
        self.replace_permissions(uid, &permissions).await?;
        Ok(permissions)
    }

    /// Removes the direct grant for `subject`, keeping all others.
    pub async fn revoke_permission(
        &self,
        uid: &str,
        subject: &PermissionSubject,
    ) -> AppResult<FolderPermissionList> {
        let mut items = self.direct_grant_items(uid).await?;
        let before = items.len();
        items.retain(|existing| &existing.subject != subject);

        if items.len() == before {
            return Err(AppError::NotFound(format!(
                "folder '{uid}' has no direct grant for {subject}"
            )));
        }

        let permissions = FolderPermissionList::new(items);
        self.replace_permissions(uid, &permissions).await?;
        Ok(permissions)
    }

    async fn direct_grant_items(&self, uid: &str) -> AppResult<Vec<FolderPermissionItem>> {
        Ok(self
            .folder_permissions(uid)
            .await?
            .iter()
            .filter_map(direct_grant_item)
            .collect())
    }
}

/// Converts a resolved grant into a write item. Inherited grants and grants
/// without a subject yield `None`.
fn direct_grant_item(permission: &FolderPermission) -> Option<FolderPermissionItem> {
    if permission.inherited {
        return None;
    }

    let subject = if !permission.role.trim().is_empty() {
        PermissionSubject::role(permission.role.as_str())
    } else if permission.team_id > 0 {
        PermissionSubject::team(permission.team_id)
    } else if permission.user_id > 0 {
        PermissionSubject::user(permission.user_id)
    } else {
        return None;
    };

    subject
        .ok()
        .map(|subject| FolderPermissionItem::new(subject, permission.permission))
}
