use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grafsdk_application::FolderApi;
use grafsdk_core::{AppError, AppResult};
use grafsdk_domain::{
    ApiMessage, Folder, FolderPermission, FolderPermissionItem, FolderPermissionList,
    PermissionSubject,
};
use tracing::debug;

/// In-memory folder API for tests and dry runs.
///
/// Behaves like a Grafana instance where the caller is an administrator: new
/// folders start with the default role grants, updates are version-checked
/// unless `overwrite` is set, and unknown uids are reported as not found.
#[derive(Debug, Default)]
pub struct InMemoryFolderApi {
    state: Mutex<InMemoryFolderState>,
}

#[derive(Debug, Default)]
struct InMemoryFolderState {
    folders: Vec<Folder>,
    permissions: HashMap<String, StoredPermissions>,
    next_id: i64,
}

#[derive(Debug)]
struct StoredPermissions {
    items: Vec<FolderPermissionItem>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl InMemoryFolderApi {
    /// Creates an empty in-memory API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> AppResult<MutexGuard<'_, InMemoryFolderState>> {
        self.state.lock().map_err(|error| {
            AppError::Internal(format!("failed to lock in-memory folder state: {error}"))
        })
    }
}

impl InMemoryFolderState {
    fn position(&self, uid: &str) -> AppResult<usize> {
        self.folders
            .iter()
            .position(|folder| folder.uid == uid)
            .ok_or_else(|| AppError::NotFound(format!("folder '{uid}' does not exist")))
    }
}

#[async_trait]
impl FolderApi for InMemoryFolderApi {
    async fn list_folders(&self, limit: u32) -> AppResult<Vec<Folder>> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self.state()?.folders.iter().take(limit).cloned().collect())
    }

    async fn folder_by_uid(&self, uid: &str) -> AppResult<Folder> {
        let state = self.state()?;
        let position = state.position(uid)?;
        Ok(state.folders[position].clone())
    }

    async fn folder_by_id(&self, id: i64) -> AppResult<Folder> {
        self.state()?
            .folders
            .iter()
            .find(|folder| folder.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("folder {id} does not exist")))
    }

    async fn create_folder(&self, folder: &Folder) -> AppResult<Folder> {
        let mut state = self.state()?;

        if state
            .folders
            .iter()
            .any(|existing| existing.title.eq_ignore_ascii_case(folder.title.as_str()))
        {
            return Err(AppError::Conflict(format!(
                "a folder named '{}' already exists",
                folder.title
            )));
        }

        if !folder.uid.is_empty() && state.position(folder.uid.as_str()).is_ok() {
            return Err(AppError::Conflict(format!(
                "a folder with uid '{}' already exists",
                folder.uid
            )));
        }

        state.next_id += 1;
        let id = state.next_id;
        let uid = if folder.uid.is_empty() {
            format!("folder-{id}")
        } else {
            folder.uid.clone()
        };
        let now = Utc::now();
        let timestamp = now.to_rfc3339();

        let stored = Folder {
            id,
            url: format!("/dashboards/f/{uid}/{}", slugify(folder.title.as_str())),
            uid: uid.clone(),
            title: folder.title.clone(),
            has_acl: false,
            can_save: true,
            can_edit: true,
            can_admin: true,
            created_by: folder.created_by.clone(),
            created: timestamp.clone(),
            updated_by: folder.created_by.clone(),
            updated: timestamp,
            version: 1,
            overwrite: false,
        };

        state.folders.push(stored.clone());
        state.permissions.insert(
            uid,
            StoredPermissions {
                items: FolderPermissionList::default_roles().items,
                created: now,
                updated: now,
            },
        );
        debug!(folder_uid = %stored.uid, folder_id = id, "in-memory folder created");

        Ok(stored)
    }

    async fn update_folder(&self, folder: &Folder) -> AppResult<Folder> {
        let mut state = self.state()?;
        let position = state.position(folder.uid.as_str())?;
        let stored = &mut state.folders[position];

        if !folder.overwrite && folder.version != stored.version {
            return Err(AppError::Conflict(format!(
                "folder '{}' changed since version {}",
                folder.uid, folder.version
            )));
        }

        stored.title = folder.title.clone();
        stored.url = format!("/dashboards/f/{}/{}", stored.uid, slugify(stored.title.as_str()));
        stored.updated_by = folder.updated_by.clone();
        stored.updated = Utc::now().to_rfc3339();
        stored.version += 1;
        debug!(folder_uid = %stored.uid, version = stored.version, "in-memory folder updated");

        Ok(stored.clone())
    }

    async fn delete_folder(&self, uid: &str) -> AppResult<ApiMessage> {
        let mut state = self.state()?;
        let position = state.position(uid)?;
        let removed = state.folders.remove(position);
        state.permissions.remove(uid);
        debug!(folder_uid = %uid, "in-memory folder deleted");

        Ok(ApiMessage {
            message: format!("Folder {} deleted", removed.title),
        })
    }

    async fn folder_permissions(&self, uid: &str) -> AppResult<Vec<FolderPermission>> {
        let state = self.state()?;
        let folder = &state.folders[state.position(uid)?];
        let Some(stored) = state.permissions.get(uid) else {
            return Ok(Vec::new());
        };

        Ok(stored
            .items
            .iter()
            .zip(1_i64..)
            .map(|(item, id)| resolved_permission(folder, stored, item, id))
            .collect())
    }

    async fn replace_folder_permissions(
        &self,
        uid: &str,
        permissions: &FolderPermissionList,
    ) -> AppResult<ApiMessage> {
        let mut state = self.state()?;
        state.position(uid)?;

        let now = Utc::now();
        let created = state
            .permissions
            .get(uid)
            .map_or(now, |stored| stored.created);
        state.permissions.insert(
            uid.to_owned(),
            StoredPermissions {
                items: permissions.items.clone(),
                created,
                updated: now,
            },
        );
        debug!(
            folder_uid = %uid,
            item_count = permissions.items.len(),
            "in-memory folder permissions replaced"
        );

        Ok(ApiMessage {
            message: "Folder permissions updated".to_owned(),
        })
    }
}

fn resolved_permission(
    folder: &Folder,
    stored: &StoredPermissions,
    item: &FolderPermissionItem,
    id: i64,
) -> FolderPermission {
    let mut permission = FolderPermission {
        id,
        folder_id: folder.id,
        created: stored.created,
        updated: stored.updated,
        permission: item.permission,
        permission_name: item.permission.name().unwrap_or_default().to_owned(),
        uid: folder.uid.clone(),
        title: folder.title.clone(),
        slug: slugify(folder.title.as_str()),
        is_folder: true,
        url: folder.url.clone(),
        ..FolderPermission::default()
    };

    match &item.subject {
        PermissionSubject::Role(role) => permission.role = role.as_str().to_owned(),
        PermissionSubject::Team(team_id) => permission.team_id = team_id.get(),
        PermissionSubject::User(user_id) => permission.user_id = user_id.get(),
    }

    permission
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|character: char| !character.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
