use serde::{Deserialize, Serialize};

/// Grafana dashboard folder.
///
/// Mirrors the JSON returned by `GET /api/folders` and accepted by the create and
/// update endpoints. Every field falls back to its zero value when the server omits
/// it. The `uid` is the stable identifier; `id` is assigned per Grafana instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Folder {
    /// Instance-local numeric identifier.
    pub id: i64,
    /// Stable external identifier.
    pub uid: String,
    /// Display title.
    pub title: String,
    /// Relative URL of the folder page.
    pub url: String,
    /// Whether the folder carries its own access control list.
    pub has_acl: bool,
    /// Whether the caller may save the folder.
    pub can_save: bool,
    /// Whether the caller may edit the folder.
    pub can_edit: bool,
    /// Whether the caller may administer the folder.
    pub can_admin: bool,
    /// Login of the creator.
    pub created_by: String,
    /// Creation timestamp as sent by the server.
    pub created: String,
    /// Login of the last editor.
    pub updated_by: String,
    /// Last update timestamp as sent by the server.
    pub updated: String,
    /// Optimistic-locking version.
    pub version: i64,
    /// Forces an update even when `version` is stale.
    pub overwrite: bool,
}

impl Folder {
    /// Creates a folder payload for a create request.
    #[must_use]
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Status body returned by Grafana for delete and permission-update calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiMessage {
    /// Human-readable outcome.
    pub message: String,
}
