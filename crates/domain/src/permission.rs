use std::fmt::{Display, Formatter};
use std::num::NonZeroI64;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use grafsdk_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Built-in Grafana role granting read access.
pub const ROLE_VIEWER: &str = "Viewer";

/// Built-in Grafana role granting edit access.
pub const ROLE_EDITOR: &str = "Editor";

/// Built-in Grafana role granting organization administration.
pub const ROLE_ADMIN: &str = "Admin";

/// Folder permission tier, encoded on the wire as its integer ordinal.
///
/// Grafana assigns `1` to View, `2` to Edit and `4` to Admin. Ordinal `3` is
/// reserved and has no name, but any ordinal the server sends is carried through
/// unchanged. Ordinal `0` means the level is unset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PermissionLevel(i64);

impl PermissionLevel {
    /// No level assigned.
    pub const UNSET: Self = Self(0);
    /// Read-only access.
    pub const VIEW: Self = Self(1);
    /// Read and write access.
    pub const EDIT: Self = Self(2);
    // 3 is reserved.
    /// Full control including permission management.
    pub const ADMIN: Self = Self(4);

    /// Wraps a raw wire ordinal.
    #[must_use]
    pub const fn from_ordinal(value: i64) -> Self {
        Self(value)
    }

    /// Returns the wire ordinal.
    #[must_use]
    pub const fn ordinal(self) -> i64 {
        self.0
    }

    /// Returns the Grafana display name for named levels.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::VIEW => Some("View"),
            Self::EDIT => Some("Edit"),
            Self::ADMIN => Some("Admin"),
            _ => None,
        }
    }

    /// Returns whether no level has been assigned.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }
}

impl Display for PermissionLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => formatter.write_str(name),
            None => write!(formatter, "{}", self.0),
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "view" => Ok(Self::VIEW),
            "edit" => Ok(Self::EDIT),
            "admin" => Ok(Self::ADMIN),
            _ => trimmed.parse::<i64>().map(Self).map_err(|_| {
                AppError::Validation(format!("unknown permission level '{value}'"))
            }),
        }
    }
}

/// Permission grant resolved by Grafana for one folder.
///
/// Returned by `GET /api/folders/{uid}/permissions`. Exactly one of user, team or
/// role identifies the grantee; the server guarantees this, the type does not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderPermission {
    /// Grant identifier.
    #[serde(rename = "ID", alias = "id")]
    pub id: i64,
    /// Folder the grant applies to.
    pub folder_id: i64,
    /// Grant creation time.
    pub created: DateTime<Utc>,
    /// Grant last update time.
    pub updated: DateTime<Utc>,
    /// Granted user, or `0`.
    pub user_id: i64,
    /// Login of the granted user.
    pub user_login: String,
    /// Email of the granted user.
    pub user_email: String,
    /// Avatar URL of the granted user.
    pub user_avatar_url: String,
    /// Granted team, or `0`.
    pub team_id: i64,
    /// Email of the granted team.
    pub team_email: String,
    /// Avatar URL of the granted team.
    pub team_avatar_url: String,
    /// Name of the granted team.
    pub team: String,
    /// Granted built-in role, or empty.
    pub role: String,
    /// Granted level.
    pub permission: PermissionLevel,
    /// Display name of the granted level.
    pub permission_name: String,
    /// Folder uid.
    pub uid: String,
    /// Folder title.
    pub title: String,
    /// Folder slug.
    pub slug: String,
    /// Whether the target is a folder rather than a dashboard.
    pub is_folder: bool,
    /// Folder URL.
    pub url: String,
    /// Whether the grant comes from a parent scope.
    pub inherited: bool,
}

/// Non-blank name of a Grafana role used as a grantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleName(String);

impl RoleName {
    /// Creates a role name, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::named("role name", value).map(|value| Self(value.into()))
    }

    /// The built-in [`ROLE_VIEWER`] role.
    #[must_use]
    pub fn viewer() -> Self {
        Self(ROLE_VIEWER.to_owned())
    }

    /// The built-in [`ROLE_EDITOR`] role.
    #[must_use]
    pub fn editor() -> Self {
        Self(ROLE_EDITOR.to_owned())
    }

    /// The built-in [`ROLE_ADMIN`] role.
    #[must_use]
    pub fn admin() -> Self {
        Self(ROLE_ADMIN.to_owned())
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

/// Grantee of a folder permission item.
///
/// Holds only set values: a blank role or a zero id cannot be represented, so
/// every subject serializes to a present, non-zero key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PermissionSubject {
    /// Role name such as [`ROLE_VIEWER`].
    Role(RoleName),
    /// Team identifier.
    Team(NonZeroI64),
    /// User identifier.
    User(NonZeroI64),
}

impl PermissionSubject {
    /// Creates a role subject.
    pub fn role(role: impl Into<String>) -> AppResult<Self> {
        RoleName::new(role).map(Self::Role)
    }

    /// Creates a team subject, rejecting id `0`.
    pub fn team(team_id: i64) -> AppResult<Self> {
        non_zero_id("team", team_id).map(Self::Team)
    }

    /// Creates a user subject, rejecting id `0`.
    pub fn user(user_id: i64) -> AppResult<Self> {
        non_zero_id("user", user_id).map(Self::User)
    }
}

fn non_zero_id(kind: &str, value: i64) -> AppResult<NonZeroI64> {
    NonZeroI64::new(value)
        .ok_or_else(|| AppError::Validation(format!("{kind} id must not be zero")))
}

impl Display for PermissionSubject {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Role(role) => write!(formatter, "role:{role}"),
            Self::Team(team_id) => write!(formatter, "team:{team_id}"),
            Self::User(user_id) => write!(formatter, "user:{user_id}"),
        }
    }
}

/// One entry of a folder permission update request.
///
/// Serialized flat as `{"role"|"teamId"|"userId": .., "permission": ..}` with the
/// unused subject keys omitted and `permission` omitted while unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FolderPermissionItemWire", into = "FolderPermissionItemWire")]
pub struct FolderPermissionItem {
    /// Grantee.
    pub subject: PermissionSubject,
    /// Granted level.
    pub permission: PermissionLevel,
}

impl FolderPermissionItem {
    /// Creates an item for an already validated subject.
    #[must_use]
    pub fn new(subject: PermissionSubject, permission: PermissionLevel) -> Self {
        Self {
            subject,
            permission,
        }
    }

    /// Creates an item granting a role.
    pub fn role(role: impl Into<String>, permission: PermissionLevel) -> AppResult<Self> {
        PermissionSubject::role(role).map(|subject| Self::new(subject, permission))
    }

    /// Creates an item granting a team.
    pub fn team(team_id: i64, permission: PermissionLevel) -> AppResult<Self> {
        PermissionSubject::team(team_id).map(|subject| Self::new(subject, permission))
    }

    /// Creates an item granting a user.
    pub fn user(user_id: i64, permission: PermissionLevel) -> AppResult<Self> {
        PermissionSubject::user(user_id).map(|subject| Self::new(subject, permission))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderPermissionItemWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    team_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "PermissionLevel::is_unset")]
    permission: PermissionLevel,
}

impl From<FolderPermissionItem> for FolderPermissionItemWire {
    fn from(item: FolderPermissionItem) -> Self {
        let mut wire = Self {
            role: None,
            team_id: None,
            user_id: None,
            permission: item.permission,
        };
        match item.subject {
            PermissionSubject::Role(role) => wire.role = Some(role.into()),
            PermissionSubject::Team(team_id) => wire.team_id = Some(team_id.get()),
            PermissionSubject::User(user_id) => wire.user_id = Some(user_id.get()),
        }
        wire
    }
}

impl TryFrom<FolderPermissionItemWire> for FolderPermissionItem {
    type Error = AppError;

    fn try_from(wire: FolderPermissionItemWire) -> Result<Self, Self::Error> {
        // Zero values count as absent, as Grafana omits them.
        let subjects = [
            wire.role
                .and_then(|role| RoleName::new(role).ok())
                .map(PermissionSubject::Role),
            wire.team_id
                .and_then(NonZeroI64::new)
                .map(PermissionSubject::Team),
            wire.user_id
                .and_then(NonZeroI64::new)
                .map(PermissionSubject::User),
        ];

        let mut present = subjects.into_iter().flatten();
        let subject = present.next().ok_or_else(|| {
            AppError::Validation(
                "permission item requires one of 'role', 'teamId' or 'userId'".to_owned(),
            )
        })?;
        if present.next().is_some() {
            return Err(AppError::Validation(
                "permission item must set only one of 'role', 'teamId' or 'userId'".to_owned(),
            ));
        }

        Ok(Self {
            subject,
            permission: wire.permission,
        })
    }
}

/// Default grants for a freshly created folder: Viewer may view, Editor may edit.
pub static DEFAULT_ROLES_FOLDER_PERMISSIONS: LazyLock<[FolderPermissionItem; 2]> =
    LazyLock::new(|| {
        [
            FolderPermissionItem::new(
                PermissionSubject::Role(RoleName::viewer()),
                PermissionLevel::VIEW,
            ),
            FolderPermissionItem::new(
                PermissionSubject::Role(RoleName::editor()),
                PermissionLevel::EDIT,
            ),
        ]
    });

/// Request body replacing the whole permission set of a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPermissionList {
    /// Items in submission order.
    #[serde(default)]
    pub items: Vec<FolderPermissionItem>,
}

impl FolderPermissionList {
    /// Wraps an ordered item sequence.
    #[must_use]
    pub fn new(items: Vec<FolderPermissionItem>) -> Self {
        Self { items }
    }

    /// Returns a list holding the default role grants.
    #[must_use]
    pub fn default_roles() -> Self {
        Self::new(DEFAULT_ROLES_FOLDER_PERMISSIONS.to_vec())
    }
}

impl FromIterator<FolderPermissionItem> for FolderPermissionList {
    fn from_iter<T: IntoIterator<Item = FolderPermissionItem>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
