use std::str::FromStr;

use grafsdk_core::{AppError, AppResult};
use grafsdk_domain::{FolderPermissionItem, PermissionLevel, PermissionSubject};

const USAGE: &str = "usage: grafsdk-cli <command>
  list [limit]
  get <uid>
  create <title> [uid]
  rename <uid> <title>
  delete <uid>
  permissions <uid>
  reset-permissions <uid>
  grant <uid> <role|team|user> <subject> <view|edit|admin>
  revoke <uid> <role|team|user> <subject>";

/// One CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List { limit: Option<u32> },
    Get { uid: String },
    Create { title: String, uid: Option<String> },
    Rename { uid: String, title: String },
    Delete { uid: String },
    Permissions { uid: String },
    ResetPermissions { uid: String },
    Grant { uid: String, item: FolderPermissionItem },
    Revoke { uid: String, subject: PermissionSubject },
}

impl Command {
    /// Parses positional arguments, program name excluded.
    pub fn parse(args: &[String]) -> AppResult<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match args.as_slice() {
            ["list"] => Ok(Self::List { limit: None }),
            ["list", limit] => Ok(Self::List {
                limit: Some(limit.parse::<u32>().map_err(|error| {
                    AppError::Validation(format!("invalid limit '{limit}': {error}"))
                })?),
            }),
            ["get", uid] => Ok(Self::Get {
                uid: (*uid).to_owned(),
            }),
            ["create", title] => Ok(Self::Create {
                title: (*title).to_owned(),
                uid: None,
            }),
            ["create", title, uid] => Ok(Self::Create {
                title: (*title).to_owned(),
                uid: Some((*uid).to_owned()),
            }),
            ["rename", uid, title] => Ok(Self::Rename {
                uid: (*uid).to_owned(),
                title: (*title).to_owned(),
            }),
            ["delete", uid] => Ok(Self::Delete {
                uid: (*uid).to_owned(),
            }),
            ["permissions", uid] => Ok(Self::Permissions {
                uid: (*uid).to_owned(),
            }),
            ["reset-permissions", uid] => Ok(Self::ResetPermissions {
                uid: (*uid).to_owned(),
            }),
            ["grant", uid, kind, subject, level] => Ok(Self::Grant {
                uid: (*uid).to_owned(),
                item: FolderPermissionItem::new(
                    parse_subject(kind, subject)?,
                    PermissionLevel::from_str(level)?,
                ),
            }),
            ["revoke", uid, kind, subject] => Ok(Self::Revoke {
                uid: (*uid).to_owned(),
                subject: parse_subject(kind, subject)?,
            }),
            _ => Err(AppError::Validation(USAGE.to_owned())),
        }
    }

    /// Returns the command keyword for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Get { .. } => "get",
            Self::Create { .. } => "create",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Permissions { .. } => "permissions",
            Self::ResetPermissions { .. } => "reset-permissions",
            Self::Grant { .. } => "grant",
            Self::Revoke { .. } => "revoke",
        }
    }
}

fn parse_subject(kind: &str, value: &str) -> AppResult<PermissionSubject> {
    let parse_id = |value: &str| {
        value
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::Validation(format!("invalid {kind} id '{value}'")))
    };

    match kind {
        "role" => PermissionSubject::role(value),
        "team" => PermissionSubject::team(parse_id(value)?),
        "user" => PermissionSubject::user(parse_id(value)?),
        _ => Err(AppError::Validation(format!(
            "unknown permission subject '{kind}' '{value}', expected role, team or user"
        ))),
    }
}
