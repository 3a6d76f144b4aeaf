//! Back-office manager accounts, permissions and sessions.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Manager roles, informational ordering only; effective rights come from the
/// permission matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerRole {
    Manager,
    Moderator,
    Supervisor,
}

impl std::fmt::Display for ManagerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerRole::Manager => write!(f, "manager"),
            ManagerRole::Moderator => write!(f, "moderator"),
            ManagerRole::Supervisor => write!(f, "supervisor"),
        }
    }
}

impl std::str::FromStr for ManagerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manager" => Ok(ManagerRole::Manager),
            "moderator" => Ok(ManagerRole::Moderator),
            "supervisor" => Ok(ManagerRole::Supervisor),
            _ => Err(format!("Unknown manager role: {}", s)),
        }
    }
}

impl From<String> for ManagerRole {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ManagerRole::Manager)
    }
}

/// Per-module permission flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePermissions {
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub delete: bool,
}

impl ModulePermissions {
    pub fn all() -> Self {
        Self {
            view: true,
            edit: true,
            delete: true,
        }
    }

    fn action(&self, action: &str) -> bool {
        match action {
            "view" => self.view,
            "edit" => self.edit,
            "delete" => self.delete,
            _ => false,
        }
    }
}

/// Permission matrix: module name -> flags. Absent modules grant nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub HashMap<String, ModulePermissions>);

impl Permissions {
    /// True iff the matrix grants the action on the module
    pub fn allows(&self, module: &str, action: &str) -> bool {
        self.0
            .get(module)
            .map(|m| m.action(action))
            .unwrap_or(false)
    }

    pub fn module(&self, module: &str) -> ModulePermissions {
        self.0.get(module).copied().unwrap_or_default()
    }
}

/// Split a required permission string of the form "module.action"
pub fn split_permission_key(key: &str) -> Option<(&str, &str)> {
    let (module, action) = key.split_once('.')?;
    if module.is_empty() || action.is_empty() {
        return None;
    }
    Some((module, action))
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Manager {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    /// JSON permission matrix stored as TEXT
    pub permissions: String,
    pub is_active: bool,
    pub created_at: String,
}

impl Manager {
    pub fn role_enum(&self) -> ManagerRole {
        ManagerRole::from(self.role.clone())
    }

    /// Parsed permission matrix; malformed JSON grants nothing
    pub fn permission_matrix(&self) -> Permissions {
        serde_json::from_str(&self.permissions).unwrap_or_default()
    }
}

/// Manager DTO without the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub permissions: Permissions,
    pub is_active: bool,
    pub created_at: String,
}

impl From<Manager> for ManagerResponse {
    fn from(manager: Manager) -> Self {
        let permissions = manager.permission_matrix();
        Self {
            id: manager.id,
            name: manager.name,
            email: manager.email,
            role: manager.role,
            permissions,
            is_active: manager.is_active,
            created_at: manager.created_at,
        }
    }
}

/// Request to create a manager account
#[derive(Debug, Deserialize)]
pub struct CreateManagerRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub permissions: Permissions,
}

fn default_role() -> String {
    "manager".to_string()
}

/// Request to update a manager account (only provided fields change)
#[derive(Debug, Deserialize)]
pub struct UpdateManagerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Re-hashed on update
    pub password: Option<String>,
    pub role: Option<String>,
    pub permissions: Option<Permissions>,
    pub is_active: Option<bool>,
}

/// Session actor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionActor {
    Admin,
    Manager,
}

impl std::fmt::Display for SessionActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionActor::Admin => write!(f, "admin"),
            SessionActor::Manager => write!(f, "manager"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub actor: String,
    pub manager_id: Option<String>,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        if let Ok(expires) = chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            expires < chrono::Utc::now()
        } else {
            true // Treat parse errors as expired
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ManagerLoginRequest {
    pub email: String,
    pub password: String,
}
