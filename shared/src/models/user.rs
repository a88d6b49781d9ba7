//! User Model
//!
//! `UserRecord` is a row of the `users` table as shown on the users screen.
//! `UserProfile` is the signed-in user's resolved identity used for
//! permission checks.

use super::entity_key::EntityKey;
use super::page::PageId;
use super::permission::{Permission, PermissionKind, all_pages_full, deserialize_lenient, find_permission};
use super::role::Role;
use super::serde_helpers::null_as_default;
use serde::{Deserialize, Serialize};

/// Application-level account status (not a table column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

/// `users` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: EntityKey,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub status: UserStatus,
}

impl UserRecord {
    pub fn from_create(id: EntityKey, data: &UserCreate) -> Self {
        Self {
            id,
            email: data.email.clone(),
            name: data.name.clone(),
            role: data.role,
            permissions: data.permissions.clone(),
            status: UserStatus::Active,
        }
    }

    pub fn apply(&mut self, update: &UserUpdate) {
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(permissions) = &update.permissions {
            self.permissions = permissions.clone();
        }
    }
}

/// Create user payload
///
/// `password` is only used by the admin API; it is never serialized into a
/// table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Update user payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
}

/// Signed-in user's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub permissions: Vec<Permission>,
}

impl UserProfile {
    /// Build from a `users` row. Empty name falls back to the email;
    /// an empty row email falls back to the auth identity's email.
    pub fn from_record(record: UserRecord, auth_email: &str) -> Self {
        let email = if record.email.trim().is_empty() {
            auth_email.to_string()
        } else {
            record.email
        };
        let name = if record.name.trim().is_empty() {
            email.clone()
        } else {
            record.name
        };
        Self {
            id: record.id.into(),
            email,
            name,
            role: record.role,
            permissions: record.permissions,
        }
    }

    /// Profile used when the `users` row cannot be resolved: admin with full
    /// access, named after the email's local part.
    pub fn fallback_admin(id: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        let name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            id: id.into(),
            email,
            name,
            role: Role::Admin,
            permissions: all_pages_full(),
        }
    }

    /// Profile with no grants (unresolved lookup with the admin fallback disabled)
    pub fn guest(id: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: id.into(),
            name: email.clone(),
            email,
            role: Role::Guest,
            permissions: Vec::new(),
        }
    }

    /// Admin holds everything; otherwise exact page lookup, absent = false
    pub fn allows(&self, page: PageId, kind: PermissionKind) -> bool {
        if self.role.is_admin() {
            return true;
        }
        find_permission(&self.permissions, page)
            .map(|p| p.allows(kind))
            .unwrap_or(false)
    }
}
