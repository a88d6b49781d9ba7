//! Role model and default permission templates

use super::page::PageId;
use super::permission::{Permission, find_permission};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User role
///
/// Parsed case-insensitively with surrounding whitespace ignored. A missing
/// or unrecognised role is `Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Role {
    /// Implicitly holds every permission
    Admin,
    Manager,
    Viewer,
    #[default]
    Guest,
}

impl Role {
    /// Roles with a predefined permission template
    pub const TEMPLATES: [Role; 3] = [Role::Admin, Role::Manager, Role::Viewer];

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "viewer" => Role::Viewer,
            _ => Role::Guest,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Viewer => "viewer",
            Role::Guest => "guest",
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Permission template for this role
    ///
    /// - admin: view + edit everywhere
    /// - manager: view everywhere, edit everywhere except `users`
    /// - viewer: view only
    /// - guest: nothing
    pub fn default_permissions(&self) -> Vec<Permission> {
        match self {
            Role::Admin => PageId::ALL.into_iter().map(Permission::full).collect(),
            Role::Manager => PageId::ALL
                .into_iter()
                .map(|page| Permission::new(page, true, page != PageId::Users))
                .collect(),
            Role::Viewer => PageId::ALL
                .into_iter()
                .map(|page| Permission::new(page, true, false))
                .collect(),
            Role::Guest => Vec::new(),
        }
    }

    /// Which template, if any, a permission set is equivalent to.
    /// Pages missing from `permissions` count as no access.
    pub fn template_for(permissions: &[Permission]) -> Option<Role> {
        Role::TEMPLATES.into_iter().find(|role| {
            let template = role.default_permissions();
            PageId::ALL.into_iter().all(|page| {
                let flags = |set: &[Permission]| {
                    find_permission(set, page)
                        .map(|p| (p.view, p.edit))
                        .unwrap_or((false, false))
                };
                flags(permissions) == flags(&template)
            })
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<String>> for Role {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Role::parse).unwrap_or_default()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}
