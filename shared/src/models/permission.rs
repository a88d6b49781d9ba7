//! Page permissions
//!
//! A permission entry grants `view` and/or `edit` on one page. Editing
//! helpers keep `edit ⇒ view`; stored data is taken as-is.

use super::page::PageId;
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of access being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    View,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub page: PageId,
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub edit: bool,
}

impl Permission {
    pub const fn new(page: PageId, view: bool, edit: bool) -> Self {
        Self { page, view, edit }
    }

    /// View and edit
    pub const fn full(page: PageId) -> Self {
        Self::new(page, true, true)
    }

    pub const fn allows(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::View => self.view,
            PermissionKind::Edit => self.edit,
        }
    }

    /// Set one flag. Clearing view clears edit; setting edit sets view.
    pub fn set(&mut self, kind: PermissionKind, value: bool) {
        match (kind, value) {
            (PermissionKind::View, false) => {
                self.view = false;
                self.edit = false;
            }
            (PermissionKind::View, true) => self.view = true,
            (PermissionKind::Edit, true) => {
                self.edit = true;
                self.view = true;
            }
            (PermissionKind::Edit, false) => self.edit = false,
        }
    }
}

/// Exact-page lookup
pub fn find_permission(permissions: &[Permission], page: PageId) -> Option<&Permission> {
    permissions.iter().find(|p| p.page == page)
}

/// Set a flag on `page`, inserting an entry when the page has none
pub fn set_permission(
    permissions: &mut Vec<Permission>,
    page: PageId,
    kind: PermissionKind,
    value: bool,
) {
    match permissions.iter_mut().find(|p| p.page == page) {
        Some(entry) => entry.set(kind, value),
        None => {
            let mut entry = Permission::new(page, false, false);
            entry.set(kind, value);
            permissions.push(entry);
        }
    }
}

/// Full access on every known page
pub fn all_pages_full() -> Vec<Permission> {
    PageId::ALL.into_iter().map(Permission::full).collect()
}

/// Deserialize a stored permission list, skipping entries whose page is not
/// one of [`PageId::ALL`] and treating null as empty.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<Permission>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Permission>(value) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unrecognised permission entry");
                None
            }
        })
        .collect())
}
