//! Dashboard pages and navigation entries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pages a permission can be granted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageId {
    Dashboard,
    Racks,
    Products,
    History,
    Users,
    Settings,
}

impl PageId {
    /// All known pages, in navigation order
    pub const ALL: [PageId; 6] = [
        PageId::Dashboard,
        PageId::Racks,
        PageId::Products,
        PageId::History,
        PageId::Users,
        PageId::Settings,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PageId::Dashboard => "dashboard",
            PageId::Racks => "racks",
            PageId::Products => "products",
            PageId::History => "history",
            PageId::Users => "users",
            PageId::Settings => "settings",
        }
    }

    pub const fn href(&self) -> &'static str {
        match self {
            PageId::Dashboard => "/dashboard",
            PageId::Racks => "/dashboard/racks",
            PageId::Products => "/dashboard/products",
            PageId::History => "/dashboard/history",
            PageId::Users => "/dashboard/users",
            PageId::Settings => "/dashboard/settings",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            PageId::Dashboard => "Dashboard",
            PageId::Racks => "Racks",
            PageId::Products => "Products",
            PageId::History => "History",
            PageId::Users => "Users",
            PageId::Settings => "Settings",
        }
    }

    pub const fn nav_item(&self) -> NavItem {
        NavItem {
            page: *self,
            href: self.href(),
            label: self.label(),
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPage(pub String);

impl fmt::Display for UnknownPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown page: {}", self.0)
    }
}

impl std::error::Error for UnknownPage {}

impl FromStr for PageId {
    type Err = UnknownPage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageId::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| UnknownPage(s.to_string()))
    }
}

/// Sidebar entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub page: PageId,
    pub href: &'static str,
    pub label: &'static str,
}

/// Path that unauthenticated users are sent to
pub const LOGIN_PATH: &str = "/login";
