//! Shared types for the rack workspace
//!
//! Domain models, the page/permission model, the unified error system and
//! small utilities used by the backend client, the console core and the
//! admin service.

pub mod error;
pub mod models;
pub mod util;
pub mod validation;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, ErrorCategory, ErrorCode};
pub use models::{EntityKey, PageId, Permission, PermissionKind, Role, UserProfile};
