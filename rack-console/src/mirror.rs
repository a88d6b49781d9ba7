//! LocalMirror - durable JSON copy of the cache and the signed-in profile
//!
//! One file per key under the data directory:
//!
//! ```text
//! {data_dir}/
//!   ├── user.json        # resolved UserProfile
//!   ├── user_role.json   # role of that profile
//!   ├── catalog.json     # last known good Catalog (+ pending records)
//!   └── session.json     # SessionMarker { user_id, expires_at }
//! ```
//!
//! Writes go to a temp file first and are renamed into place.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lifetime of the "someone is logged in" marker
pub const SESSION_MARKER_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKey {
    User,
    UserRole,
    Catalog,
    Session,
}

impl MirrorKey {
    pub const fn file_name(&self) -> &'static str {
        match self {
            MirrorKey::User => "user.json",
            MirrorKey::UserRole => "user_role.json",
            MirrorKey::Catalog => "catalog.json",
            MirrorKey::Session => "session.json",
        }
    }
}

/// Signals to a hosting layer that a user is logged in. Not a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionMarker {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            expires_at: Utc::now() + Duration::seconds(SESSION_MARKER_TTL.as_secs() as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct LocalMirror {
    dir: PathBuf,
}

impl LocalMirror {
    /// Open (and create) the mirror directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: MirrorKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read a key; `Ok(None)` when it was never written
    pub fn load<T: DeserializeOwned>(&self, key: MirrorKey) -> Result<Option<T>, MirrorError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save<T: Serialize>(&self, key: MirrorKey, value: &T) -> Result<(), MirrorError> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove a key; missing keys are fine
    pub fn remove(&self, key: MirrorKey) -> Result<(), MirrorError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_session_marker(&self, user_id: &str) -> Result<(), MirrorError> {
        self.save(MirrorKey::Session, &SessionMarker::new(user_id))
    }

    /// Current marker; expired markers read as absent
    pub fn session_marker(&self) -> Result<Option<SessionMarker>, MirrorError> {
        let marker: Option<SessionMarker> = self.load(MirrorKey::Session)?;
        Ok(marker.filter(|m| !m.is_expired()))
    }

    /// Drop the profile keys and the session marker (logout)
    pub fn clear_identity(&self) -> Result<(), MirrorError> {
        self.remove(MirrorKey::User)?;
        self.remove(MirrorKey::UserRole)?;
        self.remove(MirrorKey::Session)?;
        Ok(())
    }
}
