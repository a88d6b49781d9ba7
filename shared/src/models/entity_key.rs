//! Record identity: backend row id or local placeholder

use crate::util::{now_millis, random_suffix};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a record created locally and not yet confirmed by the backend
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Identity of a cached record.
///
/// Serialized as the bare id string. Strings carrying
/// [`PLACEHOLDER_PREFIX`] decode to `Pending`, everything else to `Persisted`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawKey", into = "String")]
pub enum EntityKey {
    /// Row id issued by the backend
    Persisted(String),
    /// Client-generated placeholder (`temp-{millis}-{suffix}`)
    Pending(String),
}

impl EntityKey {
    /// Fresh placeholder key
    pub fn placeholder() -> Self {
        EntityKey::Pending(format!(
            "{PLACEHOLDER_PREFIX}{}-{}",
            now_millis(),
            random_suffix(9)
        ))
    }

    pub fn parse(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.starts_with(PLACEHOLDER_PREFIX) {
            EntityKey::Pending(id)
        } else {
            EntityKey::Persisted(id)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityKey::Persisted(id) | EntityKey::Pending(id) => id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EntityKey::Pending(_))
    }

    /// Backend id, if this key refers to a persisted row
    pub fn persisted_id(&self) -> Option<&str> {
        match self {
            EntityKey::Persisted(id) => Some(id),
            EntityKey::Pending(_) => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EntityKey {
    fn from(id: &str) -> Self {
        EntityKey::parse(id)
    }
}

impl From<String> for EntityKey {
    fn from(id: String) -> Self {
        EntityKey::parse(id)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        match key {
            EntityKey::Persisted(id) | EntityKey::Pending(id) => id,
        }
    }
}

/// Wire form: some tables use integer ids
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Number(i64),
}

impl From<RawKey> for EntityKey {
    fn from(raw: RawKey) -> Self {
        match raw {
            RawKey::Text(id) => EntityKey::parse(id),
            RawKey::Number(id) => EntityKey::Persisted(id.to_string()),
        }
    }
}
