//! Category Model

use super::entity_key::EntityKey;
use serde::{Deserialize, Serialize};

/// `categories` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityKey,
    pub name: String,
    pub created_at: Option<String>,
}

impl Category {
    pub fn from_create(id: EntityKey, data: &CategoryCreate) -> Self {
        Self {
            id,
            name: data.name.clone(),
            created_at: Some(crate::util::now_rfc3339()),
        }
    }

    pub fn apply(&mut self, update: &CategoryUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
    }
}

/// Create category payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
}

/// Update category payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
