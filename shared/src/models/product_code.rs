//! Product Code Model

use super::entity_key::EntityKey;
use super::serde_helpers::null_as_default;
use serde::{Deserialize, Deserializer, Serialize};

/// Storage temperature assumed when the column is null (°C)
pub const DEFAULT_STORAGE_TEMP: f64 = -18.0;

fn default_storage_temp() -> f64 {
    DEFAULT_STORAGE_TEMP
}

fn storage_temp_or_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(|v| v.unwrap_or(DEFAULT_STORAGE_TEMP))
}

/// `product_codes` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCode {
    pub id: EntityKey,
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub category_id: Option<String>,
    #[serde(
        default = "default_storage_temp",
        deserialize_with = "storage_temp_or_default"
    )]
    pub storage_temp: f64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ProductCode {
    pub fn from_create(id: EntityKey, data: &ProductCodeCreate) -> Self {
        let now = crate::util::now_rfc3339();
        Self {
            id,
            code: data.code.clone(),
            name: data.name.clone(),
            description: data.description.clone(),
            category_id: data.category_id.clone(),
            storage_temp: data.storage_temp.unwrap_or(DEFAULT_STORAGE_TEMP),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }

    pub fn apply(&mut self, update: &ProductCodeUpdate) {
        if let Some(code) = &update.code {
            self.code = code.clone();
        }
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(category_id) = &update.category_id {
            self.category_id = category_id.clone();
        }
        if let Some(storage_temp) = update.storage_temp {
            self.storage_temp = storage_temp;
        }
        self.updated_at = Some(crate::util::now_rfc3339());
    }
}

/// Create product code payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCodeCreate {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<String>,
    pub storage_temp: Option<f64>,
}

/// Update product code payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_temp: Option<f64>,
}
