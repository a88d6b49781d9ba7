//! Product Model

use super::entity_key::EntityKey;
use super::serde_helpers::null_as_default;
use serde::{Deserialize, Serialize};

/// Placeholder shown when a rack slot references a product not in the catalog
pub const UNKNOWN_PRODUCT_TEXT: &str = "N/A";

/// `products` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityKey,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inbound_at: String,
    pub outbound_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weight: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manufacturer: String,
    /// Rack floor, when stored
    pub floor: Option<i32>,
}

impl Product {
    pub fn from_create(id: EntityKey, data: &ProductCreate) -> Self {
        Self {
            id,
            code: data.code.clone(),
            inbound_at: data.inbound_at.clone(),
            outbound_at: data.outbound_at.clone(),
            weight: data.weight,
            manufacturer: data.manufacturer.clone(),
            floor: data.floor,
        }
    }

    pub fn apply(&mut self, update: &ProductUpdate) {
        if let Some(code) = &update.code {
            self.code = code.clone();
        }
        if let Some(inbound_at) = &update.inbound_at {
            self.inbound_at = inbound_at.clone();
        }
        if let Some(outbound_at) = &update.outbound_at {
            self.outbound_at = outbound_at.clone();
        }
        if let Some(weight) = update.weight {
            self.weight = weight;
        }
        if let Some(manufacturer) = &update.manufacturer {
            self.manufacturer = manufacturer.clone();
        }
        if let Some(floor) = update.floor {
            self.floor = floor;
        }
    }
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub code: String,
    pub inbound_at: String,
    pub outbound_at: Option<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub manufacturer: String,
    pub floor: Option<i32>,
}

/// Update product payload
///
/// `outbound_at` and `floor` are doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_at: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<Option<i32>>,
}
