//! Rack Model
//!
//! `racks` rows carry no product list. The `products` of a [`Rack`] are
//! assembled from the embedded `rack_products` join plus the product
//! catalog and are never written back.

use super::entity_key::EntityKey;
use super::product::{Product, UNKNOWN_PRODUCT_TEXT};
use super::serde_helpers::null_as_default;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RACK_CAPACITY: i32 = 4;

fn default_capacity() -> i32 {
    DEFAULT_RACK_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub id: EntityKey,
    pub name: String,
    /// Derived from `rack_products`
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub line: String,
}

/// `rack_products` join row embedded in a rack select
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackProductRow {
    pub product_id: String,
    pub floor: Option<i32>,
    pub inbound_date: Option<String>,
    pub outbound_date: Option<String>,
}

/// `racks` row as returned by `select=*,rack_products(...)`
#[derive(Debug, Clone, Deserialize)]
pub struct RackRow {
    pub id: EntityKey,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub capacity: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub line: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rack_products: Vec<RackProductRow>,
}

/// Columns for the rack select, embedding the join
pub const RACK_SELECT: &str = "*,rack_products(product_id,floor,inbound_date,outbound_date)";

impl Rack {
    /// Assemble from a row and the product catalog fetched in the same batch.
    /// Missing or non-positive capacity becomes [`DEFAULT_RACK_CAPACITY`].
    pub fn from_row(row: RackRow, catalog: &[Product]) -> Self {
        let products = row
            .rack_products
            .into_iter()
            .map(|slot| {
                let detail = catalog.iter().find(|p| p.id.as_str() == slot.product_id);
                Product {
                    id: EntityKey::parse(slot.product_id),
                    code: detail
                        .map(|p| p.code.clone())
                        .unwrap_or_else(|| UNKNOWN_PRODUCT_TEXT.to_string()),
                    inbound_at: slot.inbound_date.unwrap_or_default(),
                    outbound_at: slot.outbound_date,
                    weight: detail.map(|p| p.weight).unwrap_or(0.0),
                    manufacturer: detail
                        .map(|p| p.manufacturer.clone())
                        .unwrap_or_else(|| UNKNOWN_PRODUCT_TEXT.to_string()),
                    floor: slot.floor,
                }
            })
            .collect();

        Self {
            id: row.id,
            name: row.name,
            products,
            capacity: row
                .capacity
                .filter(|c| *c > 0)
                .unwrap_or(DEFAULT_RACK_CAPACITY),
            line: row.line,
        }
    }

    pub fn from_create(id: EntityKey, data: &RackCreate) -> Self {
        Self {
            id,
            name: data.name.clone(),
            products: Vec::new(),
            capacity: data.capacity,
            line: data.line.clone(),
        }
    }

    pub fn apply(&mut self, update: &RackUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(capacity) = update.capacity {
            self.capacity = capacity;
        }
        if let Some(line) = &update.line {
            self.line = line.clone();
        }
    }
}

/// Create rack payload (no products; those live in `rack_products`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackCreate {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
    #[serde(default)]
    pub line: String,
}

/// Update rack payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RackUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Product> {
        vec![Product {
            id: EntityKey::parse("p-1"),
            code: "FZ-01".into(),
            inbound_at: "2024-03-01".into(),
            outbound_at: None,
            weight: 20.0,
            manufacturer: "Ocean".into(),
            floor: None,
        }]
    }

    #[test]
    fn test_from_row_joins_catalog() {
        let row: RackRow = serde_json::from_str(
            r#"{"id": "r-1", "name": "A-1", "capacity": null, "line": "A",
                "rack_products": [
                    {"product_id": "p-1", "floor": 2, "inbound_date": "2024-03-02", "outbound_date": null},
                    {"product_id": "p-x", "floor": 1, "inbound_date": null, "outbound_date": null}
                ]}"#,
        )
        .unwrap();
        let rack = Rack::from_row(row, &catalog());

        assert_eq!(rack.capacity, DEFAULT_RACK_CAPACITY);
        assert_eq!(rack.products.len(), 2);
        assert_eq!(rack.products[0].code, "FZ-01");
        assert_eq!(rack.products[0].weight, 20.0);
        assert_eq!(rack.products[0].floor, Some(2));
        assert_eq!(rack.products[0].inbound_at, "2024-03-02");
        assert_eq!(rack.products[1].code, UNKNOWN_PRODUCT_TEXT);
        assert_eq!(rack.products[1].manufacturer, UNKNOWN_PRODUCT_TEXT);
        assert_eq!(rack.products[1].weight, 0.0);
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let row: RackRow =
            serde_json::from_str(r#"{"id": "r-2", "name": "B-1", "capacity": 0}"#).unwrap();
        assert_eq!(Rack::from_row(row, &[]).capacity, DEFAULT_RACK_CAPACITY);
    }

    #[test]
    fn test_create_payload_has_no_products() {
        let json = serde_json::to_value(RackCreate {
            name: "C-1".into(),
            capacity: 6,
            line: "C".into(),
        })
        .unwrap();
        assert!(json.get("products").is_none());
    }
}
