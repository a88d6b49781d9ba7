//! Catalog - the cached collections, mirrored as one JSON document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::EntityKey;
use shared::models::{Category, Product, ProductCode, Rack, StockMovement, UserRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub racks: Vec<Rack>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub product_codes: Vec<ProductCode>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// Most recent stock movements, newest first. Read-only.
    #[serde(default)]
    pub movements: Vec<StockMovement>,
    /// Last fully successful refresh
    #[serde(default)]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl Catalog {
    /// Number of records keyed by a placeholder
    pub fn pending_count(&self) -> usize {
        fn count<'a>(keys: impl Iterator<Item = &'a EntityKey>) -> usize {
            keys.filter(|k| k.is_pending()).count()
        }
        count(self.products.iter().map(|r| &r.id))
            + count(self.racks.iter().map(|r| &r.id))
            + count(self.categories.iter().map(|r| &r.id))
            + count(self.product_codes.iter().map(|r| &r.id))
            + count(self.users.iter().map(|r| &r.id))
    }

    /// Append the placeholder records of `previous` that `self` lacks
    pub fn union_pending(&mut self, previous: &Catalog) {
        fn union<T: Clone>(into: &mut Vec<T>, from: &[T], key: impl Fn(&T) -> &EntityKey) {
            for record in from.iter().filter(|r| key(r).is_pending()) {
                if !into.iter().any(|r| key(r) == key(record)) {
                    into.push(record.clone());
                }
            }
        }
        union(&mut self.products, &previous.products, |r| &r.id);
        union(&mut self.racks, &previous.racks, |r| &r.id);
        union(&mut self.categories, &previous.categories, |r| &r.id);
        union(&mut self.product_codes, &previous.product_codes, |r| &r.id);
        union(&mut self.users, &previous.users, |r| &r.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::CategoryCreate;

    fn category(id: EntityKey, name: &str) -> Category {
        Category::from_create(id, &CategoryCreate { name: name.into() })
    }

    #[test]
    fn test_union_pending_keeps_placeholders_only() {
        let pending = category(EntityKey::placeholder(), "Frozen");
        let previous = Catalog {
            categories: vec![category(EntityKey::parse("c-old"), "Old"), pending.clone()],
            ..Default::default()
        };
        let mut fresh = Catalog {
            categories: vec![category(EntityKey::parse("c-1"), "Dairy")],
            ..Default::default()
        };

        fresh.union_pending(&previous);
        assert_eq!(fresh.categories.len(), 2);
        assert_eq!(fresh.categories[1], pending);
        assert_eq!(fresh.pending_count(), 1);

        // Idempotent
        fresh.union_pending(&previous);
        assert_eq!(fresh.categories.len(), 2);
    }

    #[test]
    fn test_decode_tolerates_missing_collections() {
        let catalog: Catalog = serde_json::from_str(r#"{"products": []}"#).unwrap();
        assert!(catalog.racks.is_empty());
        assert!(catalog.last_refreshed_at.is_none());
    }
}
