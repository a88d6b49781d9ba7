//! Per-table behaviour of cached records
//!
//! [`CachedEntity`] lets `DataStore` run one add/update/delete path for
//! every collection: which table it lives in, how payloads are validated,
//! and how rows returned by the backend are folded into the cache.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Category, CategoryCreate, CategoryUpdate, Product, ProductCode, ProductCodeCreate,
    ProductCodeUpdate, ProductCreate, ProductUpdate, Rack, RackCreate, RackRow, RackUpdate,
    UserCreate, UserRecord, UserUpdate,
};
use shared::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_email, validate_optional_text,
    validate_password, validate_required_text,
};
use shared::EntityKey;

use super::catalog::Catalog;

pub trait CachedEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Backend table
    const TABLE: &'static str;
    /// Human-readable name for logs and errors
    const NAME: &'static str;
    /// Cache-only fields stripped before a row is written
    const DERIVED_FIELDS: &'static [&'static str] = &[];

    type Create: Serialize + Send + Sync;
    type Update: Serialize + Send + Sync;

    fn key(&self) -> &EntityKey;
    fn set_key(&mut self, key: EntityKey);
    fn from_create(key: EntityKey, data: &Self::Create) -> Self;
    fn apply(&mut self, update: &Self::Update);

    fn validate_create(data: &Self::Create) -> Result<(), AppError>;
    fn validate_update(data: &Self::Update) -> Result<(), AppError>;

    fn collection(catalog: &Catalog) -> &Vec<Self>;
    fn collection_mut(catalog: &mut Catalog) -> &mut Vec<Self>;

    fn from_row(row: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(row)
    }

    /// Fold a row returned by a write into the cached record it replaces
    fn merge_returned(_local: Option<&Self>, returned: Self) -> Self {
        returned
    }

    fn insert_row(data: &Self::Create) -> Result<Value, serde_json::Error> {
        serde_json::to_value(data)
    }

    /// Row replayed for a pending record: no id, no derived fields
    fn replay_row(&self) -> Result<Value, serde_json::Error> {
        let mut row = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut row {
            map.remove("id");
            for field in Self::DERIVED_FIELDS {
                map.remove(*field);
            }
        }
        Ok(row)
    }
}

fn validate_optional_nested(
    value: &Option<Option<String>>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    match value {
        Some(inner) => validate_optional_text(inner, field, max_len),
        None => Ok(()),
    }
}

fn validate_update_text(value: &Option<String>, field: &str, max_len: usize) -> Result<(), AppError> {
    match value {
        Some(v) => validate_required_text(v, field, max_len),
        None => Ok(()),
    }
}

fn validate_weight(weight: f64) -> Result<(), AppError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(AppError::validation("weight must be a non-negative number").with_detail("field", "weight"));
    }
    Ok(())
}

fn validate_capacity(capacity: i32) -> Result<(), AppError> {
    if capacity < 1 {
        return Err(AppError::new(ErrorCode::RackCapacityInvalid).with_detail("field", "capacity"));
    }
    Ok(())
}

// ========== Product ==========

impl CachedEntity for Product {
    const TABLE: &'static str = "products";
    const NAME: &'static str = "product";

    type Create = ProductCreate;
    type Update = ProductUpdate;

    fn key(&self) -> &EntityKey {
        &self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = key;
    }

    fn from_create(key: EntityKey, data: &ProductCreate) -> Self {
        Product::from_create(key, data)
    }

    fn apply(&mut self, update: &ProductUpdate) {
        Product::apply(self, update);
    }

    fn validate_create(data: &ProductCreate) -> Result<(), AppError> {
        validate_required_text(&data.code, "code", MAX_SHORT_TEXT_LEN)?;
        validate_required_text(&data.inbound_at, "inbound_at", MAX_SHORT_TEXT_LEN)?;
        validate_optional_text(&data.outbound_at, "outbound_at", MAX_SHORT_TEXT_LEN)?;
        validate_weight(data.weight)?;
        if data.manufacturer.len() > MAX_NAME_LEN {
            return Err(AppError::validation("manufacturer is too long").with_detail("field", "manufacturer"));
        }
        Ok(())
    }

    fn validate_update(data: &ProductUpdate) -> Result<(), AppError> {
        validate_update_text(&data.code, "code", MAX_SHORT_TEXT_LEN)?;
        validate_update_text(&data.inbound_at, "inbound_at", MAX_SHORT_TEXT_LEN)?;
        validate_optional_nested(&data.outbound_at, "outbound_at", MAX_SHORT_TEXT_LEN)?;
        if let Some(weight) = data.weight {
            validate_weight(weight)?;
        }
        validate_optional_text(&data.manufacturer, "manufacturer", MAX_NAME_LEN)
    }

    fn collection(catalog: &Catalog) -> &Vec<Self> {
        &catalog.products
    }

    fn collection_mut(catalog: &mut Catalog) -> &mut Vec<Self> {
        &mut catalog.products
    }
}

// ========== Rack ==========

impl CachedEntity for Rack {
    const TABLE: &'static str = "racks";
    const NAME: &'static str = "rack";
    const DERIVED_FIELDS: &'static [&'static str] = &["products"];

    type Create = RackCreate;
    type Update = RackUpdate;

    fn key(&self) -> &EntityKey {
        &self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = key;
    }

    fn from_create(key: EntityKey, data: &RackCreate) -> Self {
        Rack::from_create(key, data)
    }

    fn apply(&mut self, update: &RackUpdate) {
        Rack::apply(self, update);
    }

    fn validate_create(data: &RackCreate) -> Result<(), AppError> {
        validate_required_text(&data.name, "name", MAX_SHORT_TEXT_LEN)?;
        validate_capacity(data.capacity)?;
        if data.line.len() > MAX_SHORT_TEXT_LEN {
            return Err(AppError::validation("line is too long").with_detail("field", "line"));
        }
        Ok(())
    }

    fn validate_update(data: &RackUpdate) -> Result<(), AppError> {
        validate_update_text(&data.name, "name", MAX_SHORT_TEXT_LEN)?;
        if let Some(capacity) = data.capacity {
            validate_capacity(capacity)?;
        }
        validate_optional_text(&data.line, "line", MAX_SHORT_TEXT_LEN)
    }

    fn collection(catalog: &Catalog) -> &Vec<Self> {
        &catalog.racks
    }

    fn collection_mut(catalog: &mut Catalog) -> &mut Vec<Self> {
        &mut catalog.racks
    }

    /// Written rows carry no join, products are filled in on the next refresh
    fn from_row(row: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<RackRow>(row).map(|r| Rack::from_row(r, &[]))
    }

    fn merge_returned(local: Option<&Self>, mut returned: Self) -> Self {
        if let Some(local) = local
            && returned.products.is_empty()
        {
            returned.products = local.products.clone();
        }
        returned
    }
}

// ========== Category ==========

impl CachedEntity for Category {
    const TABLE: &'static str = "categories";
    const NAME: &'static str = "category";

    type Create = CategoryCreate;
    type Update = CategoryUpdate;

    fn key(&self) -> &EntityKey {
        &self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = key;
    }

    fn from_create(key: EntityKey, data: &CategoryCreate) -> Self {
        Category::from_create(key, data)
    }

    fn apply(&mut self, update: &CategoryUpdate) {
        Category::apply(self, update);
    }

    fn validate_create(data: &CategoryCreate) -> Result<(), AppError> {
        validate_required_text(&data.name, "name", MAX_NAME_LEN)
    }

    fn validate_update(data: &CategoryUpdate) -> Result<(), AppError> {
        validate_update_text(&data.name, "name", MAX_NAME_LEN)
    }

    fn collection(catalog: &Catalog) -> &Vec<Self> {
        &catalog.categories
    }

    fn collection_mut(catalog: &mut Catalog) -> &mut Vec<Self> {
        &mut catalog.categories
    }
}

// ========== ProductCode ==========

impl CachedEntity for ProductCode {
    const TABLE: &'static str = "product_codes";
    const NAME: &'static str = "product code";

    type Create = ProductCodeCreate;
    type Update = ProductCodeUpdate;

    fn key(&self) -> &EntityKey {
        &self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = key;
    }

    fn from_create(key: EntityKey, data: &ProductCodeCreate) -> Self {
        ProductCode::from_create(key, data)
    }

    fn apply(&mut self, update: &ProductCodeUpdate) {
        ProductCode::apply(self, update);
    }

    fn validate_create(data: &ProductCodeCreate) -> Result<(), AppError> {
        validate_required_text(&data.code, "code", MAX_SHORT_TEXT_LEN)?;
        validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
        if data.description.len() > MAX_NOTE_LEN {
            return Err(AppError::validation("description is too long").with_detail("field", "description"));
        }
        Ok(())
    }

    fn validate_update(data: &ProductCodeUpdate) -> Result<(), AppError> {
        validate_update_text(&data.code, "code", MAX_SHORT_TEXT_LEN)?;
        validate_update_text(&data.name, "name", MAX_NAME_LEN)?;
        validate_optional_text(&data.description, "description", MAX_NOTE_LEN)
    }

    fn collection(catalog: &Catalog) -> &Vec<Self> {
        &catalog.product_codes
    }

    fn collection_mut(catalog: &mut Catalog) -> &mut Vec<Self> {
        &mut catalog.product_codes
    }
}

// ========== User ==========

impl CachedEntity for UserRecord {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "user";
    const DERIVED_FIELDS: &'static [&'static str] = &["status"];

    type Create = UserCreate;
    type Update = UserUpdate;

    fn key(&self) -> &EntityKey {
        &self.id
    }

    fn set_key(&mut self, key: EntityKey) {
        self.id = key;
    }

    fn from_create(key: EntityKey, data: &UserCreate) -> Self {
        UserRecord::from_create(key, data)
    }

    fn apply(&mut self, update: &UserUpdate) {
        UserRecord::apply(self, update);
    }

    fn validate_create(data: &UserCreate) -> Result<(), AppError> {
        validate_email(&data.email, "email")?;
        validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
        if let Some(password) = &data.password {
            validate_password(password, "password")?;
        }
        Ok(())
    }

    fn validate_update(data: &UserUpdate) -> Result<(), AppError> {
        if let Some(email) = &data.email {
            validate_email(email, "email")?;
        }
        validate_update_text(&data.name, "name", MAX_NAME_LEN)
    }

    fn collection(catalog: &Catalog) -> &Vec<Self> {
        &catalog.users
    }

    fn collection_mut(catalog: &mut Catalog) -> &mut Vec<Self> {
        &mut catalog.users
    }

    /// `status` is application-level
    fn merge_returned(local: Option<&Self>, mut returned: Self) -> Self {
        if let Some(local) = local {
            returned.status = local.status;
        }
        returned
    }
}
