//! DataStore - eventually-fresh cache of the backend collections
//!
//! ```text
//!   add/update/delete ──▶ TableBackend ──ok──▶ merge returned row ─┐
//!                              │                                   ├─▶ Catalog + mirror
//!                              └──err──▶ apply locally (temp- id) ─┘
//!
//!   refresh() ── 6 selects in parallel ── all ok? ──▶ swap Catalog (+ pending)
//!                                         any err ──▶ keep previous
//! ```
//!
//! The catalog lock is never held across an await. Every change to the
//! in-memory catalog is written to the mirror under the same lock.

mod catalog;
mod entity;
mod worker;

pub use catalog::Catalog;
pub use entity::CachedEntity;
pub use worker::{REFRESH_DEBOUNCE, RefreshWorker, STALE_AFTER, STALE_CHECK_INTERVAL};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rack_client::{BackendError, BackendResult, Filter, Order, Query, TableBackend};
use serde_json::Value;
use shared::EntityKey;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    ACTIVITY_LOG_LIMIT, ActivityLogRow, Category, CategoryCreate, CategoryUpdate, Product,
    ProductCode, ProductCodeCreate, ProductCodeUpdate, ProductCreate, ProductUpdate, RACK_SELECT,
    Rack, RackCreate, RackRow, RackUpdate, StockMovement, UserCreate, UserRecord, UserUpdate,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::mirror::{LocalMirror, MirrorError, MirrorKey};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] AppError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Store is shut down")]
    Closed,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => e,
            StoreError::NotFound { entity, id } => {
                let mut err = AppError::not_found(entity).with_detail("id", id);
                err.code = not_found_code(entity);
                err
            }
            StoreError::Mirror(e) => AppError::storage(e.to_string()),
            StoreError::Backend(e) => e.into(),
            StoreError::Encode(e) => AppError::with_message(ErrorCode::InvalidFormat, e.to_string()),
            StoreError::Closed => AppError::new(ErrorCode::StoreClosed),
        }
    }
}

fn not_found_code(entity: &str) -> ErrorCode {
    match entity {
        "product" => ErrorCode::ProductNotFound,
        "rack" => ErrorCode::RackNotFound,
        "category" => ErrorCode::CategoryNotFound,
        "product code" => ErrorCode::ProductCodeNotFound,
        "user" => ErrorCode::UserNotFound,
        _ => ErrorCode::NotFound,
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Where a write landed
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// Confirmed by the backend
    Persisted(T),
    /// Backend unavailable or rejected; applied to the local cache only
    LocalOnly(T),
}

impl<T> WriteOutcome<T> {
    pub fn is_persisted(&self) -> bool {
        matches!(self, WriteOutcome::Persisted(_))
    }

    pub fn value(&self) -> &T {
        match self {
            WriteOutcome::Persisted(v) | WriteOutcome::LocalOnly(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            WriteOutcome::Persisted(v) | WriteOutcome::LocalOnly(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer refresh already landed
    Superseded,
}

/// Result of replaying placeholder records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub confirmed: usize,
    pub remaining: usize,
}

pub struct DataStore {
    backend: Arc<dyn TableBackend>,
    mirror: Arc<LocalMirror>,
    catalog: RwLock<Catalog>,
    /// Bumped on every catalog change
    revision_tx: watch::Sender<u64>,
    refresh_issued: AtomicU64,
    refresh_applied: AtomicU64,
    last_refresh: Mutex<Option<Instant>>,
    flushing: AtomicBool,
    shutdown: CancellationToken,
}

impl DataStore {
    /// Open the store with the last mirrored catalog. Never touches the network.
    pub fn open(
        backend: Arc<dyn TableBackend>,
        mirror: Arc<LocalMirror>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let catalog = match mirror.load::<Catalog>(MirrorKey::Catalog) {
            Ok(Some(catalog)) => {
                tracing::info!(
                    products = catalog.products.len(),
                    racks = catalog.racks.len(),
                    pending = catalog.pending_count(),
                    "Loaded mirrored catalog"
                );
                catalog
            }
            Ok(None) => Catalog::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Mirrored catalog unreadable, starting empty");
                Catalog::default()
            }
        };
        let (revision_tx, _) = watch::channel(0);

        Arc::new(Self {
            backend,
            mirror,
            catalog: RwLock::new(catalog),
            revision_tx,
            refresh_issued: AtomicU64::new(0),
            refresh_applied: AtomicU64::new(0),
            last_refresh: Mutex::new(None),
            flushing: AtomicBool::new(false),
            shutdown,
        })
    }

    pub(crate) fn backend(&self) -> &Arc<dyn TableBackend> {
        &self.backend
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Stop the refresh worker; in-flight calls finish but change nothing
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn is_alive(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    // ========== Reads ==========

    pub fn snapshot(&self) -> Catalog {
        self.catalog.read().clone()
    }

    /// Revision counter, bumped on every catalog change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn products(&self) -> Vec<Product> {
        self.catalog.read().products.clone()
    }

    pub fn racks(&self) -> Vec<Rack> {
        self.catalog.read().racks.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.catalog.read().categories.clone()
    }

    pub fn product_codes(&self) -> Vec<ProductCode> {
        self.catalog.read().product_codes.clone()
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.catalog.read().users.clone()
    }

    pub fn movements(&self) -> Vec<StockMovement> {
        self.catalog.read().movements.clone()
    }

    pub fn find<T: CachedEntity>(&self, id: &EntityKey) -> Option<T> {
        T::collection(&self.catalog.read())
            .iter()
            .find(|r| r.key() == id)
            .cloned()
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.catalog.read().last_refreshed_at
    }

    pub fn pending_count(&self) -> usize {
        self.catalog.read().pending_count()
    }

    /// No successful refresh yet, or the last one is older than `STALE_AFTER`
    pub fn is_stale(&self) -> bool {
        match *self.last_refresh.lock() {
            Some(at) => at.elapsed() > STALE_AFTER,
            None => true,
        }
    }

    /// Write the current catalog to the mirror
    pub fn save_snapshot(&self) -> StoreResult<()> {
        let catalog = self.catalog.read();
        self.mirror.save(MirrorKey::Catalog, &*catalog)?;
        Ok(())
    }

    // ========== Refresh ==========

    /// Fetch every collection; swap the catalog only if all fetches succeed
    pub async fn refresh(&self) -> StoreResult<RefreshOutcome> {
        let seq = self.refresh_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = &self.backend;

        let products_q = Query::table(Product::TABLE);
        let racks_q = Query::table(Rack::TABLE).select(RACK_SELECT);
        let categories_q = Query::table(Category::TABLE).order(Order::asc("name"));
        let users_q = Query::table(UserRecord::TABLE).order(Order::asc("name"));
        let codes_q = Query::table(ProductCode::TABLE).order(Order::asc("code"));
        let logs_q = Query::table("activity_logs")
            .order(Order::desc("created_at"))
            .limit(ACTIVITY_LOG_LIMIT);

        let (products, racks, categories, users, codes, logs) = tokio::join!(
            backend.select(&products_q),
            backend.select(&racks_q),
            backend.select(&categories_q),
            backend.select(&users_q),
            backend.select(&codes_q),
            backend.select(&logs_q),
        );

        if !self.is_alive() {
            return Ok(RefreshOutcome::Superseded);
        }

        let mut fresh = match assemble(products, racks, categories, users, codes, logs) {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!(seq, kind = %e.kind, "Refresh failed, keeping previous data: {}", e.message);
                return Err(e.into());
            }
        };

        {
            let mut catalog = self.catalog.write();
            if seq < self.refresh_applied.load(Ordering::SeqCst) {
                tracing::debug!(seq, "Dropping superseded refresh");
                return Ok(RefreshOutcome::Superseded);
            }
            self.refresh_applied.store(seq, Ordering::SeqCst);

            fresh.union_pending(&catalog);
            fresh.last_refreshed_at = Some(Utc::now());
            *catalog = fresh;
            *self.last_refresh.lock() = Some(Instant::now());
            self.persist(&catalog);
        }

        tracing::debug!(seq, "Refresh applied");
        Ok(RefreshOutcome::Applied)
    }

    // ========== Generic writes ==========

    /// Validate, write to the backend, fall back to a placeholder record
    pub async fn add<T: CachedEntity>(&self, data: T::Create) -> StoreResult<WriteOutcome<T>> {
        self.ensure_alive()?;
        T::validate_create(&data)?;
        let row = T::insert_row(&data)?;

        match self.backend.insert(T::TABLE, row).await {
            Ok(rows) => {
                let record = T::merge_returned(None, first_returned::<T>(rows)?);
                self.mutate(|c| upsert(T::collection_mut(c), record.clone()));
                tracing::debug!(entity = T::NAME, id = %record.key(), "Created");
                Ok(WriteOutcome::Persisted(record))
            }
            Err(e) => {
                let record = T::from_create(EntityKey::placeholder(), &data);
                tracing::warn!(
                    entity = T::NAME,
                    id = %record.key(),
                    kind = %e.kind,
                    "Create failed, keeping local record: {}",
                    e.message
                );
                if !self.mutate(|c| T::collection_mut(c).push(record.clone())) {
                    return Err(StoreError::Closed);
                }
                Ok(WriteOutcome::LocalOnly(record))
            }
        }
    }

    pub async fn update<T: CachedEntity>(
        &self,
        id: &EntityKey,
        data: T::Update,
    ) -> StoreResult<WriteOutcome<T>> {
        self.ensure_alive()?;
        T::validate_update(&data)?;

        let Some(backend_id) = id.persisted_id() else {
            // Pending records only exist here until flushed
            let record = self.apply_local::<T>(id, &data)?;
            return Ok(WriteOutcome::LocalOnly(record));
        };

        let patch = serde_json::to_value(&data)?;
        match self
            .backend
            .update(T::TABLE, &Filter::eq("id", backend_id), patch)
            .await
        {
            Ok(rows) => match first_returned::<T>(rows) {
                Ok(returned) => {
                    let local = self.find::<T>(id);
                    let record = T::merge_returned(local.as_ref(), returned);
                    self.mutate(|c| upsert(T::collection_mut(c), record.clone()));
                    Ok(WriteOutcome::Persisted(record))
                }
                Err(_) => {
                    // No representation returned; the write itself succeeded
                    let record = self.apply_local::<T>(id, &data)?;
                    Ok(WriteOutcome::Persisted(record))
                }
            },
            Err(e) => {
                tracing::warn!(
                    entity = T::NAME,
                    %id,
                    kind = %e.kind,
                    "Update failed, applying locally: {}",
                    e.message
                );
                let record = self.apply_local::<T>(id, &data)?;
                Ok(WriteOutcome::LocalOnly(record))
            }
        }
    }

    pub async fn delete<T: CachedEntity>(&self, id: &EntityKey) -> StoreResult<WriteOutcome<()>> {
        self.ensure_alive()?;
        let Some(backend_id) = id.persisted_id() else {
            if !self.remove_local::<T>(id)? {
                return Err(StoreError::NotFound {
                    entity: T::NAME,
                    id: id.to_string(),
                });
            }
            return Ok(WriteOutcome::LocalOnly(()));
        };

        match self
            .backend
            .delete(T::TABLE, &Filter::eq("id", backend_id))
            .await
        {
            Ok(()) => {
                // A shutdown here only skips the cache update
                let _ = self.remove_local::<T>(id);
                Ok(WriteOutcome::Persisted(()))
            }
            Err(e) => {
                tracing::warn!(
                    entity = T::NAME,
                    %id,
                    kind = %e.kind,
                    "Delete failed, removing locally: {}",
                    e.message
                );
                self.remove_local::<T>(id)?;
                Ok(WriteOutcome::LocalOnly(()))
            }
        }
    }

    // ========== Pending replay ==========

    /// Replay placeholder records; each confirmed row replaces its placeholder
    pub async fn flush_pending(&self) -> FlushReport {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return FlushReport {
                confirmed: 0,
                remaining: self.pending_count(),
            };
        }

        let confirmed = self.flush_collection::<Product>().await
            + self.flush_collection::<Rack>().await
            + self.flush_collection::<Category>().await
            + self.flush_collection::<ProductCode>().await
            + self.flush_collection::<UserRecord>().await;

        self.flushing.store(false, Ordering::SeqCst);
        let report = FlushReport {
            confirmed,
            remaining: self.pending_count(),
        };
        if report.confirmed > 0 || report.remaining > 0 {
            tracing::info!(
                confirmed = report.confirmed,
                remaining = report.remaining,
                "Flushed pending records"
            );
        }
        report
    }

    async fn flush_collection<T: CachedEntity>(&self) -> usize {
        let pending: Vec<T> = T::collection(&self.catalog.read())
            .iter()
            .filter(|r| r.key().is_pending())
            .cloned()
            .collect();

        let mut confirmed = 0;
        for local in pending {
            if !self.is_alive() {
                break;
            }
            let row = match local.replay_row() {
                Ok(row) => row,
                Err(e) => {
                    tracing::error!(entity = T::NAME, id = %local.key(), error = %e, "Cannot encode pending record");
                    continue;
                }
            };
            let returned = match self.backend.insert(T::TABLE, row).await {
                Ok(rows) => first_returned::<T>(rows),
                Err(e) => Err(e),
            };
            match returned {
                Ok(returned) => {
                    let record = T::merge_returned(Some(&local), returned);
                    let placeholder = local.key().clone();
                    self.mutate(|c| {
                        let records = T::collection_mut(c);
                        records.retain(|r| r.key() != record.key());
                        match records.iter_mut().find(|r| *r.key() == placeholder) {
                            Some(slot) => *slot = record.clone(),
                            None => records.push(record.clone()),
                        }
                    });
                    confirmed += 1;
                }
                Err(e) => {
                    tracing::warn!(entity = T::NAME, kind = %e.kind, "Pending replay stopped: {}", e.message);
                    break;
                }
            }
        }
        confirmed
    }

    // ========== Local mutation ==========

    /// Apply and mirror a cache change. `false` once shut down.
    fn mutate(&self, f: impl FnOnce(&mut Catalog)) -> bool {
        if !self.is_alive() {
            return false;
        }
        let mut catalog = self.catalog.write();
        f(&mut catalog);
        self.persist(&catalog);
        true
    }

    fn ensure_alive(&self) -> StoreResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    fn persist(&self, catalog: &Catalog) {
        if let Err(e) = self.mirror.save(MirrorKey::Catalog, catalog) {
            tracing::warn!(error = %e, "Failed to mirror catalog");
        }
        self.revision_tx.send_modify(|rev| *rev += 1);
    }

    fn apply_local<T: CachedEntity>(&self, id: &EntityKey, data: &T::Update) -> StoreResult<T> {
        let mut updated = None;
        let applied = self.mutate(|c| {
            if let Some(record) = T::collection_mut(c).iter_mut().find(|r| r.key() == id) {
                record.apply(data);
                updated = Some(record.clone());
            }
        });
        if !applied {
            return Err(StoreError::Closed);
        }
        updated.ok_or_else(|| StoreError::NotFound {
            entity: T::NAME,
            id: id.to_string(),
        })
    }

    fn remove_local<T: CachedEntity>(&self, id: &EntityKey) -> StoreResult<bool> {
        let mut removed = false;
        let applied = self.mutate(|c| {
            let records = T::collection_mut(c);
            let before = records.len();
            records.retain(|r| r.key() != id);
            removed = records.len() != before;
        });
        if !applied {
            return Err(StoreError::Closed);
        }
        Ok(removed)
    }

    // ========== Named operations ==========

    pub async fn add_product(&self, data: ProductCreate) -> StoreResult<WriteOutcome<Product>> {
        self.add::<Product>(data).await
    }

    pub async fn update_product(
        &self,
        id: &EntityKey,
        data: ProductUpdate,
    ) -> StoreResult<WriteOutcome<Product>> {
        self.update::<Product>(id, data).await
    }

    pub async fn delete_product(&self, id: &EntityKey) -> StoreResult<WriteOutcome<()>> {
        self.delete::<Product>(id).await
    }

    pub async fn add_rack(&self, data: RackCreate) -> StoreResult<WriteOutcome<Rack>> {
        self.add::<Rack>(data).await
    }

    pub async fn update_rack(
        &self,
        id: &EntityKey,
        data: RackUpdate,
    ) -> StoreResult<WriteOutcome<Rack>> {
        self.update::<Rack>(id, data).await
    }

    pub async fn delete_rack(&self, id: &EntityKey) -> StoreResult<WriteOutcome<()>> {
        self.delete::<Rack>(id).await
    }

    pub async fn add_category(&self, data: CategoryCreate) -> StoreResult<WriteOutcome<Category>> {
        self.add::<Category>(data).await
    }

    pub async fn update_category(
        &self,
        id: &EntityKey,
        data: CategoryUpdate,
    ) -> StoreResult<WriteOutcome<Category>> {
        self.update::<Category>(id, data).await
    }

    pub async fn delete_category(&self, id: &EntityKey) -> StoreResult<WriteOutcome<()>> {
        self.delete::<Category>(id).await
    }

    pub async fn add_product_code(
        &self,
        data: ProductCodeCreate,
    ) -> StoreResult<WriteOutcome<ProductCode>> {
        self.add::<ProductCode>(data).await
    }

    pub async fn update_product_code(
        &self,
        id: &EntityKey,
        data: ProductCodeUpdate,
    ) -> StoreResult<WriteOutcome<ProductCode>> {
        self.update::<ProductCode>(id, data).await
    }

    pub async fn delete_product_code(&self, id: &EntityKey) -> StoreResult<WriteOutcome<()>> {
        self.delete::<ProductCode>(id).await
    }

    pub async fn add_user(&self, data: UserCreate) -> StoreResult<WriteOutcome<UserRecord>> {
        self.add::<UserRecord>(data).await
    }

    pub async fn update_user(
        &self,
        id: &EntityKey,
        data: UserUpdate,
    ) -> StoreResult<WriteOutcome<UserRecord>> {
        self.update::<UserRecord>(id, data).await
    }

    pub async fn delete_user(&self, id: &EntityKey) -> StoreResult<WriteOutcome<()>> {
        self.delete::<UserRecord>(id).await
    }
}

/// First row of a write representation
fn first_returned<T: CachedEntity>(rows: Vec<Value>) -> BackendResult<T> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::decode(format!("no {} row returned", T::NAME)))?;
    Ok(T::from_row(row)?)
}

fn upsert<T: CachedEntity>(records: &mut Vec<T>, record: T) {
    match records.iter_mut().find(|r| r.key() == record.key()) {
        Some(slot) => *slot = record,
        None => records.push(record),
    }
}

/// Decode rows, skipping (and logging) rows that do not fit the model
fn decode_rows<T: serde::de::DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(table, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect()
}

fn assemble(
    products: BackendResult<Vec<Value>>,
    racks: BackendResult<Vec<Value>>,
    categories: BackendResult<Vec<Value>>,
    users: BackendResult<Vec<Value>>,
    codes: BackendResult<Vec<Value>>,
    logs: BackendResult<Vec<Value>>,
) -> BackendResult<Catalog> {
    let products: Vec<Product> = decode_rows(Product::TABLE, products?);
    let racks = decode_rows::<RackRow>(Rack::TABLE, racks?)
        .into_iter()
        .map(|row| Rack::from_row(row, &products))
        .collect();
    Ok(Catalog {
        racks,
        categories: decode_rows(Category::TABLE, categories?),
        users: decode_rows(UserRecord::TABLE, users?),
        product_codes: decode_rows(ProductCode::TABLE, codes?),
        movements: decode_rows::<ActivityLogRow>("activity_logs", logs?)
            .into_iter()
            .map(StockMovement::from)
            .collect(),
        products,
        last_refreshed_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rack_client::MemoryBackend;
    use rack_client::memory::Op;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(backend: Arc<MemoryBackend>, dir: &TempDir) -> Arc<DataStore> {
        let mirror = Arc::new(LocalMirror::open(dir.path()).unwrap());
        DataStore::open(backend, mirror, CancellationToken::new())
    }

    fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "products",
            vec![json!({"id": "p-1", "code": "FZ-01", "inbound_at": "2024-03-01", "weight": 20.0, "manufacturer": "Ocean"})],
        );
        backend.seed(
            "racks",
            vec![json!({"id": "r-1", "name": "A-1", "capacity": 4, "line": "A",
                "rack_products": [{"product_id": "p-1", "floor": 1, "inbound_date": "2024-03-02", "outbound_date": null}]})],
        );
        backend.seed(
            "categories",
            vec![json!({"id": "c-2", "name": "Seafood"}), json!({"id": "c-1", "name": "Dairy"})],
        );
        backend.seed("users", vec![json!({"id": "u-1", "email": "ana@example.com", "name": "Ana", "role": "admin"})]);
        backend.seed("product_codes", vec![json!({"id": "pc-1", "code": "SALMON", "name": "Salmon"})]);
        backend.seed(
            "activity_logs",
            vec![json!({"id": 7, "action": "IN", "details": "3 boxes", "product_id": "p-1", "created_at": "2024-03-02T10:00:00Z"})],
        );
        backend
    }

    #[tokio::test]
    async fn test_refresh_assembles_catalog() {
        let dir = TempDir::new().unwrap();
        let store = store(seeded(), &dir);
        assert!(store.is_stale());

        assert_eq!(store.refresh().await.unwrap(), RefreshOutcome::Applied);
        let catalog = store.snapshot();
        assert_eq!(catalog.racks[0].products[0].code, "FZ-01");
        let names: Vec<_> = catalog.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Dairy", "Seafood"]);
        assert_eq!(catalog.movements[0].quantity, 3);
        assert!(catalog.last_refreshed_at.is_some());
        assert!(!store.is_stale());

        // Mirrored for the next cold start
        let reopened = DataStore::open(
            seeded(),
            Arc::new(LocalMirror::open(dir.path()).unwrap()),
            CancellationToken::new(),
        );
        assert_eq!(reopened.snapshot(), catalog);
    }

    #[tokio::test]
    async fn test_successful_write_merges_returned_row() {
        let dir = TempDir::new().unwrap();
        let backend = seeded();
        let store = store(backend.clone(), &dir);
        store.refresh().await.unwrap();

        let outcome = store
            .add_category(CategoryCreate { name: "Frozen".into() })
            .await
            .unwrap();
        assert!(outcome.is_persisted());
        assert!(!outcome.value().id.is_pending());
        assert_eq!(backend.rows("categories").len(), 3);

        let id = EntityKey::parse("r-1");
        let outcome = store
            .update_rack(&id, RackUpdate { name: Some("A-01".into()), ..Default::default() })
            .await
            .unwrap();
        let rack = outcome.into_inner();
        assert_eq!(rack.name, "A-01");
        // Join-derived products survive the write
        assert_eq!(rack.products.len(), 1);

        assert!(store.delete_product(&EntityKey::parse("p-1")).await.unwrap().is_persisted());
        assert!(store.products().is_empty());
    }

    #[tokio::test]
    async fn test_validation_rejects_before_backend() {
        let dir = TempDir::new().unwrap();
        let backend = seeded();
        let store = store(backend.clone(), &dir);

        let err = store
            .add_rack(RackCreate { name: String::new(), capacity: 4, line: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(backend.calls("racks", Op::Insert), 0);
    }

    #[tokio::test]
    async fn test_failed_write_falls_back_to_placeholder() {
        let dir = TempDir::new().unwrap();
        let backend = seeded();
        let store = store(backend.clone(), &dir);
        backend.fail("products", Op::Insert, BackendError::network("offline"));

        let outcome = store
            .add_product(ProductCreate {
                code: "FZ-02".into(),
                inbound_at: "2024-03-05".into(),
                outbound_at: None,
                weight: 4.5,
                manufacturer: "Nordic".into(),
                floor: None,
            })
            .await
            .unwrap();
        let WriteOutcome::LocalOnly(product) = outcome else {
            panic!("expected local-only write");
        };
        assert!(product.id.is_pending());
        assert_eq!(store.pending_count(), 1);

        // Pending records never reach the backend on update/delete
        store
            .update_product(&product.id, ProductUpdate { weight: Some(5.0), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(backend.calls("products", Op::Update), 0);
        assert_eq!(store.find::<Product>(&product.id).unwrap().weight, 5.0);

        // Replayed once the backend is back
        backend.clear_failures();
        let report = store.flush_pending().await;
        assert_eq!(report, FlushReport { confirmed: 1, remaining: 0 });
        let products = store.products();
        assert!(products.iter().all(|p| !p.id.is_pending()));
        assert!(products.iter().any(|p| p.code == "FZ-02" && p.weight == 5.0));
    }

    #[tokio::test]
    async fn test_unknown_pending_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(seeded(), &dir);
        let err = store.delete_category(&EntityKey::placeholder()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", .. }));
    }

    #[test]
    fn test_not_found_maps_to_entity_code() {
        let err = AppError::from(StoreError::NotFound { entity: "rack", id: "temp-1-x".into() });
        assert_eq!(err.code, ErrorCode::RackNotFound);
        assert_eq!(err.http_status().as_u16(), 404);
        let err = AppError::from(StoreError::NotFound { entity: "product code", id: "pc-9".into() });
        assert_eq!(err.code, ErrorCode::ProductCodeNotFound);
    }

    #[tokio::test]
    async fn test_writes_after_shutdown_are_closed() {
        let dir = TempDir::new().unwrap();
        let backend = seeded();
        let store = store(backend.clone(), &dir);
        store.shutdown();

        let err = store
            .add_category(shared::models::CategoryCreate { name: "Frozen".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Closed));
        assert_eq!(backend.calls("categories", Op::Insert), 0);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_during_shutdown_reports_closed() {
        let dir = TempDir::new().unwrap();
        let backend = seeded();
        let store = store(backend.clone(), &dir);
        backend.set_latency(Some(std::time::Duration::from_secs(1)));
        backend.fail("categories", Op::Insert, BackendError::network("offline"));

        let pending = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .add_category(shared::models::CategoryCreate { name: "Frozen".into() })
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store.shutdown();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Closed));
        assert_eq!(store.pending_count(), 0);
        assert_eq!(AppError::from(err).code, ErrorCode::StoreClosed);
    }
}
