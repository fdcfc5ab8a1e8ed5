//! Relational inventory storage.
//!
//! `InventoryStore` is the single storage capability set the API depends on.
//! Every mutating operation that touches more than one row (ledger,
//! referential guard, material cascade) runs inside one SQL transaction, so
//! callers never observe a half-applied change.
//!
//! Backends:
//! - `SqliteInventoryStore`: file-based (or in-memory for tests).
//! - `PostgresInventoryStore`: networked, behind the `postgres` feature.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Database, Encode, QueryBuilder, Type};

use labstock_core::{CategoryId, LocationId, MaterialId};
use labstock_inventory::{
    Category, CategoryDraft, InventoryStats, Location, LocationDraft, Material, MaterialDraft,
    MaterialFilter, MaterialListing, NewMaterial, RecordTransaction, StockPolicy, Transaction,
    TransactionFilter, TransactionListing,
};

use crate::error::{map_sqlx_error, StoreResult};

mod rows;
#[macro_use]
mod sql;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use sqlite::SqliteInventoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresInventoryStore;

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Short backend name for logs (`sqlite`, `postgres`).
    fn backend(&self) -> &'static str;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Fails with `Conflict` when the name is taken.
    async fn create_category(&self, draft: &CategoryDraft) -> StoreResult<Category>;

    async fn update_category(&self, id: CategoryId, draft: &CategoryDraft)
    -> StoreResult<Category>;

    /// Fails with `NotFound`, or `InUse` while any material references the category.
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;

    async fn list_locations(&self) -> StoreResult<Vec<Location>>;

    async fn create_location(&self, draft: &LocationDraft) -> StoreResult<Location>;

    /// Renaming does not touch materials holding the old name.
    async fn update_location(&self, id: LocationId, draft: &LocationDraft)
    -> StoreResult<Location>;

    /// Fails with `NotFound`, or `InUse` while any material references the location by name.
    async fn delete_location(&self, id: LocationId) -> StoreResult<()>;

    async fn list_materials(&self, filter: &MaterialFilter) -> StoreResult<Vec<MaterialListing>>;

    async fn get_material(&self, id: MaterialId) -> StoreResult<MaterialListing>;

    /// Inserts the material and books its initial stock as an `IN` transaction.
    async fn create_material(&self, new: &NewMaterial) -> StoreResult<MaterialListing>;

    /// Updates editable fields; stock is never touched.
    async fn update_material(
        &self,
        id: MaterialId,
        draft: &MaterialDraft,
    ) -> StoreResult<MaterialListing>;

    /// Deletes the material's transactions, then the material. Returns the removed row.
    async fn delete_material(&self, id: MaterialId) -> StoreResult<Material>;

    /// Number of materials whose `image` is `image`.
    async fn image_references(&self, image: &str) -> StoreResult<i64>;

    /// Ledger operation: adjust stock and append the transaction atomically.
    async fn record_transaction(&self, cmd: &RecordTransaction) -> StoreResult<Transaction>;

    /// Newest first.
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> StoreResult<Vec<TransactionListing>>;

    async fn stats(&self, recent_limit: u32) -> StoreResult<InventoryStats>;
}

/// Open a store for `database_url`, picking the backend from the URL scheme.
pub async fn connect(
    database_url: &str,
    policy: StockPolicy,
) -> StoreResult<Arc<dyn InventoryStore>> {
    if is_postgres_url(database_url) {
        return connect_postgres(database_url, policy).await;
    }
    let store = SqliteInventoryStore::connect(database_url)
        .await?
        .with_stock_policy(policy);
    Ok(Arc::new(store))
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
    database_url: &str,
    policy: StockPolicy,
) -> StoreResult<Arc<dyn InventoryStore>> {
    let store = PostgresInventoryStore::connect(database_url)
        .await?
        .with_stock_policy(policy);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
    _database_url: &str,
    _policy: StockPolicy,
) -> StoreResult<Arc<dyn InventoryStore>> {
    Err(crate::StoreError::database(
        "connect",
        "postgres URL given but labstock-infra was built without the `postgres` feature",
    ))
}

/// Commit on success, roll back on failure.
async fn finish<DB, T>(
    tx: sqlx::Transaction<'_, DB>,
    operation: &'static str,
    result: StoreResult<T>,
) -> StoreResult<T>
where
    DB: Database,
{
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(operation, e))?;
            Ok(value)
        }
        Err(err) => {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            Err(err)
        }
    }
}

const MATERIAL_LISTING_SELECT: &str = r#"
    SELECT
        m.id,
        m.name,
        m.category_id,
        m.unit,
        m.stock,
        m.min_stock,
        m.location,
        m.image,
        c.name AS category_name
    FROM materials m
    LEFT JOIN categories c ON c.id = m.category_id
"#;

const TRANSACTION_LISTING_SELECT: &str = r#"
    SELECT
        t.id,
        t.material_id,
        t.type,
        t.quantity,
        t.created_at,
        t.notes,
        m.name AS material_name
    FROM transactions t
    JOIN materials m ON m.id = t.material_id
"#;

/// Build the filtered material listing query. `like` is the case-insensitive
/// match operator of the backend (`LIKE` or `ILIKE`).
fn material_listing_query<'a, DB>(filter: &MaterialFilter, like: &str) -> QueryBuilder<'a, DB>
where
    DB: Database,
    DB::Arguments<'a>: Default,
    String: Encode<'a, DB> + Type<DB>,
    i64: Encode<'a, DB> + Type<DB>,
{
    let mut qb = QueryBuilder::new(MATERIAL_LISTING_SELECT);
    qb.push(" WHERE 1 = 1");

    if let Some(pattern) = filter.like_pattern() {
        qb.push(format_args!(" AND m.name {like} "))
            .push_bind(pattern)
            .push(" ESCAPE '\\'");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND m.category_id = ").push_bind(category_id.get());
    }
    if let Some(location) = &filter.location {
        qb.push(" AND m.location = ").push_bind(location.clone());
    }
    if filter.low_stock_only {
        qb.push(" AND m.stock <= m.min_stock");
    }

    qb.push(" ORDER BY m.name ASC, m.id ASC");
    qb
}

fn transaction_listing_query<'a, DB>(filter: &TransactionFilter) -> QueryBuilder<'a, DB>
where
    DB: Database,
    DB::Arguments<'a>: Default,
    i64: Encode<'a, DB> + Type<DB>,
{
    let mut qb = QueryBuilder::new(TRANSACTION_LISTING_SELECT);
    if let Some(material_id) = filter.material_id {
        qb.push(" WHERE t.material_id = ").push_bind(material_id.get());
    }
    // Row ids are assigned at insert, which is also when `created_at` is stamped.
    qb.push(" ORDER BY t.id DESC LIMIT ")
        .push_bind(i64::from(filter.limit));
    qb
}
