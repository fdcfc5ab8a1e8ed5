//! SQLite-backed inventory store.
//!
//! Name search uses `LIKE`, which folds ASCII letters only: `"ethanol"` finds
//! `"Ethanol"`, but `"äther"` does not find `"Äther"`. Non-ASCII names match
//! when searched with the stored case.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};

use labstock_inventory::StockPolicy;

use crate::error::{map_sqlx_error, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS materials (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        category_id INTEGER NULL REFERENCES categories(id) DEFERRABLE INITIALLY DEFERRED,
        unit        TEXT NOT NULL,
        stock       INTEGER NOT NULL DEFAULT 0,
        min_stock   INTEGER NOT NULL DEFAULT 0,
        location    TEXT NULL,
        image       TEXT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_materials_category_id ON materials (category_id)",
    "CREATE INDEX IF NOT EXISTS idx_materials_location ON materials (location)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        material_id INTEGER NOT NULL REFERENCES materials(id),
        type        TEXT NOT NULL CHECK (type IN ('IN', 'OUT')),
        quantity    INTEGER NOT NULL CHECK (quantity > 0),
        created_at  TEXT NOT NULL,
        notes       TEXT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_material_id ON transactions (material_id)",
];

/// SQLite inventory store.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
    policy: StockPolicy,
}

impl SqliteInventoryStore {
    /// Wrap an existing pool. The schema is not created; see [`Self::connect`].
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            policy: StockPolicy::default(),
        }
    }

    pub fn with_stock_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connect to `database_url` (e.g. `sqlite://labstock.db?mode=rwc`) and
    /// create missing tables.
    ///
    /// In-memory databases live only as long as their connection, so they get
    /// a single connection that is never recycled.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| map_sqlx_error("parse_database_url", e))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Private in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("create_schema", e))?;
        }
        Ok(())
    }
}

impl_inventory_store! {
    store: SqliteInventoryStore,
    conn: SqliteConnection,
    db: Sqlite,
    backend: "sqlite",
    like: "LIKE",
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use labstock_core::{CategoryId, DomainError, LocationId, MaterialId};
    use labstock_inventory::{
        ledger_balance, CategoryDraft, LocationDraft, MaterialDraft, MaterialFilter,
        MaterialListing, NewMaterial, RecordTransaction, Transaction, TransactionFilter,
        TransactionKind, STOCK_LIMIT,
    };

    use crate::store::InventoryStore;
    use crate::StoreError;

    async fn store() -> SqliteInventoryStore {
        SqliteInventoryStore::in_memory().await.unwrap()
    }

    async fn material(
        store: &SqliteInventoryStore,
        name: &str,
        category: Option<CategoryId>,
        location: Option<&str>,
        stock: i64,
        min_stock: i64,
    ) -> MaterialListing {
        let draft = MaterialDraft::new(name, "pcs")
            .unwrap()
            .with_category(category)
            .with_location(location)
            .with_min_stock(min_stock)
            .unwrap();
        store
            .create_material(&NewMaterial::new(draft, stock).unwrap())
            .await
            .unwrap()
    }

    fn record(id: MaterialId, kind: TransactionKind, quantity: i64, notes: &str) -> RecordTransaction {
        RecordTransaction::new(id, kind, quantity, Some(notes)).unwrap()
    }

    async fn history(store: &SqliteInventoryStore, id: MaterialId) -> Vec<Transaction> {
        store
            .list_transactions(&TransactionFilter::for_material(id))
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.transaction)
            .collect()
    }

    fn domain(err: StoreError) -> DomainError {
        match err {
            StoreError::Domain(e) => e,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ledger_tracks_worked_example() {
        let store = store().await;
        let m = material(&store, "Nitrile gloves", None, None, 10, 5).await;
        let id = m.material.id;
        assert_eq!(m.material.stock, 10);

        let tx = store
            .record_transaction(&record(id, TransactionKind::Out, 3, "issued"))
            .await
            .unwrap();
        assert_eq!(tx.kind, TransactionKind::Out);
        assert_eq!(tx.quantity, 3);
        assert_eq!(tx.notes.as_deref(), Some("issued"));

        let after = store.get_material(id).await.unwrap();
        assert_eq!(after.material.stock, 7);
        assert_eq!(store.stats(10).await.unwrap().low_stock, 0);

        store
            .record_transaction(&record(id, TransactionKind::Out, 5, "lab 2"))
            .await
            .unwrap();
        let after = store.get_material(id).await.unwrap();
        assert_eq!(after.material.stock, 2);
        assert!(after.material.is_low_stock());
        assert_eq!(store.stats(10).await.unwrap().low_stock, 1);

        let txs = history(&store, id).await;
        assert_eq!(txs.len(), 3, "initial stock + two issues");
        assert_eq!(ledger_balance(&txs), after.material.stock);
    }

    #[tokio::test]
    async fn stock_always_equals_sum_of_transactions() {
        let store = store().await;
        let id = material(&store, "Solder", None, None, 0, 0).await.material.id;

        let moves = [
            (TransactionKind::In, 40),
            (TransactionKind::Out, 15),
            (TransactionKind::Out, 30),
            (TransactionKind::In, 2),
            (TransactionKind::Out, 1),
        ];
        for (kind, qty) in moves {
            store.record_transaction(&record(id, kind, qty, "")).await.unwrap();
            let stock = store.get_material(id).await.unwrap().material.stock;
            assert_eq!(stock, ledger_balance(&history(&store, id).await));
        }
        // Negative stock is permitted by default.
        assert_eq!(store.get_material(id).await.unwrap().material.stock, -4);
    }

    #[tokio::test]
    async fn ledger_on_missing_material_is_not_found() {
        let store = store().await;
        let err = store
            .record_transaction(&record(MaterialId::new(99), TransactionKind::In, 1, ""))
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("material"));
        assert!(store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reject_policy_leaves_store_unchanged_on_overdraw() {
        let store = store().await.with_stock_policy(StockPolicy::RejectNegative);
        let id = material(&store, "Acetone", None, None, 2, 0).await.material.id;

        let err = store
            .record_transaction(&record(id, TransactionKind::Out, 3, "too much"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvariantViolation(_)));
        assert_eq!(store.get_material(id).await.unwrap().material.stock, 2);
        assert_eq!(history(&store, id).await.len(), 1);

        store
            .record_transaction(&record(id, TransactionKind::Out, 2, "exact"))
            .await
            .unwrap();
        assert_eq!(store.get_material(id).await.unwrap().material.stock, 0);
    }

    #[tokio::test]
    async fn category_delete_is_guarded_by_dependents() {
        let store = store().await;
        let cat = store
            .create_category(&CategoryDraft::new("Electronics").unwrap())
            .await
            .unwrap();
        let a = material(&store, "Resistor", Some(cat.id), None, 0, 0).await;
        material(&store, "Capacitor", Some(cat.id), None, 0, 0).await;

        let err = store.delete_category(cat.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::in_use("category", 2));
        assert_eq!(store.list_categories().await.unwrap(), vec![cat.clone()]);

        // Reassign one, delete the other: the category becomes deletable.
        let draft = MaterialDraft::new("Resistor", "pcs").unwrap();
        store.update_material(a.material.id, &draft).await.unwrap();
        let err = store.delete_category(cat.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::in_use("category", 1));

        let cap = store
            .list_materials(&MaterialFilter {
                category_id: Some(cat.id),
                ..MaterialFilter::default()
            })
            .await
            .unwrap();
        store.delete_material(cap[0].material.id).await.unwrap();

        store.delete_category(cat.id).await.unwrap();
        assert!(store.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn location_delete_is_guarded_by_name_and_renames_orphan() {
        let store = store().await;
        let shelf = store
            .create_location(&LocationDraft::new("Shelf A").unwrap())
            .await
            .unwrap();
        let m = material(&store, "Pipettes", None, Some("Shelf A"), 0, 0).await;

        let err = store.delete_location(shelf.id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::in_use("location", 1));
        assert_eq!(store.list_locations().await.unwrap().len(), 1);

        // Renaming does not cascade: the material keeps the old name...
        let renamed = store
            .update_location(shelf.id, &LocationDraft::new("Shelf B").unwrap())
            .await
            .unwrap();
        assert_eq!(renamed.name, "Shelf B");
        let m = store.get_material(m.material.id).await.unwrap();
        assert_eq!(m.material.location.as_deref(), Some("Shelf A"));

        // ...so nothing references the renamed location any more.
        store.delete_location(shelf.id).await.unwrap();
        assert!(store.list_locations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_unknown_records_is_not_found() {
        let store = store().await;
        assert_eq!(
            domain(store.delete_category(CategoryId::new(5)).await.unwrap_err()),
            DomainError::not_found("category")
        );
        assert_eq!(
            domain(store.delete_location(LocationId::new(5)).await.unwrap_err()),
            DomainError::not_found("location")
        );
        assert_eq!(
            domain(store.delete_material(MaterialId::new(5)).await.unwrap_err()),
            DomainError::not_found("material")
        );
    }

    #[tokio::test]
    async fn material_delete_cascades_to_transactions() {
        let store = store().await;
        let keep = material(&store, "Beakers", None, None, 4, 0).await.material.id;
        let gone = material(&store, "Flasks", None, None, 6, 0).await.material.id;
        store
            .record_transaction(&record(gone, TransactionKind::Out, 1, ""))
            .await
            .unwrap();

        let deleted = store.delete_material(gone).await.unwrap();
        assert_eq!(deleted.name, "Flasks");
        assert_eq!(deleted.stock, 5);

        assert!(history(&store, gone).await.is_empty());
        let all = store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert!(all.iter().all(|l| l.transaction.material_id == keep));
        assert_eq!(all.len(), 1);
        assert!(matches!(
            domain(store.get_material(gone).await.unwrap_err()),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn duplicate_names_conflict_and_keep_original() {
        let store = store().await;
        let first = store
            .create_category(&CategoryDraft::new("Glassware").unwrap())
            .await
            .unwrap();
        let err = store
            .create_category(&CategoryDraft::new("Glassware").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Conflict(_)));
        assert_eq!(store.list_categories().await.unwrap(), vec![first]);

        store
            .create_location(&LocationDraft::new("Freezer").unwrap())
            .await
            .unwrap();
        let other = store
            .create_location(&LocationDraft::new("Cabinet").unwrap())
            .await
            .unwrap();
        let err = store
            .update_location(other.id, &LocationDraft::new("Freezer").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Conflict(_)));
        let names: Vec<_> = store
            .list_locations()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Cabinet", "Freezer"]);
    }

    #[tokio::test]
    async fn unknown_category_on_create_is_rejected_atomically() {
        let store = store().await;
        let draft = MaterialDraft::new("Ghost", "pcs")
            .unwrap()
            .with_category(Some(CategoryId::new(42)));
        let err = store
            .create_material(&NewMaterial::new(draft, 5).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));
        assert!(store
            .list_materials(&MaterialFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn material_listing_joins_and_filters() {
        let store = store().await;
        let chem = store
            .create_category(&CategoryDraft::new("Chemicals").unwrap())
            .await
            .unwrap();
        material(&store, "Ethanol 96%", Some(chem.id), Some("Cabinet"), 1, 5).await;
        material(&store, "Methanol", Some(chem.id), Some("Cabinet"), 20, 5).await;
        material(&store, "Tape", None, Some("Drawer"), 3, 1).await;

        let all = store.list_materials(&MaterialFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|l| l.material.name.as_str()).collect();
        assert_eq!(names, vec!["Ethanol 96%", "Methanol", "Tape"]);
        assert_eq!(all[0].category_name.as_deref(), Some("Chemicals"));
        assert_eq!(all[2].category_name, None);

        let search = |query: &str| MaterialFilter {
            query: Some(query.to_string()),
            ..MaterialFilter::default()
        };
        assert_eq!(store.list_materials(&search("ETHANOL")).await.unwrap().len(), 2);
        assert_eq!(store.list_materials(&search("96%")).await.unwrap().len(), 1);
        assert_eq!(store.list_materials(&search("  ")).await.unwrap().len(), 3);

        let low = store
            .list_materials(&MaterialFilter {
                low_stock_only: true,
                ..MaterialFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].material.name, "Ethanol 96%");

        let drawer = store
            .list_materials(&MaterialFilter {
                location: Some("Drawer".to_string()),
                ..MaterialFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(drawer.len(), 1);
    }

    #[tokio::test]
    async fn update_material_never_touches_stock() {
        let store = store().await;
        let m = material(&store, "Wire", None, None, 12, 2).await;
        let draft = MaterialDraft::new("Copper wire", "m")
            .unwrap()
            .with_min_stock(20)
            .unwrap();
        let updated = store.update_material(m.material.id, &draft).await.unwrap();
        assert_eq!(updated.material.name, "Copper wire");
        assert_eq!(updated.material.unit, "m");
        assert_eq!(updated.material.stock, 12);
        assert!(updated.material.is_low_stock());

        let err = store
            .update_material(MaterialId::new(404), &draft)
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::not_found("material"));
    }

    #[tokio::test]
    async fn stats_report_recent_transactions_newest_first() {
        let store = store().await;
        let a = material(&store, "A", None, None, 0, 0).await.material.id;
        let b = material(&store, "B", None, None, 0, 3).await.material.id;
        for qty in 1..=4 {
            store
                .record_transaction(&record(a, TransactionKind::In, qty, ""))
                .await
                .unwrap();
        }
        store
            .record_transaction(&record(b, TransactionKind::In, 9, "delivery"))
            .await
            .unwrap();

        let stats = store.stats(3).await.unwrap();
        assert_eq!(stats.total_materials, 2);
        assert_eq!(stats.low_stock, 0);
        assert_eq!(stats.recent_transactions.len(), 3);
        let first = &stats.recent_transactions[0];
        assert_eq!(first.material_name, "B");
        assert_eq!(first.transaction.quantity, 9);
        let quantities: Vec<_> = stats.recent_transactions[1..]
            .iter()
            .map(|l| l.transaction.quantity)
            .collect();
        assert_eq!(quantities, vec![4, 3]);
    }

    #[tokio::test]
    async fn stock_beyond_limit_is_refused_and_leaves_store_unchanged() {
        let store = store().await;
        let id = material(&store, "Bulk beads", None, None, STOCK_LIMIT, 0)
            .await
            .material
            .id;

        let err = store
            .record_transaction(&record(id, TransactionKind::In, 1, "one more"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvariantViolation(_)));

        let listing = store.get_material(id).await.unwrap();
        assert_eq!(listing.material.stock, STOCK_LIMIT);
        assert_eq!(history(&store, id).await.len(), 1);
    }

    /// File-backed database so that the pool hands out several connections.
    struct TempDb(std::path::PathBuf);

    impl TempDb {
        fn new() -> Self {
            let name = format!("labstock-{}.db", uuid::Uuid::new_v4().simple());
            Self(std::env::temp_dir().join(name))
        }

        fn url(&self) -> String {
            format!("sqlite://{}?mode=rwc", self.0.display())
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut path = self.0.clone().into_os_string();
                path.push(suffix);
                let _ = std::fs::remove_file(path);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ledger_writes_keep_stock_equal_to_history() {
        let db = TempDb::new();
        let store = Arc::new(SqliteInventoryStore::connect(&db.url()).await.unwrap());
        let id = material(&store, "Pipette tips", None, None, 10, 0)
            .await
            .material
            .id;

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let store = Arc::clone(&store);
                let (kind, quantity) = if i % 3 == 0 {
                    (TransactionKind::Out, 2)
                } else {
                    (TransactionKind::In, 1)
                };
                tokio::spawn(async move {
                    store
                        .record_transaction(&record(id, kind, quantity, "bench"))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history: Vec<Transaction> = store
            .list_transactions(
                &TransactionFilter::for_material(id).with_limit(Some(TransactionFilter::MAX_LIMIT)),
            )
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.transaction)
            .collect();
        assert_eq!(history.len(), 201);

        let stock = store.get_material(id).await.unwrap().material.stock;
        // 67 OUT of 2 and 133 IN of 1 on top of the opening 10.
        assert_eq!(stock, 10 + 133 - 134);
        assert_eq!(stock, ledger_balance(&history));
    }

    #[tokio::test]
    async fn name_search_folds_ascii_case_only() {
        let store = store().await;
        material(&store, "Äther", None, None, 1, 0).await;
        material(&store, "Aceton", None, None, 1, 0).await;

        let search = |query: &str| MaterialFilter {
            query: Some(query.to_string()),
            ..MaterialFilter::default()
        };
        let found = store.list_materials(&search("Äther")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.list_materials(&search("ÄTHER")).await.unwrap().len(), 1);
        assert_eq!(store.list_materials(&search("aCETON")).await.unwrap().len(), 1);
        assert!(store.list_materials(&search("äther")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_references_count_materials_sharing_a_file() {
        let store = store().await;
        let with_image = |name: &str| {
            MaterialDraft::new(name, "pcs")
                .unwrap()
                .with_image(Some("1700000000000-ab12.png"))
        };
        let a = store
            .create_material(&NewMaterial::new(with_image("Flask"), 0).unwrap())
            .await
            .unwrap();
        store
            .create_material(&NewMaterial::new(with_image("Beaker"), 0).unwrap())
            .await
            .unwrap();

        assert_eq!(store.image_references("1700000000000-ab12.png").await.unwrap(), 2);
        store.delete_material(a.material.id).await.unwrap();
        assert_eq!(store.image_references("1700000000000-ab12.png").await.unwrap(), 1);
        assert_eq!(store.image_references("missing.png").await.unwrap(), 0);
    }
}
