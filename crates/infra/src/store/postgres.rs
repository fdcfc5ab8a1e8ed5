//! Postgres-backed inventory store (feature `postgres`).
//!
//! Same semantics as the SQLite store: multi-row operations run in one SQL
//! transaction and are rolled back on any failure. Row locks taken by the
//! leading `UPDATE`/`DELETE` serialize concurrent ledger writes against the
//! same material. Name search uses `ILIKE`, which folds case following the
//! database's `LC_CTYPE`, so non-ASCII letters fold under a UTF-8 locale.

use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, Postgres};

use labstock_inventory::StockPolicy;

use crate::error::{map_sqlx_error, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id   BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id   BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS materials (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        category_id BIGINT NULL REFERENCES categories(id) DEFERRABLE INITIALLY DEFERRED,
        unit        TEXT NOT NULL,
        stock       BIGINT NOT NULL DEFAULT 0,
        min_stock   BIGINT NOT NULL DEFAULT 0,
        location    TEXT NULL,
        image       TEXT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_materials_category_id ON materials (category_id)",
    "CREATE INDEX IF NOT EXISTS idx_materials_location ON materials (location)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id          BIGSERIAL PRIMARY KEY,
        material_id BIGINT NOT NULL REFERENCES materials(id),
        type        TEXT NOT NULL CHECK (type IN ('IN', 'OUT')),
        quantity    BIGINT NOT NULL CHECK (quantity > 0),
        created_at  TIMESTAMPTZ NOT NULL,
        notes       TEXT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_material_id ON transactions (material_id)",
];

/// Postgres inventory store.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    policy: StockPolicy,
}

impl PostgresInventoryStore {
    /// Wrap an existing pool. The schema is not created; see [`Self::connect`].
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            policy: StockPolicy::default(),
        }
    }

    pub fn with_stock_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
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
    store: PostgresInventoryStore,
    conn: PgConnection,
    db: Postgres,
    backend: "postgres",
    like: "ILIKE",
}

/// Runs against the database named by `LABSTOCK_TEST_POSTGRES_URL`; skipped
/// when it is unset.
#[cfg(test)]
mod tests {
    use labstock_core::DomainError;
    use labstock_inventory::{
        ledger_balance, CategoryDraft, MaterialDraft, MaterialFilter, NewMaterial,
        RecordTransaction, TransactionFilter, TransactionKind, STOCK_LIMIT,
    };

    use super::*;
    use crate::store::InventoryStore;
    use crate::StoreError;

    async fn store() -> Option<PostgresInventoryStore> {
        let url = std::env::var("LABSTOCK_TEST_POSTGRES_URL").ok()?;
        Some(PostgresInventoryStore::connect(&url).await.unwrap())
    }

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
    }

    #[tokio::test]
    async fn ledger_guard_and_cascade_round_trip() {
        let Some(store) = store().await else {
            return;
        };
        assert_eq!(store.backend(), "postgres");

        let category = store
            .create_category(&CategoryDraft::new(&unique("Solvents")).unwrap())
            .await
            .unwrap();
        let name = unique("Äther");
        let draft = MaterialDraft::new(&name, "ml")
            .unwrap()
            .with_category(Some(category.id))
            .with_min_stock(2)
            .unwrap();
        let created = store
            .create_material(&NewMaterial::new(draft, 5).unwrap())
            .await
            .unwrap();
        let id = created.material.id;

        let out = RecordTransaction::new(id, TransactionKind::Out, 4, None).unwrap();
        store.record_transaction(&out).await.unwrap();
        let listing = store.get_material(id).await.unwrap();
        assert_eq!(listing.material.stock, 1);
        assert!(listing.material.is_low_stock());

        let history: Vec<_> = store
            .list_transactions(&TransactionFilter::for_material(id))
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.transaction)
            .collect();
        assert_eq!(ledger_balance(&history), 1);

        let found = store
            .list_materials(&MaterialFilter {
                query: Some(name.to_ascii_uppercase()),
                category_id: Some(category.id),
                ..MaterialFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let fill = RecordTransaction::new(id, TransactionKind::In, STOCK_LIMIT - 1, None).unwrap();
        store.record_transaction(&fill).await.unwrap();
        let overflow = RecordTransaction::new(id, TransactionKind::In, 1, None).unwrap();
        let err = store.record_transaction(&overflow).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvariantViolation(_))
        ));

        let err = store.delete_category(category.id).await.unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&DomainError::in_use("category", 1))
        );

        store.delete_material(id).await.unwrap();
        store.delete_category(category.id).await.unwrap();
        assert!(store
            .list_transactions(&TransactionFilter::for_material(id))
            .await
            .unwrap()
            .is_empty());
    }
}
