//! Statements and `InventoryStore` plumbing shared by the SQL backends.
//!
//! Every statement uses `$N` placeholders, which both Postgres and SQLite
//! accept, so one body serves both drivers. Each backend module provides its
//! schema and pool setup, then expands [`impl_inventory_store!`] for its
//! connection type. Dynamic filters go through the generic `QueryBuilder`
//! helpers in the parent module.
//!
//! Multi-statement operations take the write lock with their first statement
//! (`UPDATE`/`DELETE … RETURNING`) and validate afterwards, rolling back on
//! failure. SQLite refuses to upgrade a read transaction to a write
//! transaction under contention (`SQLITE_BUSY`); Postgres takes the row lock
//! early and serializes concurrent writers on the same material.

/// Expand the ledger/guard/cascade helpers and the `InventoryStore` impl for
/// one backend. The store type needs `pool` and `policy` fields.
macro_rules! impl_inventory_store {
    (
        store: $store:ty,
        conn: $conn:ty,
        db: $db:ty,
        backend: $backend:literal,
        like: $like:literal $(,)?
    ) => {
        /// Adjust stock and append the transaction row. Runs on the caller's transaction.
        async fn apply_ledger(
            conn: &mut $conn,
            policy: ::labstock_inventory::StockPolicy,
            cmd: &::labstock_inventory::RecordTransaction,
        ) -> $crate::error::StoreResult<::labstock_inventory::Transaction> {
            use $crate::error::map_sqlx_error;

            let adjustment = cmd.adjustment();

            let new_stock: Option<i64> = ::sqlx::query_scalar(
                "UPDATE materials SET stock = stock + $1 WHERE id = $2 RETURNING stock",
            )
            .bind(adjustment)
            .bind(cmd.material_id().get())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("update_stock", e))?;

            let new_stock =
                new_stock.ok_or(::labstock_core::DomainError::not_found("material"))?;
            policy.check(adjustment, new_stock)?;

            let created_at = ::chrono::Utc::now();
            let id: i64 = ::sqlx::query_scalar(
                r#"
                INSERT INTO transactions (material_id, type, quantity, created_at, notes)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(cmd.material_id().get())
            .bind(cmd.kind().as_str())
            .bind(cmd.quantity())
            .bind(created_at)
            .bind(cmd.notes())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;

            Ok(::labstock_inventory::Transaction {
                id: ::labstock_core::TransactionId::new(id),
                material_id: cmd.material_id(),
                kind: cmd.kind(),
                quantity: cmd.quantity(),
                created_at,
                notes: cmd.notes().map(str::to_string),
            })
        }

        async fn ensure_category(
            conn: &mut $conn,
            id: Option<::labstock_core::CategoryId>,
        ) -> $crate::error::StoreResult<()> {
            let Some(id) = id else {
                return Ok(());
            };
            let exists: Option<i64> =
                ::sqlx::query_scalar("SELECT id FROM categories WHERE id = $1")
                    .bind(id.get())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("check_category", e))?;
            match exists {
                Some(_) => Ok(()),
                None => Err(::labstock_core::DomainError::validation(format!(
                    "category {id} does not exist"
                ))
                .into()),
            }
        }

        async fn fetch_listing(
            conn: &mut $conn,
            id: ::labstock_core::MaterialId,
        ) -> $crate::error::StoreResult<::labstock_inventory::MaterialListing> {
            let sql = format!("{} WHERE m.id = $1", $crate::store::MATERIAL_LISTING_SELECT);
            let row: Option<$crate::store::rows::MaterialRow> = ::sqlx::query_as(&sql)
                .bind(id.get())
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| $crate::error::map_sqlx_error("get_material", e))?;
            row.map(::labstock_inventory::MaterialListing::from)
                .ok_or_else(|| ::labstock_core::DomainError::not_found("material").into())
        }

        async fn insert_material(
            conn: &mut $conn,
            new: &::labstock_inventory::NewMaterial,
        ) -> $crate::error::StoreResult<::labstock_core::MaterialId> {
            let draft = new.draft();
            let id: i64 = ::sqlx::query_scalar(
                r#"
                INSERT INTO materials (name, category_id, unit, stock, min_stock, location, image)
                VALUES ($1, $2, $3, 0, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(draft.name())
            .bind(draft.category_id().map(|c| c.get()))
            .bind(draft.unit())
            .bind(draft.min_stock())
            .bind(draft.location())
            .bind(draft.image())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| $crate::error::map_sqlx_error("insert_material", e))?;
            let id = ::labstock_core::MaterialId::new(id);

            ensure_category(conn, draft.category_id()).await?;

            if new.initial_stock() > 0 {
                let opening = ::labstock_inventory::RecordTransaction::new(
                    id,
                    ::labstock_inventory::TransactionKind::In,
                    new.initial_stock(),
                    Some(::labstock_inventory::NewMaterial::INITIAL_STOCK_NOTE),
                )?;
                apply_ledger(conn, ::labstock_inventory::StockPolicy::AllowNegative, &opening)
                    .await?;
            }

            Ok(id)
        }

        async fn update_material_row(
            conn: &mut $conn,
            id: ::labstock_core::MaterialId,
            draft: &::labstock_inventory::MaterialDraft,
        ) -> $crate::error::StoreResult<()> {
            let updated = ::sqlx::query(
                r#"
                UPDATE materials
                SET name = $1, category_id = $2, unit = $3, min_stock = $4, location = $5, image = $6
                WHERE id = $7
                "#,
            )
            .bind(draft.name())
            .bind(draft.category_id().map(|c| c.get()))
            .bind(draft.unit())
            .bind(draft.min_stock())
            .bind(draft.location())
            .bind(draft.image())
            .bind(id.get())
            .execute(&mut *conn)
            .await
            .map_err(|e| $crate::error::map_sqlx_error("update_material", e))?;

            if updated.rows_affected() == 0 {
                return Err(::labstock_core::DomainError::not_found("material").into());
            }
            ensure_category(conn, draft.category_id()).await
        }

        async fn delete_category_guarded(
            conn: &mut $conn,
            id: ::labstock_core::CategoryId,
        ) -> $crate::error::StoreResult<()> {
            use $crate::error::map_sqlx_error;

            let deleted: Option<i64> =
                ::sqlx::query_scalar("DELETE FROM categories WHERE id = $1 RETURNING id")
                    .bind(id.get())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("delete_category", e))?;
            if deleted.is_none() {
                return Err(::labstock_core::DomainError::not_found("category").into());
            }

            let dependents: i64 =
                ::sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE category_id = $1")
                    .bind(id.get())
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("count_category_dependents", e))?;
            if dependents > 0 {
                return Err(::labstock_core::DomainError::in_use("category", dependents).into());
            }
            Ok(())
        }

        async fn delete_location_guarded(
            conn: &mut $conn,
            id: ::labstock_core::LocationId,
        ) -> $crate::error::StoreResult<()> {
            use $crate::error::map_sqlx_error;

            let name: Option<String> =
                ::sqlx::query_scalar("DELETE FROM locations WHERE id = $1 RETURNING name")
                    .bind(id.get())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("delete_location", e))?;
            let Some(name) = name else {
                return Err(::labstock_core::DomainError::not_found("location").into());
            };

            let dependents: i64 =
                ::sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE location = $1")
                    .bind(&name)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("count_location_dependents", e))?;
            if dependents > 0 {
                return Err(::labstock_core::DomainError::in_use("location", dependents).into());
            }
            Ok(())
        }

        async fn delete_material_cascade(
            conn: &mut $conn,
            id: ::labstock_core::MaterialId,
        ) -> $crate::error::StoreResult<::labstock_inventory::Material> {
            use $crate::error::map_sqlx_error;

            ::sqlx::query("DELETE FROM transactions WHERE material_id = $1")
                .bind(id.get())
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("delete_material_transactions", e))?;

            let row: Option<$crate::store::rows::MaterialRow> = ::sqlx::query_as(
                r#"
                DELETE FROM materials WHERE id = $1
                RETURNING id, name, category_id, unit, stock, min_stock, location, image
                "#,
            )
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("delete_material", e))?;

            row.map(::labstock_inventory::Material::from)
                .ok_or_else(|| ::labstock_core::DomainError::not_found("material").into())
        }

        #[::async_trait::async_trait]
        impl $crate::store::InventoryStore for $store {
            fn backend(&self) -> &'static str {
                $backend
            }

            async fn list_categories(
                &self,
            ) -> $crate::error::StoreResult<Vec<::labstock_inventory::Category>> {
                let rows: Vec<$crate::store::rows::CategoryRow> =
                    ::sqlx::query_as("SELECT id, name FROM categories ORDER BY name ASC")
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| $crate::error::map_sqlx_error("list_categories", e))?;
                Ok(rows.into_iter().map(::labstock_inventory::Category::from).collect())
            }

            async fn create_category(
                &self,
                draft: &::labstock_inventory::CategoryDraft,
            ) -> $crate::error::StoreResult<::labstock_inventory::Category> {
                let row: $crate::store::rows::CategoryRow =
                    ::sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
                        .bind(draft.name())
                        .fetch_one(&self.pool)
                        .await
                        .map_err($crate::error::map_name_conflict(
                            "insert_category",
                            "category",
                            draft.name(),
                        ))?;
                Ok(row.into())
            }

            async fn update_category(
                &self,
                id: ::labstock_core::CategoryId,
                draft: &::labstock_inventory::CategoryDraft,
            ) -> $crate::error::StoreResult<::labstock_inventory::Category> {
                let row: Option<$crate::store::rows::CategoryRow> = ::sqlx::query_as(
                    "UPDATE categories SET name = $1 WHERE id = $2 RETURNING id, name",
                )
                .bind(draft.name())
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err($crate::error::map_name_conflict(
                    "update_category",
                    "category",
                    draft.name(),
                ))?;
                row.map(::labstock_inventory::Category::from)
                    .ok_or_else(|| ::labstock_core::DomainError::not_found("category").into())
            }

            #[::tracing::instrument(skip(self), fields(backend = self.backend()), err)]
            async fn delete_category(
                &self,
                id: ::labstock_core::CategoryId,
            ) -> $crate::error::StoreResult<()> {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("begin_transaction", e))?;
                let result = delete_category_guarded(&mut tx, id).await;
                $crate::store::finish(tx, "delete_category", result).await
            }

            async fn list_locations(
                &self,
            ) -> $crate::error::StoreResult<Vec<::labstock_inventory::Location>> {
                let rows: Vec<$crate::store::rows::LocationRow> =
                    ::sqlx::query_as("SELECT id, name FROM locations ORDER BY name ASC")
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| $crate::error::map_sqlx_error("list_locations", e))?;
                Ok(rows.into_iter().map(::labstock_inventory::Location::from).collect())
            }

            async fn create_location(
                &self,
                draft: &::labstock_inventory::LocationDraft,
            ) -> $crate::error::StoreResult<::labstock_inventory::Location> {
                let row: $crate::store::rows::LocationRow =
                    ::sqlx::query_as("INSERT INTO locations (name) VALUES ($1) RETURNING id, name")
                        .bind(draft.name())
                        .fetch_one(&self.pool)
                        .await
                        .map_err($crate::error::map_name_conflict(
                            "insert_location",
                            "location",
                            draft.name(),
                        ))?;
                Ok(row.into())
            }

            async fn update_location(
                &self,
                id: ::labstock_core::LocationId,
                draft: &::labstock_inventory::LocationDraft,
            ) -> $crate::error::StoreResult<::labstock_inventory::Location> {
                let row: Option<$crate::store::rows::LocationRow> = ::sqlx::query_as(
                    "UPDATE locations SET name = $1 WHERE id = $2 RETURNING id, name",
                )
                .bind(draft.name())
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err($crate::error::map_name_conflict(
                    "update_location",
                    "location",
                    draft.name(),
                ))?;
                row.map(::labstock_inventory::Location::from)
                    .ok_or_else(|| ::labstock_core::DomainError::not_found("location").into())
            }

            #[::tracing::instrument(skip(self), fields(backend = self.backend()), err)]
            async fn delete_location(
                &self,
                id: ::labstock_core::LocationId,
            ) -> $crate::error::StoreResult<()> {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("begin_transaction", e))?;
                let result = delete_location_guarded(&mut tx, id).await;
                $crate::store::finish(tx, "delete_location", result).await
            }

            async fn list_materials(
                &self,
                filter: &::labstock_inventory::MaterialFilter,
            ) -> $crate::error::StoreResult<Vec<::labstock_inventory::MaterialListing>> {
                let filter = filter.clone().normalized();
                let mut qb = $crate::store::material_listing_query::<$db>(&filter, $like);
                let rows: Vec<$crate::store::rows::MaterialRow> = qb
                    .build_query_as()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("list_materials", e))?;
                Ok(rows
                    .into_iter()
                    .map(::labstock_inventory::MaterialListing::from)
                    .collect())
            }

            async fn get_material(
                &self,
                id: ::labstock_core::MaterialId,
            ) -> $crate::error::StoreResult<::labstock_inventory::MaterialListing> {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("acquire_connection", e))?;
                fetch_listing(&mut conn, id).await
            }

            #[::tracing::instrument(
                skip(self, new),
                fields(backend = self.backend(), name = new.draft().name()),
                err
            )]
            async fn create_material(
                &self,
                new: &::labstock_inventory::NewMaterial,
            ) -> $crate::error::StoreResult<::labstock_inventory::MaterialListing> {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("begin_transaction", e))?;
                let result = match insert_material(&mut tx, new).await {
                    Ok(id) => fetch_listing(&mut tx, id).await,
                    Err(e) => Err(e),
                };
                $crate::store::finish(tx, "create_material", result).await
            }

            async fn update_material(
                &self,
                id: ::labstock_core::MaterialId,
                draft: &::labstock_inventory::MaterialDraft,
            ) -> $crate::error::StoreResult<::labstock_inventory::MaterialListing> {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("begin_transaction", e))?;
                let result = match update_material_row(&mut tx, id, draft).await {
                    Ok(()) => fetch_listing(&mut tx, id).await,
                    Err(e) => Err(e),
                };
                $crate::store::finish(tx, "update_material", result).await
            }

            #[::tracing::instrument(skip(self), fields(backend = self.backend()), err)]
            async fn delete_material(
                &self,
                id: ::labstock_core::MaterialId,
            ) -> $crate::error::StoreResult<::labstock_inventory::Material> {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("begin_transaction", e))?;
                let result = delete_material_cascade(&mut tx, id).await;
                $crate::store::finish(tx, "delete_material", result).await
            }

            async fn image_references(&self, image: &str) -> $crate::error::StoreResult<i64> {
                ::sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE image = $1")
                    .bind(image)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("count_image_references", e))
            }

            #[::tracing::instrument(
                skip(self, cmd),
                fields(
                    backend = self.backend(),
                    material_id = %cmd.material_id(),
                    kind = %cmd.kind(),
                    quantity = cmd.quantity()
                ),
                err
            )]
            async fn record_transaction(
                &self,
                cmd: &::labstock_inventory::RecordTransaction,
            ) -> $crate::error::StoreResult<::labstock_inventory::Transaction> {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("begin_transaction", e))?;
                let result = apply_ledger(&mut tx, self.policy, cmd).await;
                $crate::store::finish(tx, "record_transaction", result).await
            }

            async fn list_transactions(
                &self,
                filter: &::labstock_inventory::TransactionFilter,
            ) -> $crate::error::StoreResult<Vec<::labstock_inventory::TransactionListing>> {
                let mut qb = $crate::store::transaction_listing_query::<$db>(filter);
                let rows: Vec<$crate::store::rows::TransactionRow> = qb
                    .build_query_as()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| $crate::error::map_sqlx_error("list_transactions", e))?;
                $crate::store::rows::into_listings(rows)
            }

            async fn stats(
                &self,
                recent_limit: u32,
            ) -> $crate::error::StoreResult<::labstock_inventory::InventoryStats> {
                let (total_materials, low_stock): (i64, i64) = ::sqlx::query_as(
                    r#"
                    SELECT
                        COUNT(*),
                        COUNT(CASE WHEN stock <= min_stock THEN 1 END)
                    FROM materials
                    "#,
                )
                .fetch_one(&self.pool)
                .await
                .map_err(|e| $crate::error::map_sqlx_error("count_materials", e))?;

                let recent_transactions = self
                    .list_transactions(
                        &::labstock_inventory::TransactionFilter::default()
                            .with_limit(Some(recent_limit)),
                    )
                    .await?;

                Ok(::labstock_inventory::InventoryStats {
                    total_materials,
                    low_stock,
                    recent_transactions,
                })
            }
        }
    };
}
