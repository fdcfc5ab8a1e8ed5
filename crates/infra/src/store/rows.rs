//! Row shapes shared by the SQL backends.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use labstock_core::{CategoryId, LocationId, MaterialId, TransactionId};
use labstock_inventory::{
    Category, Location, Material, MaterialListing, Transaction, TransactionKind,
    TransactionListing,
};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, FromRow)]
pub(crate) struct CategoryRow {
    id: i64,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::new(row.id),
            name: row.name,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct LocationRow {
    id: i64,
    name: String,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: LocationId::new(row.id),
            name: row.name,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MaterialRow {
    id: i64,
    name: String,
    category_id: Option<i64>,
    unit: String,
    stock: i64,
    min_stock: i64,
    location: Option<String>,
    image: Option<String>,
    /// Only present on joined selects.
    #[sqlx(default)]
    category_name: Option<String>,
}

impl From<MaterialRow> for MaterialListing {
    fn from(row: MaterialRow) -> Self {
        MaterialListing {
            material: Material {
                id: MaterialId::new(row.id),
                name: row.name,
                category_id: row.category_id.map(CategoryId::new),
                unit: row.unit,
                stock: row.stock,
                min_stock: row.min_stock,
                location: row.location,
                image: row.image,
            },
            category_name: row.category_name,
        }
    }
}

impl From<MaterialRow> for Material {
    fn from(row: MaterialRow) -> Self {
        MaterialListing::from(row).material
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TransactionRow {
    id: i64,
    material_id: i64,
    #[sqlx(rename = "type")]
    kind: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    notes: Option<String>,
    material_name: String,
}

impl TryFrom<TransactionRow> for TransactionListing {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> StoreResult<Self> {
        let kind: TransactionKind = row.kind.parse().map_err(|_| {
            StoreError::database(
                "decode_transaction",
                format!("unknown transaction type '{}' in row {}", row.kind, row.id),
            )
        })?;
        Ok(TransactionListing {
            transaction: Transaction {
                id: TransactionId::new(row.id),
                material_id: MaterialId::new(row.material_id),
                kind,
                quantity: row.quantity,
                created_at: row.created_at,
                notes: row.notes,
            },
            material_name: row.material_name,
        })
    }
}

pub(crate) fn into_listings(rows: Vec<TransactionRow>) -> StoreResult<Vec<TransactionListing>> {
    rows.into_iter().map(TransactionListing::try_from).collect()
}
