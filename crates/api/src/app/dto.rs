use std::str::FromStr;

use serde::Deserialize;

use labstock_core::{CategoryId, DomainError, DomainResult, MaterialId};
use labstock_inventory::{
    Category, InventoryStats, Location, Material, MaterialDraft, MaterialFilter, MaterialListing,
    NewMaterial, RecordTransaction, Transaction, TransactionFilter, TransactionKind,
    TransactionListing,
};

/// Public path prefix for stored images.
pub const UPLOADS_PREFIX: &str = "/uploads/";

// -------------------------
// Request DTOs
// -------------------------

/// Numeric ids in JSON bodies go through the same validation as path ids.
fn row_id<T: FromStr<Err = DomainError>>(value: i64) -> DomainResult<T> {
    value.to_string().parse()
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MaterialRequest {
    pub name: String,
    pub category_id: Option<i64>,
    pub unit: String,
    /// Initial stock; ignored on update.
    #[serde(alias = "initial_stock")]
    pub stock: i64,
    pub min_stock: i64,
    pub location: Option<String>,
    /// Stored image name, or its `/uploads/<name>` URL.
    pub image: Option<String>,
}

impl MaterialRequest {
    pub fn to_draft(&self) -> DomainResult<MaterialDraft> {
        let category_id = self.category_id.map(row_id::<CategoryId>).transpose()?;
        let image = self
            .image
            .as_deref()
            .map(|i| i.strip_prefix(UPLOADS_PREFIX).unwrap_or(i));
        MaterialDraft::new(&self.name, &self.unit)?
            .with_category(category_id)
            .with_min_stock(self.min_stock)
            .map(|d| d.with_location(self.location.as_deref()).with_image(image))
    }

    pub fn to_new_material(&self) -> DomainResult<NewMaterial> {
        NewMaterial::new(self.to_draft()?, self.stock)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransactionRequest {
    pub material_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub quantity: Option<i64>,
    pub notes: Option<String>,
}

impl TransactionRequest {
    pub fn to_command(&self) -> DomainResult<RecordTransaction> {
        let material_id = self
            .material_id
            .ok_or_else(|| DomainError::validation("material_id is required"))
            .and_then(row_id::<MaterialId>)?;
        let kind: TransactionKind = self
            .kind
            .as_deref()
            .ok_or_else(|| DomainError::validation("type is required"))?
            .parse()?;
        let quantity = self
            .quantity
            .ok_or_else(|| DomainError::validation("quantity is required"))?;
        RecordTransaction::new(material_id, kind, quantity, self.notes.as_deref())
    }
}

/// `GET /materials` query string. Values are parsed by hand so bad input
/// maps to the JSON error shape.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MaterialListQuery {
    pub q: Option<String>,
    pub category_id: Option<String>,
    pub location: Option<String>,
    pub low_stock: Option<String>,
}

impl MaterialListQuery {
    pub fn to_filter(&self) -> DomainResult<MaterialFilter> {
        let category_id = self
            .category_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(str::parse::<CategoryId>)
            .transpose()?;
        let low_stock_only = match self.low_stock.as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(DomainError::validation(format!(
                    "low_stock must be true or false, got '{other}'"
                )));
            }
        };
        Ok(MaterialFilter {
            query: self.q.clone(),
            category_id,
            location: self.location.clone(),
            low_stock_only,
        }
        .normalized())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransactionListQuery {
    pub material_id: Option<String>,
    pub limit: Option<String>,
}

impl TransactionListQuery {
    pub fn to_filter(&self) -> DomainResult<TransactionFilter> {
        let material_id = self
            .material_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(str::parse::<MaterialId>)
            .transpose()?;
        let limit = self
            .limit
            .as_deref()
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .map_err(|_| DomainError::validation(format!("invalid limit '{v}'")))
            })
            .transpose()?;
        Ok(TransactionFilter {
            material_id,
            ..TransactionFilter::default()
        }
        .with_limit(limit))
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn category_to_json(c: Category) -> serde_json::Value {
    serde_json::json!({
        "id": c.id.get(),
        "name": c.name,
    })
}

pub fn location_to_json(l: Location) -> serde_json::Value {
    serde_json::json!({
        "id": l.id.get(),
        "name": l.name,
    })
}

pub fn image_url(name: &str) -> String {
    format!("{UPLOADS_PREFIX}{name}")
}

pub fn material_to_json(m: Material) -> serde_json::Value {
    let low_stock = m.is_low_stock();
    serde_json::json!({
        "id": m.id.get(),
        "name": m.name,
        "category_id": m.category_id.map(|c| c.get()),
        "unit": m.unit,
        "stock": m.stock,
        "min_stock": m.min_stock,
        "location": m.location,
        "image": m.image.as_deref().map(image_url),
        "low_stock": low_stock,
    })
}

pub fn material_listing_to_json(l: MaterialListing) -> serde_json::Value {
    let mut value = material_to_json(l.material);
    value["category_name"] = serde_json::json!(l.category_name);
    value
}

pub fn transaction_to_json(t: Transaction) -> serde_json::Value {
    serde_json::json!({
        "id": t.id.get(),
        "material_id": t.material_id.get(),
        "type": t.kind.as_str(),
        "quantity": t.quantity,
        "created_at": t.created_at.to_rfc3339(),
        "notes": t.notes,
    })
}

pub fn transaction_listing_to_json(l: TransactionListing) -> serde_json::Value {
    let mut value = transaction_to_json(l.transaction);
    value["material_name"] = serde_json::json!(l.material_name);
    value
}

pub fn stats_to_json(s: InventoryStats) -> serde_json::Value {
    serde_json::json!({
        "total_materials": s.total_materials,
        "low_stock": s.low_stock,
        "recent_transactions": s
            .recent_transactions
            .into_iter()
            .map(transaction_listing_to_json)
            .collect::<Vec<_>>(),
    })
}
