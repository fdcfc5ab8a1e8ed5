use serde::{Deserialize, Serialize};

use labstock_core::{CategoryId, DomainError, DomainResult, MaterialId};

use crate::text;
use crate::transaction::STOCK_LIMIT;

/// A trackable inventory item.
///
/// `stock` is a cached counter: it always equals the sum of the signed
/// quantities of the material's transactions. Only the ledger operation
/// changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub unit: String,
    pub stock: i64,
    pub min_stock: i64,
    pub location: Option<String>,
    pub image: Option<String>,
}

impl Material {
    /// At or below the configured minimum.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// A material joined with the name of its category.
///
/// `category_name` is `None` when the material has no category, or when its
/// `category_id` no longer resolves (left-join semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialListing {
    #[serde(flatten)]
    pub material: Material,
    pub category_name: Option<String>,
}

/// Validated editable fields of a material.
///
/// Used for both create and update. Stock is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialDraft {
    name: String,
    category_id: Option<CategoryId>,
    unit: String,
    min_stock: i64,
    location: Option<String>,
    image: Option<String>,
}

impl MaterialDraft {
    pub fn new(name: &str, unit: &str) -> DomainResult<Self> {
        Ok(Self {
            name: text::required("name", name)?,
            category_id: None,
            unit: text::required("unit", unit)?,
            min_stock: 0,
            location: None,
            image: None,
        })
    }

    pub fn with_category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn with_min_stock(mut self, min_stock: i64) -> DomainResult<Self> {
        if min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }
        if min_stock > STOCK_LIMIT {
            return Err(DomainError::validation(format!(
                "min_stock must not exceed {STOCK_LIMIT}"
            )));
        }
        self.min_stock = min_stock;
        Ok(self)
    }

    pub fn with_location(mut self, location: Option<&str>) -> Self {
        self.location = text::optional(location);
        self
    }

    pub fn with_image(mut self, image: Option<&str>) -> Self {
        self.image = text::optional(image);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// Input for creating a material.
///
/// A positive `initial_stock` is booked as an `IN` transaction in the same
/// store transaction that inserts the material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMaterial {
    draft: MaterialDraft,
    initial_stock: i64,
}

impl NewMaterial {
    pub const INITIAL_STOCK_NOTE: &'static str = "initial stock";

    pub fn new(draft: MaterialDraft, initial_stock: i64) -> DomainResult<Self> {
        if initial_stock < 0 {
            return Err(DomainError::validation("initial_stock cannot be negative"));
        }
        if initial_stock > STOCK_LIMIT {
            return Err(DomainError::validation(format!(
                "initial_stock must not exceed {STOCK_LIMIT}"
            )));
        }
        Ok(Self {
            draft,
            initial_stock,
        })
    }

    pub fn draft(&self) -> &MaterialDraft {
        &self.draft
    }

    pub fn initial_stock(&self) -> i64 {
        self.initial_stock
    }
}

/// Search/filter options for listing materials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialFilter {
    /// Substring of the material name. Case folding is up to the store:
    /// SQLite folds ASCII letters only.
    pub query: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Exact location name.
    pub location: Option<String>,
    pub low_stock_only: bool,
}

impl MaterialFilter {
    /// Drop blank text criteria so they do not filter anything.
    pub fn normalized(self) -> Self {
        Self {
            query: text::optional(self.query.as_deref()),
            location: text::optional(self.location.as_deref()),
            ..self
        }
    }

    /// `LIKE` pattern for the name query, with `\` as the escape character.
    /// Case is kept; the store's operator decides how it folds.
    pub fn like_pattern(&self) -> Option<String> {
        self.query.as_ref().map(|q| {
            let escaped = q
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(stock: i64, min_stock: i64) -> Material {
        Material {
            id: MaterialId::new(1),
            name: "M3 screw".to_string(),
            category_id: None,
            unit: "pcs".to_string(),
            stock,
            min_stock,
            location: None,
            image: None,
        }
    }

    #[test]
    fn low_stock_is_inclusive_of_threshold() {
        assert!(material(5, 5).is_low_stock());
        assert!(material(-1, 0).is_low_stock());
        assert!(!material(7, 5).is_low_stock());
    }

    #[test]
    fn draft_requires_name_and_unit() {
        assert!(matches!(MaterialDraft::new("", "pcs"), Err(DomainError::Validation(_))));
        assert!(matches!(MaterialDraft::new("Ethanol", "  "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn draft_normalizes_optional_fields() {
        let draft = MaterialDraft::new(" Ethanol ", " L ")
            .unwrap()
            .with_location(Some("  "))
            .with_image(Some(" 1700000000000-ab12.png "));
        assert_eq!(draft.name(), "Ethanol");
        assert_eq!(draft.unit(), "L");
        assert_eq!(draft.location(), None);
        assert_eq!(draft.image(), Some("1700000000000-ab12.png"));
    }

    #[test]
    fn negative_thresholds_and_initial_stock_are_rejected() {
        let draft = MaterialDraft::new("Ethanol", "L").unwrap();
        assert!(draft.clone().with_min_stock(-1).is_err());
        assert!(NewMaterial::new(draft, -5).is_err());
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        let draft = MaterialDraft::new("Ethanol", "L").unwrap();
        assert!(draft.clone().with_min_stock(STOCK_LIMIT).is_ok());
        assert!(matches!(
            draft.clone().with_min_stock(i64::MAX),
            Err(DomainError::Validation(_))
        ));
        assert!(NewMaterial::new(draft.clone(), STOCK_LIMIT).is_ok());
        assert!(matches!(
            NewMaterial::new(draft, i64::MAX),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        let filter = MaterialFilter {
            query: Some(" 100%_Cotton ".to_string()),
            ..MaterialFilter::default()
        }
        .normalized();
        assert_eq!(filter.like_pattern().unwrap(), "%100\\%\\_Cotton%");
    }

    #[test]
    fn listing_serializes_flat() {
        let listing = MaterialListing {
            material: material(3, 1),
            category_name: Some("Fasteners".to_string()),
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["name"], "M3 screw");
        assert_eq!(json["category_name"], "Fasteners");
    }
}
