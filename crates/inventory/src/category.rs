use serde::{Deserialize, Serialize};

use labstock_core::{CategoryId, DomainResult};

use crate::text;

/// A grouping of materials (e.g. "Electronics", "Fasteners").
///
/// Names are unique across categories; uniqueness is enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Validated input for creating or renaming a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    name: String,
}

impl CategoryDraft {
    pub fn new(name: &str) -> DomainResult<Self> {
        Ok(Self {
            name: text::required("name", name)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
