use serde::{Deserialize, Serialize};

use labstock_core::{DomainResult, LocationId};

use crate::text;

/// A storage location (shelf, drawer, cabinet).
///
/// Materials refer to a location by its *name*, not its id. Renaming a
/// location therefore leaves existing materials pointing at the old name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

/// Validated input for creating or renaming a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationDraft {
    name: String,
}

impl LocationDraft {
    pub fn new(name: &str) -> DomainResult<Self> {
        Ok(Self {
            name: text::required("name", name)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labstock_core::DomainError;

    #[test]
    fn draft_rejects_blank_name() {
        assert!(matches!(LocationDraft::new(""), Err(DomainError::Validation(_))));
    }

    #[test]
    fn draft_keeps_inner_whitespace() {
        let draft = LocationDraft::new(" Cabinet 2 / Drawer B ").unwrap();
        assert_eq!(draft.name(), "Cabinet 2 / Drawer B");
    }
}
