use serde::{Deserialize, Serialize};

use crate::transaction::TransactionListing;

/// Dashboard aggregate: counts plus the newest transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_materials: i64,
    /// Materials with `stock <= min_stock`.
    pub low_stock: i64,
    /// Newest first.
    pub recent_transactions: Vec<TransactionListing>,
}
