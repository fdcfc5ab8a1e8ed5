//! Stock transactions and the ledger arithmetic behind them.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labstock_core::{DomainError, DomainResult, MaterialId, TransactionId};

use crate::text;

/// Largest magnitude a quantity or a stock level may reach. Keeps every
/// `stock + quantity` well inside `i64`.
pub const STOCK_LIMIT: i64 = 1_000_000_000_000_000;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    In,
    Out,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::In => "IN",
            TransactionKind::Out => "OUT",
        }
    }

    /// Signed stock adjustment for a positive quantity.
    pub fn signed(self, quantity: i64) -> i64 {
        match self {
            TransactionKind::In => quantity,
            TransactionKind::Out => -quantity,
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(TransactionKind::In),
            "OUT" => Ok(TransactionKind::Out),
            other => Err(DomainError::validation(format!(
                "type must be one of: IN, OUT (got '{other}')"
            ))),
        }
    }
}

/// An append-only record of stock entering or leaving inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub material_id: MaterialId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Transaction {
    pub fn adjustment(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}

/// A transaction joined with its material's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionListing {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub material_name: String,
}

/// Sum of signed quantities: what a material's stock must equal.
pub fn ledger_balance<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> i64 {
    transactions.into_iter().map(Transaction::adjustment).sum()
}

/// Command: record a stock movement for one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTransaction {
    material_id: MaterialId,
    kind: TransactionKind,
    quantity: i64,
    notes: Option<String>,
}

impl RecordTransaction {
    pub fn new(
        material_id: MaterialId,
        kind: TransactionKind,
        quantity: i64,
        notes: Option<&str>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be a positive integer"));
        }
        if quantity > STOCK_LIMIT {
            return Err(DomainError::validation(format!(
                "quantity must not exceed {STOCK_LIMIT}"
            )));
        }
        Ok(Self {
            material_id,
            kind,
            quantity,
            notes: text::optional(notes),
        })
    }

    pub fn material_id(&self) -> MaterialId {
        self.material_id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Signed change applied to the material's stock.
    pub fn adjustment(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}

/// What happens when an `OUT` would take stock below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Negative stock is recorded as-is.
    #[default]
    AllowNegative,
    /// Overdrawing transactions are refused.
    RejectNegative,
}

impl StockPolicy {
    /// Validate a stock change, given the stock *after* the adjustment.
    ///
    /// Increases are accepted so that a material that is already negative
    /// can be brought back up. Under either policy the result must stay
    /// within `STOCK_LIMIT`.
    pub fn check(self, adjustment: i64, new_stock: i64) -> DomainResult<()> {
        if !(-STOCK_LIMIT..=STOCK_LIMIT).contains(&new_stock) {
            return Err(DomainError::invariant(format!(
                "stock would reach {new_stock}, beyond the limit of {STOCK_LIMIT}"
            )));
        }
        match self {
            StockPolicy::AllowNegative => Ok(()),
            StockPolicy::RejectNegative if adjustment < 0 && new_stock < 0 => {
                Err(DomainError::invariant(format!(
                    "insufficient stock: only {} available",
                    new_stock - adjustment
                )))
            }
            StockPolicy::RejectNegative => Ok(()),
        }
    }
}

/// Listing options for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionFilter {
    pub material_id: Option<MaterialId>,
    pub limit: u32,
}

impl TransactionFilter {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn for_material(material_id: MaterialId) -> Self {
        Self {
            material_id: Some(material_id),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        self
    }
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            material_id: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: TransactionKind, quantity: i64) -> Transaction {
        Transaction {
            id: TransactionId::new(1),
            material_id: MaterialId::new(1),
            kind,
            quantity,
            created_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("in".parse::<TransactionKind>().unwrap(), TransactionKind::In);
        assert_eq!(" OUT ".parse::<TransactionKind>().unwrap(), TransactionKind::Out);
        assert!(matches!(
            "MOVE".parse::<TransactionKind>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn kind_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&TransactionKind::Out).unwrap(), "\"OUT\"");
    }

    #[test]
    fn record_rejects_non_positive_quantity() {
        let id = MaterialId::new(1);
        assert!(RecordTransaction::new(id, TransactionKind::In, 0, None).is_err());
        assert!(RecordTransaction::new(id, TransactionKind::Out, -4, None).is_err());
        assert!(RecordTransaction::new(id, TransactionKind::In, STOCK_LIMIT, None).is_ok());
        assert!(matches!(
            RecordTransaction::new(id, TransactionKind::In, i64::MAX, None),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn out_adjustment_is_negative() {
        let cmd =
            RecordTransaction::new(MaterialId::new(9), TransactionKind::Out, 3, Some(" issued "))
                .unwrap();
        assert_eq!(cmd.adjustment(), -3);
        assert_eq!(cmd.notes(), Some("issued"));
    }

    #[test]
    fn reject_policy_refuses_overdraw_only() {
        let policy = StockPolicy::RejectNegative;
        assert!(policy.check(-3, 7).is_ok());
        assert!(policy.check(-5, 0).is_ok());
        let err = policy.check(-5, -2).unwrap_err();
        assert_eq!(
            err,
            DomainError::invariant("insufficient stock: only 3 available")
        );
        // Restocking a negative material is fine.
        assert!(policy.check(2, -1).is_ok());
    }

    #[test]
    fn allow_policy_accepts_negative_stock() {
        assert!(StockPolicy::AllowNegative.check(-10, -10).is_ok());
    }

    #[test]
    fn both_policies_refuse_stock_beyond_limit() {
        for policy in [StockPolicy::AllowNegative, StockPolicy::RejectNegative] {
            assert!(policy.check(1, STOCK_LIMIT).is_ok());
            assert!(matches!(
                policy.check(1, STOCK_LIMIT + 1),
                Err(DomainError::InvariantViolation(_))
            ));
        }
        assert!(matches!(
            StockPolicy::AllowNegative.check(-1, -STOCK_LIMIT - 1),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn filter_limit_is_clamped() {
        assert_eq!(TransactionFilter::default().with_limit(None).limit, 100);
        assert_eq!(TransactionFilter::default().with_limit(Some(0)).limit, 1);
        assert_eq!(TransactionFilter::default().with_limit(Some(50_000)).limit, 1000);
    }

    #[test]
    fn ledger_balance_matches_worked_example() {
        let history = [
            tx(TransactionKind::In, 10),
            tx(TransactionKind::Out, 3),
            tx(TransactionKind::Out, 5),
        ];
        assert_eq!(ledger_balance(&history), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn kind() -> impl Strategy<Value = TransactionKind> {
            prop_oneof![Just(TransactionKind::In), Just(TransactionKind::Out)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: applying adjustments one by one equals the ledger balance.
            #[test]
            fn running_stock_equals_ledger_balance(
                moves in prop::collection::vec((kind(), 1i64..10_000), 0..64)
            ) {
                let mut stock = 0i64;
                let mut history = Vec::new();
                for (kind, qty) in moves {
                    let cmd = RecordTransaction::new(MaterialId::new(1), kind, qty, None).unwrap();
                    stock += cmd.adjustment();
                    StockPolicy::AllowNegative.check(cmd.adjustment(), stock).unwrap();
                    history.push(tx(kind, qty));
                    prop_assert_eq!(stock, ledger_balance(&history));
                }
            }

            /// Property: under the reject policy stock never observes a negative value.
            #[test]
            fn reject_policy_keeps_stock_non_negative(
                moves in prop::collection::vec((kind(), 1i64..100), 0..64)
            ) {
                let mut stock = 0i64;
                for (kind, qty) in moves {
                    let adjustment = kind.signed(qty);
                    let next = stock + adjustment;
                    if StockPolicy::RejectNegative.check(adjustment, next).is_ok() {
                        stock = next;
                    }
                    prop_assert!(stock >= 0);
                }
            }
        }
    }
}
