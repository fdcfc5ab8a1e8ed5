//! Inventory domain module.
//!
//! This crate contains the business rules for materials, categories,
//! locations and stock transactions, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod location;
pub mod material;
pub mod stats;
pub mod transaction;

mod text;

pub use category::{Category, CategoryDraft};
pub use location::{Location, LocationDraft};
pub use material::{Material, MaterialDraft, MaterialFilter, MaterialListing, NewMaterial};
pub use stats::InventoryStats;
pub use transaction::{
    ledger_balance, RecordTransaction, StockPolicy, Transaction, TransactionFilter,
    TransactionKind, TransactionListing, STOCK_LIMIT,
};
