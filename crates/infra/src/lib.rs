//! Infrastructure layer: relational stores and the image blob store.

pub mod blob;
pub mod error;
pub mod store;

pub use blob::ImageStore;
pub use error::{StoreError, StoreResult};
pub use store::{connect, InventoryStore, SqliteInventoryStore};

#[cfg(feature = "postgres")]
pub use store::PostgresInventoryStore;
