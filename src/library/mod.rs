//! Library catalog and checkout ledger over an injected store.

pub mod catalog;
pub mod error;
pub mod fixtures;
pub mod ledger;
pub mod memory_store;
pub mod model;
pub mod sqlite_store;
pub mod store;
pub mod validate;

pub use error::LibraryError;
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use store::LibraryStore;
