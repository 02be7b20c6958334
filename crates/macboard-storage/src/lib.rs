//! Mac Board Storage Layer
//!
//! Synchronous key-value persistence shared by every browsing context of one
//! origin. The SQLite file is the shared medium: each context opens its own
//! handle and sees the others' writes. Writes are last-writer-wins.

mod database;
mod error;
mod memory;
mod migrations;
mod store;

pub use database::Database;
pub use error::StorageError;
pub use memory::MemoryStore;
pub use store::KeyValueStore;

pub type Result<T> = std::result::Result<T, StorageError>;
