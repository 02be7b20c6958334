//! Key-value store abstraction

use crate::Result;

/// Synchronous key-value persistence scoped to one origin.
///
/// Every browsing context of the origin talks to the same underlying
/// storage. There is no atomicity across keys: two `set` calls are two
/// independent writes and another context may observe the first without
/// the second.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
