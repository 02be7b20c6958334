//! Database connection and operations

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::migrations::run_migrations;
use crate::store::KeyValueStore;
use crate::Result;

/// How long a write waits on another context's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL mode so sibling contexts can read while one writes
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })?;

        tracing::trace!(key = %key, "Stored value");
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
            Ok(())
        })?;

        tracing::trace!(key = %key, "Removed value");
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_value(key)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            let count: i32 =
                conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_set_get_remove() {
        let db = Database::open_in_memory().unwrap();

        assert!(db.get("missing").unwrap().is_none());

        db.set("flag", "true").unwrap();
        db.set("flag", "false").unwrap();
        assert_eq!(db.get("flag").unwrap().as_deref(), Some("false"));

        db.remove("flag").unwrap();
        assert!(db.get("flag").unwrap().is_none());

        // Removing twice is fine
        db.remove("flag").unwrap();
    }

    #[test]
    fn test_handles_on_same_file_share_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("origin").join("store.db");

        let first = Database::open(&path).unwrap();
        let second = Database::open(&path).unwrap();

        first.set("mac_board_force_logout", "true").unwrap();
        assert_eq!(
            second.get("mac_board_force_logout").unwrap().as_deref(),
            Some("true")
        );

        second.remove("mac_board_force_logout").unwrap();
        assert!(first.get("mac_board_force_logout").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let db = Database::open(&path).unwrap();
            db.set("key", "value").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get("key").unwrap().as_deref(), Some("value"));
    }
}
