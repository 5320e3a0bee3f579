use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Durable, deduplicated id sets for tracked and favorite coins.
///
/// Two record kinds live in one SQLite database, each with a uniqueness
/// constraint on the coin identifier. Every mutation is its own scoped
/// transaction; a failed commit leaves the persisted set unchanged.
pub struct CoinStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracked_coins (id TEXT PRIMARY KEY);
CREATE TABLE IF NOT EXISTS favorite_coins (id TEXT PRIMARY KEY);
";

impl CoinStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!(
                    "failed to create data directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Resolve the default database path based on XDG conventions.
    pub fn default_path() -> Option<PathBuf> {
        let root = if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME")
            && !xdg_data_home.trim().is_empty()
        {
            PathBuf::from(xdg_data_home)
        } else {
            let home = std::env::var("HOME").ok()?;
            PathBuf::from(home).join(".local").join("share")
        };

        Some(root.join("cointrack").join("coins.db"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Persistence("store lock poisoned".into()))
    }

    fn add_id(&self, table: &str, id: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!("INSERT OR IGNORE INTO {} (id) VALUES (?1)", table),
            [id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_id(&self, table: &str, id: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
        tx.commit()?;
        Ok(())
    }

    fn list_ids(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT id FROM {} ORDER BY rowid", table))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn contains_id(&self, table: &str, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table),
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Add an id to the tracked set. No-op when already present.
    pub fn add_tracked(&self, id: &str) -> Result<()> {
        self.add_id("tracked_coins", id)
    }

    pub fn remove_tracked(&self, id: &str) -> Result<()> {
        self.remove_id("tracked_coins", id)
    }

    /// Snapshot of the tracked id set, in insertion order.
    pub fn tracked_ids(&self) -> Result<Vec<String>> {
        self.list_ids("tracked_coins")
    }

    /// Add an id to the favorite set. No-op when already present.
    pub fn add_favorite(&self, id: &str) -> Result<()> {
        self.add_id("favorite_coins", id)
    }

    pub fn remove_favorite(&self, id: &str) -> Result<()> {
        self.remove_id("favorite_coins", id)
    }

    /// Snapshot of the favorite id set, in insertion order.
    pub fn favorite_ids(&self) -> Result<Vec<String>> {
        self.list_ids("favorite_coins")
    }

    pub fn contains_favorite(&self, id: &str) -> Result<bool> {
        self.contains_id("favorite_coins", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_set_deduplicates_ids() {
        let store = CoinStore::open_in_memory().unwrap();

        store.add_tracked("bitcoin").unwrap();
        store.add_tracked("bitcoin").unwrap();
        store.add_tracked("ethereum").unwrap();

        assert_eq!(store.tracked_ids().unwrap(), vec!["bitcoin", "ethereum"]);
    }

    #[test]
    fn add_then_remove_restores_empty_set() {
        let store = CoinStore::open_in_memory().unwrap();

        store.add_tracked("cardano").unwrap();
        store.remove_tracked("cardano").unwrap();

        assert!(store.tracked_ids().unwrap().is_empty());
    }

    #[test]
    fn tracked_and_favorite_sets_are_independent() {
        let store = CoinStore::open_in_memory().unwrap();

        store.add_tracked("bitcoin").unwrap();
        store.add_favorite("ethereum").unwrap();

        assert_eq!(store.tracked_ids().unwrap(), vec!["bitcoin"]);
        assert_eq!(store.favorite_ids().unwrap(), vec!["ethereum"]);
        assert!(store.contains_favorite("ethereum").unwrap());
        assert!(!store.contains_favorite("bitcoin").unwrap());
    }

    #[test]
    fn removing_missing_id_is_a_no_op() {
        let store = CoinStore::open_in_memory().unwrap();
        store.remove_favorite("not-there").unwrap();
        assert!(store.favorite_ids().unwrap().is_empty());
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coins.db");

        {
            let store = CoinStore::open(&path).unwrap();
            store.add_tracked("solana").unwrap();
            store.add_favorite("solana").unwrap();
        }

        let store = CoinStore::open(&path).unwrap();
        assert_eq!(store.tracked_ids().unwrap(), vec!["solana"]);
        assert_eq!(store.favorite_ids().unwrap(), vec!["solana"]);
    }
}
