//! SQLite store for KEV records

use chrono::Utc;
use kevsync_core::{Error, KevRecord, KevStore, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// KEV collection backed by SQLite
#[derive(Clone)]
pub struct SqliteKevStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKevStore {
    /// Open or create the KEV database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open KEV database: {}", e)))?;
        debug!("Opened KEV database at {:?}", path);

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            Error::Database(format!("Failed to create in-memory database: {}", e))
        })?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database(String::from("KEV database connection lock poisoned")))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kev_records (
                id TEXT PRIMARY KEY,
                known_ransomware INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::Database(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }
}

impl KevStore for SqliteKevStore {
    fn find_all(&self) -> Result<Vec<KevRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, known_ransomware FROM kev_records ORDER BY rowid")
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(KevRecord {
                    id: row.get(0)?,
                    known_ransomware: row.get(1)?,
                })
            })
            .map_err(|e| Error::Database(format!("Failed to load KEV records: {}", e)))?;

        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(format!("Failed to read KEV record: {}", e)))?;
        Ok(records)
    }

    fn get(&self, id: &str) -> Result<Option<KevRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, known_ransomware FROM kev_records WHERE id = ?1",
            [id],
            |row| {
                Ok(KevRecord {
                    id: row.get(0)?,
                    known_ransomware: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get KEV record {}: {}", id, e)))
    }

    fn save(&self, record: &KevRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO kev_records (id, known_ransomware, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                known_ransomware = excluded.known_ransomware,
                updated_at = excluded.updated_at
            "#,
            params![record.id, record.known_ransomware, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("Failed to save KEV record {}: {}", record.id, e)))?;

        Ok(())
    }

    fn delete(&self, record: &KevRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kev_records WHERE id = ?1", [&record.id])
            .map_err(|e| {
                Error::Database(format!("Failed to delete KEV record {}: {}", record.id, e))
            })?;

        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kev_records", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("Failed to count KEV records: {}", e)))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_db() {
        let store = SqliteKevStore::in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.find_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_get() {
        let store = SqliteKevStore::in_memory().unwrap();
        store.save(&KevRecord::new("CVE-2021-44228", true)).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(
            store.get("CVE-2021-44228").unwrap(),
            Some(KevRecord::new("CVE-2021-44228", true))
        );
        assert_eq!(store.get("CVE-9999-9999").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites_in_place() {
        let store = SqliteKevStore::in_memory().unwrap();
        store.save(&KevRecord::new("CVE-A", false)).unwrap();
        store.save(&KevRecord::new("CVE-B", false)).unwrap();
        store.save(&KevRecord::new("CVE-A", true)).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(
            store.find_all().unwrap(),
            vec![KevRecord::new("CVE-A", true), KevRecord::new("CVE-B", false)]
        );
    }

    #[test]
    fn test_delete() {
        let store = SqliteKevStore::in_memory().unwrap();
        let record = KevRecord::new("CVE-A", false);
        store.save(&record).unwrap();
        store.delete(&record).unwrap();
        assert_eq!(store.count().unwrap(), 0);

        // Deleting a missing record is fine
        store.delete(&record).unwrap();
    }

    #[test]
    fn test_open_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kev.db");

        {
            let store = SqliteKevStore::open(&path).unwrap();
            store.save(&KevRecord::new("CVE-A", true)).unwrap();
        }

        let store = SqliteKevStore::open(&path).unwrap();
        assert_eq!(store.get("CVE-A").unwrap(), Some(KevRecord::new("CVE-A", true)));
    }
}
