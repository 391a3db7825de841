//! In-memory store for KEV records

use kevsync_core::{Error, KevRecord, KevStore, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    /// Records in insertion order
    order: Vec<String>,
    records: HashMap<String, bool>,
    /// Ids whose writes are rejected
    failing: HashSet<String>,
    writes: usize,
}

/// KEV collection held in process memory.
///
/// Keeps insertion order so `find_all` is deterministic, and can be told to
/// reject writes for particular ids to exercise partial-failure handling.
#[derive(Default)]
pub struct MemoryKevStore {
    inner: Mutex<Inner>,
}

impl MemoryKevStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = KevRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            for record in records {
                insert(&mut inner, record);
            }
        }
        store
    }

    /// Make every subsequent save/delete of `id` fail
    pub fn fail_writes_for(&self, id: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.insert(id.into());
        }
    }

    /// Number of successful save/delete calls so far
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }

    /// Stored ids in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.order.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Database(String::from("memory store lock poisoned")))
    }
}

fn insert(inner: &mut Inner, record: KevRecord) {
    if inner.records.insert(record.id.clone(), record.known_ransomware).is_none() {
        inner.order.push(record.id);
    }
}

impl KevStore for MemoryKevStore {
    fn find_all(&self) -> Result<Vec<KevRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).map(|flag| KevRecord::new(id.clone(), *flag)))
            .collect())
    }

    fn get(&self, id: &str) -> Result<Option<KevRecord>> {
        let inner = self.lock()?;
        Ok(inner.records.get(id).map(|flag| KevRecord::new(id, *flag)))
    }

    fn save(&self, record: &KevRecord) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.failing.contains(&record.id) {
            return Err(Error::Database(format!("write rejected for {}", record.id)));
        }
        insert(&mut inner, record.clone());
        inner.writes += 1;
        Ok(())
    }

    fn delete(&self, record: &KevRecord) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.failing.contains(&record.id) {
            return Err(Error::Database(format!("write rejected for {}", record.id)));
        }
        if inner.records.remove(&record.id).is_some() {
            inner.order.retain(|id| id != &record.id);
        }
        inner.writes += 1;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.lock()?.records.len() as u64)
    }
}
