//! Persistence boundary for KEV records

use crate::error::Result;
use crate::record::KevRecord;

/// CRUD access to the local KEV collection, keyed by record id.
///
/// The reconciliation engine is the only writer.
pub trait KevStore: Send + Sync {
    /// Every record currently stored
    fn find_all(&self) -> Result<Vec<KevRecord>>;

    /// Look up a single record
    fn get(&self, id: &str) -> Result<Option<KevRecord>>;

    /// Insert or overwrite a record
    fn save(&self, record: &KevRecord) -> Result<()>;

    /// Remove a record; removing a missing record is not an error
    fn delete(&self, record: &KevRecord) -> Result<()>;

    /// Number of stored records
    fn count(&self) -> Result<u64>;
}

impl<S: KevStore + ?Sized> KevStore for std::sync::Arc<S> {
    fn find_all(&self) -> Result<Vec<KevRecord>> {
        (**self).find_all()
    }

    fn get(&self, id: &str) -> Result<Option<KevRecord>> {
        (**self).get(id)
    }

    fn save(&self, record: &KevRecord) -> Result<()> {
        (**self).save(record)
    }

    fn delete(&self, record: &KevRecord) -> Result<()> {
        (**self).delete(record)
    }

    fn count(&self) -> Result<u64> {
        (**self).count()
    }
}
