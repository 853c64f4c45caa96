use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};

/// A persisted record: a JSON body plus the expiry deadline the store's TTL
/// reaper honors. The engine re-checks `expires_at` on every read path and
/// never assumes the reaper has run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredRecord {
    pub body: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Key-value record storage with per-record expiry and one atomic numeric
/// operation.
///
/// All writes except [`RecordStore::increment`] are plain full-record
/// overwrites with last-writer-wins semantics. `increment` is the single
/// operation that must be an atomic add on the stored value, never a
/// read-modify-write in the caller; implementations may return
/// [`StoreError::Conflict`] and expect the caller to retry.
pub trait RecordStore: Send + Sync {
    fn get(&self, table: &str, key: &str) -> Result<Option<StoredRecord>>;

    fn put(&self, table: &str, key: &str, record: StoredRecord) -> Result<()>;

    /// Returns whether a record was actually removed.
    fn delete(&self, table: &str, key: &str) -> Result<bool>;

    /// Atomically adds `delta` to a numeric field of the record body and
    /// returns the new value. Fails with [`StoreError::MissingRecord`] when
    /// the record does not exist.
    fn increment(&self, table: &str, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// All records in a table, in key order. Used for template listings;
    /// session/job tables are only ever read by key.
    fn list(&self, table: &str) -> Result<Vec<StoredRecord>>;
}

type Tables = BTreeMap<String, BTreeMap<String, StoredRecord>>;

/// In-memory record store. Interior locking makes `increment` a true atomic
/// add under concurrent callers.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("record store lock poisoned".to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<StoredRecord>> {
        Ok(self
            .lock()?
            .get(table)
            .and_then(|records| records.get(key))
            .cloned())
    }

    fn put(&self, table: &str, key: &str, record: StoredRecord) -> Result<()> {
        self.lock()?
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    fn delete(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .get_mut(table)
            .is_some_and(|records| records.remove(key).is_some()))
    }

    fn increment(&self, table: &str, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut tables = self.lock()?;
        let record = tables
            .get_mut(table)
            .and_then(|records| records.get_mut(key))
            .ok_or_else(|| StoreError::MissingRecord {
                table: table.to_string(),
                key: key.to_string(),
            })?;

        let current = record
            .body
            .get(field)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let next = current + delta;
        if let Some(object) = record.body.as_object_mut() {
            object.insert(field.to_string(), serde_json::Value::from(next));
        } else {
            return Err(StoreError::Serialization {
                operation: "increment field of",
                table: table.to_string(),
                key: key.to_string(),
                source: serde_json::Error::io(std::io::Error::other(
                    "record body is not an object",
                )),
            });
        }
        Ok(next)
    }

    fn list(&self, table: &str) -> Result<Vec<StoredRecord>> {
        Ok(self
            .lock()?
            .get(table)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trip() {
        let store = MemoryRecordStore::new();
        let record = StoredRecord::new(serde_json::json!({"name": "a"}));

        store.put("sessions", "s1", record.clone()).unwrap();
        assert_eq!(store.get("sessions", "s1").unwrap(), Some(record));
        assert!(store.delete("sessions", "s1").unwrap());
        assert_eq!(store.get("sessions", "s1").unwrap(), None);
        assert!(!store.delete("sessions", "s1").unwrap());
    }

    #[test]
    fn increment_is_an_atomic_add_under_threads() {
        let store = std::sync::Arc::new(MemoryRecordStore::new());
        store
            .put(
                "templates",
                "t1",
                StoredRecord::new(serde_json::json!({"usage_count": 0})),
            )
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    store.increment("templates", "t1", "usage_count", 1).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let record = store.get("templates", "t1").unwrap().unwrap();
        assert_eq!(record.body["usage_count"], 400);
    }

    #[test]
    fn increment_missing_record_fails() {
        let store = MemoryRecordStore::new();
        assert!(matches!(
            store.increment("templates", "nope", "usage_count", 1),
            Err(StoreError::MissingRecord { .. })
        ));
    }

    #[test]
    fn expired_records_are_still_physically_present() {
        let store = MemoryRecordStore::new();
        let past = Utc::now() - chrono::Duration::hours(1);
        let record = StoredRecord::new(serde_json::json!({})).with_expiry(past);
        store.put("sessions", "s1", record).unwrap();

        // The store keeps the bytes; expiry is the reader's predicate.
        let read = store.get("sessions", "s1").unwrap().unwrap();
        assert!(read.is_expired(Utc::now()));
    }
}
