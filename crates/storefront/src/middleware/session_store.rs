//! Bounded in-memory session store.
//!
//! Records live in a `moka` cache. Each entry is dropped at its session's
//! expiry date, and the least used entries are evicted once the cache is full.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::{SessionStore, session_store};

/// Session store that never outgrows `max_capacity` records.
#[derive(Debug, Clone)]
pub struct MokaSessionStore {
    cache: Cache<Id, Record>,
}

impl MokaSessionStore {
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(RecordExpiry)
                .build(),
        }
    }
}

/// Expires each cache entry at its record's `expiry_date`.
struct RecordExpiry;

impl RecordExpiry {
    fn remaining(record: &Record) -> Duration {
        let left = record.expiry_date - OffsetDateTime::now_utc();
        Duration::try_from(left).unwrap_or(Duration::ZERO)
    }
}

impl Expiry<Id, Record> for RecordExpiry {
    fn expire_after_create(&self, _id: &Id, record: &Record, _at: Instant) -> Option<Duration> {
        Some(Self::remaining(record))
    }

    fn expire_after_update(
        &self,
        _id: &Id,
        record: &Record,
        _at: Instant,
        _current: Option<Duration>,
    ) -> Option<Duration> {
        Some(Self::remaining(record))
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.cache.contains_key(&record.id) {
            record.id = Id::default();
        }
        self.cache.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.cache.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        Ok(self
            .cache
            .get(session_id)
            .await
            .filter(|record| record.expiry_date > OffsetDateTime::now_utc()))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.cache.invalidate(session_id).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use tower_sessions::cookie::time;

    use super::*;

    fn record(expires_in: time::Duration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::new(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MokaSessionStore::new(10);
        let mut rec = record(time::Duration::minutes(30));
        store.create(&mut rec).await.unwrap();

        assert_eq!(store.load(&rec.id).await.unwrap(), Some(rec.clone()));
        store.delete(&rec.id).await.unwrap();
        assert_eq!(store.load(&rec.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_record_is_not_loaded() {
        let store = MokaSessionStore::new(10);
        let rec = record(time::Duration::seconds(-1));
        store.save(&rec).await.unwrap();

        assert_eq!(store.load(&rec.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capacity_bounds_stored_sessions() {
        let store = MokaSessionStore::new(5);
        for _ in 0..50 {
            let mut rec = record(time::Duration::days(30));
            store.create(&mut rec).await.unwrap();
        }
        store.cache.run_pending_tasks().await;

        assert!(store.cache.entry_count() <= 5);
    }

    #[test]
    fn test_remaining_is_zero_for_past_expiry() {
        let rec = record(time::Duration::minutes(-5));
        assert_eq!(RecordExpiry::remaining(&rec), Duration::ZERO);
        let rec = record(time::Duration::minutes(5));
        assert!(RecordExpiry::remaining(&rec) > Duration::from_secs(4 * 60));
    }
}
