//! Token storage medium.
//!
//! The credential stores never touch a concrete medium directly; they go
//! through the `TokenStorage` trait so the browser-cookie style behaviour
//! (per-key expiry, string values) can be swapped or faked.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use jetty_shared::time::{Clock, SystemClock};

use crate::error::StorageError;

/// Key/value medium holding short string values with an expiry
pub trait TokenStorage: Send + Sync {
    /// Store `value` under `key` for `ttl`
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    /// Read a value; expired values read as `None`
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// Unix timestamp (milliseconds) after which the entry is gone
    expires_at: i64,
}

/// In-memory storage with cookie-like expiry
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStorage {
    /// Create an empty storage driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty storage driven by the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, StorageError> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = self.clock.now_millis().saturating_add(ttl_millis);

        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetty_shared::time::ManualClock;

    fn create_test_storage() -> (MemoryStorage, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let storage = MemoryStorage::with_clock(clock.clone());
        (storage, clock)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        // テスト項目: 保存した値を取得できる
        // given (前提条件):
        let (storage, _clock) = create_test_storage();

        // when (操作):
        storage.set("token", "abc", Duration::from_secs(60)).unwrap();

        // then (期待する結果):
        assert_eq!(storage.get("token").unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_expired_value_reads_as_absent() {
        // テスト項目: 有効期限を過ぎた値は取得できない
        // given (前提条件):
        let (storage, clock) = create_test_storage();
        storage.set("token", "abc", Duration::from_secs(60)).unwrap();

        // when (操作):
        clock.advance(Duration::from_secs(60));

        // then (期待する結果):
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        // テスト項目: 存在しないキーの削除もエラーにならない
        // given (前提条件):
        let (storage, _clock) = create_test_storage();
        storage.set("token", "abc", Duration::from_secs(60)).unwrap();

        // when (操作):
        let first = storage.remove("token");
        let second = storage.remove("token");

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_previous_value() {
        // テスト項目: 同じキーへの保存は値と有効期限を上書きする
        // given (前提条件):
        let (storage, clock) = create_test_storage();
        storage.set("token", "old", Duration::from_secs(10)).unwrap();

        // when (操作):
        storage.set("token", "new", Duration::from_secs(60)).unwrap();
        clock.advance(Duration::from_secs(30));

        // then (期待する結果):
        assert_eq!(storage.get("token").unwrap(), Some("new".to_string()));
    }
}
