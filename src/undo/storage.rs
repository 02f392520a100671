//! Durable local key/value storage used by the undo history.

use std::collections::BTreeMap;

use crate::error::StorageError;

pub trait LocalStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;
}

impl<T: LocalStorage + ?Sized> LocalStorage for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) {
        (**self).remove(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

/// In-memory storage with an optional byte quota over all keys and values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(bytes),
        }
    }

    pub fn set_quota(&mut self, bytes: Option<usize>) {
        self.quota = bytes;
    }

    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let current = self.entries.get(key).map_or(0, |old| key.len() + old.len());
            if self.used_bytes() - current + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

// ── Browser localStorage ───────────────────────────────────────────

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{DomException, Storage};

    use super::LocalStorage;
    use crate::error::StorageError;

    /// `window.localStorage`.
    pub struct BrowserStorage {
        storage: Storage,
    }

    impl BrowserStorage {
        pub fn local() -> Result<Self, StorageError> {
            let window = web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
            let storage = window
                .local_storage()
                .map_err(|e| describe(&e))?
                .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()))?;
            Ok(Self { storage })
        }
    }

    fn is_quota_error(err: &JsValue) -> bool {
        err.dyn_ref::<DomException>().is_some_and(|e| {
            e.name() == "QuotaExceededError" || e.name() == "NS_ERROR_DOM_QUOTA_REACHED" || e.code() == 22
        })
    }

    fn describe(err: &JsValue) -> StorageError {
        if is_quota_error(err) {
            return StorageError::QuotaExceeded;
        }
        let msg = err
            .dyn_ref::<DomException>()
            .map(|e| e.message())
            .or_else(|| err.as_string())
            .unwrap_or_else(|| "unknown storage error".into());
        StorageError::Unavailable(msg)
    }

    impl LocalStorage for BrowserStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.storage.get_item(key).ok().flatten()
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.storage.set_item(key, value).map_err(|e| describe(&e))
        }

        fn remove(&mut self, key: &str) {
            let _ = self.storage.remove_item(key);
        }

        fn keys(&self) -> Vec<String> {
            let len = self.storage.length().unwrap_or(0);
            (0..len)
                .filter_map(|i| self.storage.key(i).ok().flatten())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_basics() {
        let mut s = MemoryStorage::new();
        s.set("a", "1").unwrap();
        s.set("b", "2").unwrap();
        assert_eq!(s.get("a").as_deref(), Some("1"));
        assert_eq!(s.keys(), ["a", "b"]);
        s.remove("a");
        assert!(s.get("a").is_none());
    }

    #[test]
    fn quota_counts_replacement_not_sum() {
        let mut s = MemoryStorage::with_quota(10);
        s.set("k", "12345678").unwrap();
        // replacing the value frees the old bytes first
        s.set("k", "abcdefgh").unwrap();
        assert_eq!(s.set("k", "too long value"), Err(StorageError::QuotaExceeded));
        assert_eq!(s.get("k").as_deref(), Some("abcdefgh"));
    }

    #[test]
    fn boxed_storage_delegates() {
        let mut s: Box<dyn LocalStorage> = Box::new(MemoryStorage::new());
        s.set("x", "y").unwrap();
        assert_eq!(s.get("x").as_deref(), Some("y"));
        assert_eq!(s.keys(), ["x"]);
    }
}
