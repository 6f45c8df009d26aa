use crate::StoreError;
use std::sync::RwLock;

/// Key-value storage backend for the stores.
///
/// Implementations must be safe to share across request tasks. Keys are
/// namespaced by the calling store (`tender/`, `profile/`, `tvec/`, ...), so
/// one backend instance can serve several stores.
pub trait StoreBackend: Send + Sync {
    /// Insert or update a key-value pair.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Retrieve a value by key.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Delete a key-value pair.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Insert or update multiple pairs in a batch.
    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError>;
    /// Scan all entries under a key prefix, calling the visitor for each one.
    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
    /// Flush any buffered writes.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Configuration for selecting and building a backend.
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// In-memory map. The default: the service is rebuilt from the upstream
    /// ingestion feed on restart, so durability is a deployment choice, not a
    /// core requirement.
    #[default]
    InMemory,
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn build(&self) -> Result<Box<dyn StoreBackend>, StoreError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryBackend::new())),
        }
    }
}

/// An in-memory backend using a `RwLock` around a `BTreeMap`. The ordered map
/// keeps prefix scans cheap and deterministic.
pub struct InMemoryBackend {
    records: RwLock<std::collections::BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(std::collections::BTreeMap::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for InMemoryBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .remove(key);
        Ok(())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        for (key, value) in entries {
            guard.insert(key, value);
        }
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        for (key, value) in guard.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            visitor(key, value)?;
        }
        Ok(())
    }
}
