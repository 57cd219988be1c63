use std::sync::Mutex;

use fnv::FnvHashMap;
use uuid::Uuid;

use crate::{ErrorKind, Result};

use super::Store;

/// Volatile store keeping everything in a map. Used in dev mode and tests.
#[derive(Debug, Default)]
pub struct MemoryDb {
    inner: Mutex<FnvHashMap<String, FnvHashMap<Uuid, Vec<u8>>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, FnvHashMap<String, FnvHashMap<Uuid, Vec<u8>>>>> {
        self.inner
            .lock()
            .map_err(|e| ErrorKind::DbError(format!("memory db lock poisoned: {}", e)).into())
    }
}

impl Store for MemoryDb {
    fn get_raw(&self, collection: &str, id: Uuid) -> Result<Option<Vec<u8>>> {
        Ok(self
            .lock()?
            .get(collection)
            .and_then(|c| c.get(&id))
            .cloned())
    }

    fn set_raw(&self, collection: &str, id: Uuid, bytes: Vec<u8>) -> Result<()> {
        self.lock()?
            .entry(collection.to_string())
            .or_default()
            .insert(id, bytes);
        Ok(())
    }

    fn remove_raw(&self, collection: &str, id: Uuid) -> Result<()> {
        if let Some(c) = self.lock()?.get_mut(collection) {
            c.remove(&id);
        }
        Ok(())
    }

    fn collection_raw(&self, collection: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .lock()?
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }
}
