use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    store::ConfigStore,
    value::ConfigValue,
};

/// In-memory configuration store for tests and ephemeral sessions.
/// Clones share the same document.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<BTreeMap<String, ConfigValue>>>,
    resets: Arc<AtomicU64>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, ConfigValue>>> {
        self.inner.lock().map_err(|err| ConfigError::Persistence {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, name: &str) -> Result<Option<ConfigValue>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, value: ConfigValue) -> Result<()> {
        self.lock()?.insert(name.to_string(), value);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut map = self.lock()?;
        debug!(entries = map.len(), "resetting in-memory store");
        map.clear();
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn entry_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn write_missing(&self, entries: Vec<(String, ConfigValue)>) -> Result<usize> {
        let mut map = self.lock()?;
        let mut written = 0;
        for (name, value) in entries {
            if !map.contains_key(&name) {
                map.insert(name, value);
                written += 1;
            }
        }
        Ok(written)
    }

    fn reset_generation(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }
}
