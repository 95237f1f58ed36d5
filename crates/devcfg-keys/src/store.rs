use std::{borrow::Cow, sync::Arc};

use devcfg_core::{ConfigError, ConfigStore, Result};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::{
    group_key::GroupKey,
    key_id::{KeyId, KeyType},
    names::{key_name, GROUP_KEY_INDEX, LAST_USED_EPOCH_KEY_ID},
};

pub const MAX_EPOCH_KEYS: usize = 4;
pub const MAX_APPLICATION_GROUPS: usize = 8;
/// Epoch keys, application group keys, one root key and the fabric secret.
pub const MAX_GROUP_KEYS: usize = MAX_EPOCH_KEYS + MAX_APPLICATION_GROUPS + 2;

const KEY_ID_SIZE: usize = std::mem::size_of::<u32>();

/// Group key store backed by a [`ConfigStore`].
///
/// The ordered index of key ids is persisted as one binary entry; each key's
/// record lives under its own entry name. Store rolls the index back when the
/// record write fails; anything left inconsistent by a crash is pruned by
/// [`GroupKeyStore::init`].
///
/// Mutating operations take `&mut self`: an instance has a single writer.
/// A reset of the shared store is detected through
/// [`ConfigStore::reset_generation`]; the index is then reloaded from the
/// store before it is used again.
pub struct GroupKeyStore<S: ConfigStore> {
    store: Arc<S>,
    index: Vec<KeyId>,
    generation: u64,
}

impl<S: ConfigStore> GroupKeyStore<S> {
    /// Load the index, prune ids whose record is missing and persist the result.
    #[instrument(skip_all)]
    pub fn init(store: Arc<S>) -> Result<Self> {
        let generation = store.reset_generation();
        let index = load_repaired_index(&*store)?;
        let keys = Self {
            store,
            index,
            generation,
        };
        keys.persist_index()?;
        debug!(keys = keys.index.len(), "group key index loaded");
        Ok(keys)
    }

    pub fn config_store(&self) -> &Arc<S> {
        &self.store
    }

    /// Persist `key`, adding its id to the index first.
    ///
    /// If the record write fails, an id this call added is taken back out
    /// of the index before the error is returned.
    #[instrument(skip_all, fields(key_id = %key.id))]
    pub fn store_group_key(&mut self, key: &GroupKey) -> Result<()> {
        self.sync()?;
        let added = self.add_to_index(key.id)?;
        if let Err(err) = self.persist_index() {
            if added {
                self.remove_from_index(key.id);
            }
            return Err(err);
        }

        let record = key.to_record();
        let written = self.store.write_bin(&key_name(key.id), &record);
        drop(record);

        if let Err(err) = written {
            if added {
                self.remove_from_index(key.id);
                if let Err(rollback) = self.persist_index() {
                    warn!(error = %rollback, "failed to roll back group key index");
                }
            }
            return Err(err);
        }
        debug!(key_len = key.key_len(), "stored group key");
        Ok(())
    }

    /// Read a key record. Start time is split off for non-fabric-secret keys.
    #[instrument(skip_all, fields(key_id = %id))]
    pub fn retrieve_group_key(&self, id: KeyId) -> Result<GroupKey> {
        let record = Zeroizing::new(self.store.read_bin(&key_name(id))?);
        GroupKey::from_record(id, &record)
    }

    /// Remove the record for `id`, then drop it from the index.
    #[instrument(skip_all, fields(key_id = %id))]
    pub fn delete_group_key(&mut self, id: KeyId) -> Result<()> {
        self.sync()?;
        if !self.index.contains(&id) {
            return Err(ConfigError::KeyNotFound { key_id: id.raw() });
        }
        self.store.clear(&key_name(id))?;
        self.remove_from_index(id);
        self.persist_index()
    }

    /// Delete every key of `key_type` (all keys for [`KeyType::NONE`]) and
    /// return how many were removed.
    ///
    /// The index is persisted once at the end. A failure part way through
    /// returns immediately, leaving the persisted index a superset of the
    /// remaining records.
    #[instrument(skip_all, fields(key_type = %key_type))]
    pub fn delete_group_keys_of_type(&mut self, key_type: KeyType) -> Result<usize> {
        self.sync()?;
        let before = self.index.len();
        let mut i = 0;
        while i < self.index.len() {
            let id = self.index[i];
            if key_type.matches(id) {
                self.store.clear(&key_name(id))?;
                self.index.remove(i);
            } else {
                i += 1;
            }
        }

        let removed = before - self.index.len();
        if removed > 0 {
            self.persist_index()?;
        }
        debug!(removed, "deleted group keys");
        Ok(removed)
    }

    /// Delete every group key and return how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        self.delete_group_keys_of_type(KeyType::NONE)
    }

    /// Copy the ids matching `key_type` into `out` in index order.
    ///
    /// Fails with `BufferTooSmall` as soon as a match does not fit; `out` then
    /// holds the first `out.len()` matches and `needed` is the full count.
    pub fn enumerate_group_keys(&self, key_type: KeyType, out: &mut [KeyId]) -> Result<usize> {
        let index = self.current_index()?;
        let mut count = 0;
        for id in matching(&index, key_type) {
            if count == out.len() {
                return Err(ConfigError::BufferTooSmall {
                    needed: matching(&index, key_type).count(),
                    capacity: out.len(),
                });
            }
            out[count] = id;
            count += 1;
        }
        Ok(count)
    }

    pub fn group_key_ids(&self, key_type: KeyType) -> Result<Vec<KeyId>> {
        Ok(matching(&self.current_index()?, key_type).collect())
    }

    /// Last epoch key used, or [`KeyId::NONE`] if none has been recorded.
    pub fn retrieve_last_used_epoch_key_id(&self) -> Result<KeyId> {
        match self.store.read_u32(LAST_USED_EPOCH_KEY_ID) {
            Ok(raw) => Ok(KeyId::new(raw)),
            Err(err) if err.is_not_found() => Ok(KeyId::NONE),
            Err(err) => Err(err),
        }
    }

    pub fn store_last_used_epoch_key_id(&self, id: KeyId) -> Result<()> {
        self.store.write_u32(LAST_USED_EPOCH_KEY_ID, id.raw())
    }

    fn is_stale(&self) -> bool {
        self.store.reset_generation() != self.generation
    }

    /// Reload the index if the store was reset since it was last read.
    fn sync(&mut self) -> Result<()> {
        if self.is_stale() {
            let generation = self.store.reset_generation();
            self.index = load_repaired_index(&*self.store)?;
            self.generation = generation;
            debug!(keys = self.index.len(), "store was reset; reloaded group key index");
        }
        Ok(())
    }

    /// The index as the store currently sees it, without mutating `self`.
    fn current_index(&self) -> Result<Cow<'_, [KeyId]>> {
        if self.is_stale() {
            Ok(Cow::Owned(load_repaired_index(&*self.store)?))
        } else {
            Ok(Cow::Borrowed(&self.index))
        }
    }

    /// Returns whether `id` was newly added.
    fn add_to_index(&mut self, id: KeyId) -> Result<bool> {
        if self.index.contains(&id) {
            return Ok(false);
        }
        if self.index.len() >= MAX_GROUP_KEYS {
            return Err(ConfigError::TooManyKeys {
                max: MAX_GROUP_KEYS,
            });
        }
        self.index.push(id);
        Ok(true)
    }

    fn remove_from_index(&mut self, id: KeyId) {
        self.index.retain(|existing| *existing != id);
    }

    fn persist_index(&self) -> Result<()> {
        let bytes: Vec<u8> = self
            .index
            .iter()
            .flat_map(|id| id.raw().to_le_bytes())
            .collect();
        self.store.write_bin(GROUP_KEY_INDEX, &bytes)
    }
}

fn matching(index: &[KeyId], key_type: KeyType) -> impl Iterator<Item = KeyId> + '_ {
    index
        .iter()
        .copied()
        .filter(move |id| key_type.matches(*id))
}

/// Load the persisted index, drop duplicates and prune ids whose record is
/// missing. Backend errors abort rather than prune.
fn load_repaired_index<S: ConfigStore + ?Sized>(store: &S) -> Result<Vec<KeyId>> {
    let loaded = load_index(store)?;
    if loaded.len() > MAX_GROUP_KEYS {
        return Err(ConfigError::TooManyKeys {
            max: MAX_GROUP_KEYS,
        });
    }

    let mut index = Vec::with_capacity(MAX_GROUP_KEYS);
    for id in loaded {
        if index.contains(&id) {
            continue;
        }
        if store.contains(&key_name(id))? {
            index.push(id);
        } else {
            warn!(key_id = %id, "pruning index entry without key record");
        }
    }
    Ok(index)
}

fn load_index<S: ConfigStore + ?Sized>(store: &S) -> Result<Vec<KeyId>> {
    let bytes = match store.read_bin(GROUP_KEY_INDEX) {
        Ok(bytes) => bytes,
        Err(err) if err.is_not_found() => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    if bytes.len() % KEY_ID_SIZE != 0 {
        return Err(ConfigError::DataNotAligned { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(KEY_ID_SIZE)
        .map(|chunk| KeyId::new(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        .collect())
}
