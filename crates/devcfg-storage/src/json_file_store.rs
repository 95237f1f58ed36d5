use std::{
    collections::{BTreeMap, HashSet},
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, OnceLock,
    },
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use devcfg_core::{ConfigError, ConfigStore, ConfigValue, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::defaults;

const DOCUMENT_VERSION: u32 = 1;

type Document = BTreeMap<String, ConfigValue>;

/// File-backed configuration store. The whole document is held in memory and
/// every mutation rewrites the file through a temp-file-then-rename, so the
/// file and the in-memory copy move together or not at all.
pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<Document>,
    resets: AtomicU64,
    _claim: PathClaim,
}

/// On-disk layout of a store document.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, StoredValue>,
}

/// Tagged on-disk value. Binary values are base64 text.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum StoredValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    Str(String),
    Bin(String),
}

impl fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JsonFileStore {
    /// Open the store at `path`, loading the document if the file exists.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = std::path::absolute(path.as_ref()).map_err(ConfigError::persistence)?;
        let claim = PathClaim::acquire(&path)?;
        let doc = load_document(&path)?;
        debug!(entries = doc.len(), "loaded config document");
        Ok(Self {
            path,
            doc: Mutex::new(doc),
            resets: AtomicU64::new(0),
            _claim: claim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed missing entries from a schema-validated defaults file.
    /// Absent files are a no-op. Returns the number of entries seeded.
    pub fn set_default_configuration(
        &self,
        defaults_path: impl AsRef<Path>,
        schema_path: impl AsRef<Path>,
    ) -> Result<usize> {
        defaults::set_default_configuration(self, defaults_path.as_ref(), schema_path.as_ref())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Document>> {
        self.doc.lock().map_err(|err| ConfigError::Persistence {
            reason: format!("lock poisoned: {err}"),
        })
    }

    /// Commit `next` and only then make it the live document.
    fn replace(&self, doc: &mut Document, next: Document) -> Result<()> {
        commit(&self.path, &next)?;
        *doc = next;
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, name: &str) -> Result<Option<ConfigValue>> {
        Ok(self.lock()?.get(name).cloned())
    }

    #[instrument(skip_all, fields(name = %name, kind = %value.kind()))]
    fn set(&self, name: &str, value: ConfigValue) -> Result<()> {
        let mut doc = self.lock()?;
        let mut next = doc.clone();
        next.insert(name.to_string(), value);
        self.replace(&mut doc, next)
    }

    #[instrument(skip_all, fields(name = %name))]
    fn remove(&self, name: &str) -> Result<()> {
        let mut doc = self.lock()?;
        if !doc.contains_key(name) {
            return Ok(());
        }
        let mut next = doc.clone();
        next.remove(name);
        self.replace(&mut doc, next)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn reset(&self) -> Result<()> {
        let mut doc = self.lock()?;
        debug!(entries = doc.len(), "discarding config document");
        self.replace(&mut doc, Document::new())?;
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn entry_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    #[instrument(skip_all, fields(count = entries.len()))]
    fn write_batch(&self, entries: Vec<(String, ConfigValue)>) -> Result<()> {
        let mut doc = self.lock()?;
        let mut next = doc.clone();
        next.extend(entries);
        self.replace(&mut doc, next)
    }

    #[instrument(skip_all, fields(count = entries.len()))]
    fn write_missing(&self, entries: Vec<(String, ConfigValue)>) -> Result<usize> {
        let mut doc = self.lock()?;
        let mut next = doc.clone();
        let mut written = 0;
        for (name, value) in entries {
            if !next.contains_key(&name) {
                next.insert(name, value);
                written += 1;
            }
        }
        if written > 0 {
            self.replace(&mut doc, next)?;
        }
        Ok(written)
    }

    fn reset_generation(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }
}

fn load_document(path: &Path) -> Result<Document> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(err) => return Err(ConfigError::persistence(err)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }

    let stored: StoredDocument = serde_json::from_slice(&bytes).map_err(ConfigError::corrupt)?;
    if stored.version != DOCUMENT_VERSION {
        return Err(ConfigError::Corrupt {
            reason: format!("unsupported document version {}", stored.version),
        });
    }

    stored
        .entries
        .into_iter()
        .map(|(name, value)| decode_value(&name, value).map(|value| (name, value)))
        .collect()
}

fn commit(path: &Path, doc: &Document) -> Result<()> {
    let parent = path.parent().ok_or_else(|| ConfigError::Persistence {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(ConfigError::persistence)?;

    let stored = StoredDocument {
        version: DOCUMENT_VERSION,
        entries: doc
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    };
    let json = serde_json::to_vec_pretty(&stored).map_err(ConfigError::persistence)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(ConfigError::persistence)?;
    tmp.write_all(&json).map_err(ConfigError::persistence)?;
    tmp.flush().map_err(ConfigError::persistence)?;
    tmp.as_file().sync_all().map_err(ConfigError::persistence)?;
    tmp.persist(path)
        .map_err(|e| ConfigError::persistence(e.error))?;
    sync_dir(parent)
}

/// Flush the directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|handle| handle.sync_all())
        .map_err(ConfigError::persistence)
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn encode_value(value: &ConfigValue) -> StoredValue {
    match value {
        ConfigValue::Bool(v) => StoredValue::Bool(*v),
        ConfigValue::U32(v) => StoredValue::U32(*v),
        ConfigValue::U64(v) => StoredValue::U64(*v),
        ConfigValue::Str(v) => StoredValue::Str(v.clone()),
        ConfigValue::Bin(v) => StoredValue::Bin(STANDARD.encode(v)),
    }
}

fn decode_value(name: &str, value: StoredValue) -> Result<ConfigValue> {
    Ok(match value {
        StoredValue::Bool(v) => ConfigValue::Bool(v),
        StoredValue::U32(v) => ConfigValue::U32(v),
        StoredValue::U64(v) => ConfigValue::U64(v),
        StoredValue::Str(v) => ConfigValue::Str(v),
        StoredValue::Bin(text) => {
            let bytes = STANDARD.decode(text).map_err(|e| ConfigError::Corrupt {
                reason: format!("{name}: binary decode failed: {e}"),
            })?;
            ConfigValue::Bin(bytes)
        }
    })
}

/// Process-wide record of which paths have a live store.
fn open_paths() -> &'static Mutex<HashSet<PathBuf>> {
    static OPEN_PATHS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    OPEN_PATHS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on a backing path, released on drop.
#[derive(Debug)]
struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    fn acquire(path: &Path) -> Result<Self> {
        let mut paths = open_paths().lock().map_err(|err| ConfigError::Persistence {
            reason: format!("lock poisoned: {err}"),
        })?;
        if !paths.insert(path.to_path_buf()) {
            return Err(ConfigError::AlreadyOpen {
                path: path.display().to_string(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        let mut paths = open_paths()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        paths.remove(&self.path);
    }
}
