use thiserror::Error;

use crate::value::ValueKind;

/// Errors produced by configuration stores and their clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No entry exists under the requested name.
    #[error("config value not found: {name}")]
    NotFound { name: String },
    /// The entry exists but holds another kind of value.
    #[error("type mismatch for {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },
    /// Caller-provided buffer cannot hold the result. Retry with `needed` capacity.
    #[error("buffer too small: need {needed}, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    /// Committing the document failed; the previous state is still in effect.
    #[error("persistence failure: {reason}")]
    Persistence { reason: String },
    /// The persisted key index is not a whole number of key ids.
    #[error("key index length {len} is not aligned to key id width")]
    DataNotAligned { len: usize },
    /// The key index is full.
    #[error("too many keys (max {max})")]
    TooManyKeys { max: usize },
    /// Delete of a key id that is not indexed.
    #[error("key {key_id:#010x} not found")]
    KeyNotFound { key_id: u32 },
    /// A stored document or record cannot be decoded.
    #[error("corrupt data: {reason}")]
    Corrupt { reason: String },
    /// Default overlay rejected by its schema.
    #[error("invalid default configuration: {reason}")]
    InvalidDefaults { reason: String },
    /// Another store instance in this process owns the backing file.
    #[error("store already open: {path}")]
    AlreadyOpen { path: String },
}

impl ConfigError {
    pub fn persistence<E: ToString>(err: E) -> Self {
        ConfigError::Persistence {
            reason: err.to_string(),
        }
    }

    pub fn corrupt<E: ToString>(err: E) -> Self {
        ConfigError::Corrupt {
            reason: err.to_string(),
        }
    }

    /// True for the "value absent" outcome, as opposed to a broken store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
