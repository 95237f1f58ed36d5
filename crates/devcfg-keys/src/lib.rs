//! Group key storage on top of a [`devcfg_core::ConfigStore`].
//!
//! Keys are identified by a [`KeyId`] whose high bits carry a [`KeyType`].
//! [`GroupKeyStore`] keeps a bounded, ordered index of stored ids as one
//! binary entry and each key's material under its own entry:
//!
//! - `group-key-index`: little-endian u32 key ids
//! - `fabric-secret`: raw material of the fabric secret
//! - `gk-XXXXXXXX`: material followed by the little-endian start time
//! - `last-ek-id`: last used epoch key id

pub mod group_key;
pub mod key_id;
pub mod names;
pub mod store;

pub use group_key::{GroupKey, KeyBuffer, MAX_KEY_SIZE};
pub use key_id::{KeyId, KeyType};
pub use store::{GroupKeyStore, MAX_GROUP_KEYS};
