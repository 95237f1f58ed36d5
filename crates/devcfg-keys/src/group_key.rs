use std::fmt;

use devcfg_core::{ConfigError, Result};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::key_id::KeyId;

/// Largest key material a group key may carry.
pub const MAX_KEY_SIZE: usize = 36;
/// Width of the start time packed after the material of non-fabric-secret keys.
pub const START_TIME_SIZE: usize = 4;
/// Largest persisted key record.
pub const MAX_RECORD_SIZE: usize = MAX_KEY_SIZE + START_TIME_SIZE;

/// Fixed-capacity key material buffer. Never exceeds [`MAX_KEY_SIZE`] and is
/// wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyBuffer {
    bytes: [u8; MAX_KEY_SIZE],
    len: usize,
}

impl KeyBuffer {
    pub fn from_slice(material: &[u8]) -> Result<Self> {
        if material.len() > MAX_KEY_SIZE {
            return Err(ConfigError::BufferTooSmall {
                needed: material.len(),
                capacity: MAX_KEY_SIZE,
            });
        }
        let mut bytes = [0u8; MAX_KEY_SIZE];
        bytes[..material.len()].copy_from_slice(material);
        Ok(Self {
            bytes,
            len: material.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for KeyBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for KeyBuffer {}

impl fmt::Debug for KeyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// A group key as handed to and returned from the key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub id: KeyId,
    pub key: KeyBuffer,
    /// Start of the key's validity window. Always 0 for the fabric secret.
    pub start_time: u32,
}

impl GroupKey {
    pub fn new(id: KeyId, material: &[u8], start_time: u32) -> Result<Self> {
        Ok(Self {
            id,
            key: KeyBuffer::from_slice(material)?,
            start_time: if id.is_fabric_secret() { 0 } else { start_time },
        })
    }

    pub fn fabric_secret(material: &[u8]) -> Result<Self> {
        Self::new(KeyId::FABRIC_SECRET, material, 0)
    }

    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    /// Persisted form: material, then the little-endian start time unless
    /// this is the fabric secret.
    pub(crate) fn to_record(&self) -> Zeroizing<Vec<u8>> {
        let mut record = Zeroizing::new(Vec::with_capacity(MAX_RECORD_SIZE));
        record.extend_from_slice(self.key.as_bytes());
        if !self.id.is_fabric_secret() {
            record.extend_from_slice(&self.start_time.to_le_bytes());
        }
        record
    }

    pub(crate) fn from_record(id: KeyId, record: &[u8]) -> Result<Self> {
        if id.is_fabric_secret() {
            return Self::new(id, record, 0).map_err(|_| oversized(id, record.len()));
        }

        let split = record
            .len()
            .checked_sub(START_TIME_SIZE)
            .ok_or_else(|| ConfigError::Corrupt {
                reason: format!("key {id}: record of {} bytes has no start time", record.len()),
            })?;
        let (material, packed) = record.split_at(split);
        let mut start = [0u8; START_TIME_SIZE];
        start.copy_from_slice(packed);
        Self::new(id, material, u32::from_le_bytes(start)).map_err(|_| oversized(id, record.len()))
    }
}

fn oversized(id: KeyId, len: usize) -> ConfigError {
    ConfigError::Corrupt {
        reason: format!("key {id}: record of {len} bytes exceeds maximum"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_rejects_oversized_material() {
        let err = KeyBuffer::from_slice(&[1u8; MAX_KEY_SIZE + 1]).expect_err("too long");
        assert_eq!(
            err,
            ConfigError::BufferTooSmall {
                needed: MAX_KEY_SIZE + 1,
                capacity: MAX_KEY_SIZE
            }
        );
        assert_eq!(KeyBuffer::from_slice(&[1u8; MAX_KEY_SIZE]).expect("fits").len(), MAX_KEY_SIZE);
    }

    #[test]
    fn debug_does_not_print_material() {
        let key = GroupKey::new(KeyId::epoch_key(0), &[0x5A; 16], 1).expect("key");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("90, 90"), "{rendered}");
        assert!(rendered.contains("len: 16"));
    }

    #[test]
    fn record_packs_start_time_after_material() {
        let key = GroupKey::new(KeyId::epoch_key(1), &[0xAA; 16], 0x00AB_CDEF).expect("key");
        let record = key.to_record();
        assert_eq!(record.len(), 20);
        assert_eq!(&record[..16], &[0xAA; 16]);
        assert_eq!(&record[16..], &[0xEF, 0xCD, 0xAB, 0x00]);

        let decoded = GroupKey::from_record(key.id, &record).expect("decode");
        assert_eq!(decoded, key);
    }

    #[test]
    fn fabric_secret_record_has_no_start_time() {
        let key = GroupKey::fabric_secret(&[0x11; MAX_KEY_SIZE]).expect("key");
        let record = key.to_record();
        assert_eq!(record.len(), MAX_KEY_SIZE);
        assert_eq!(
            GroupKey::from_record(KeyId::FABRIC_SECRET, &record).expect("decode"),
            key
        );
    }

    #[test]
    fn malformed_records_are_corrupt() {
        let short = GroupKey::from_record(KeyId::epoch_key(0), &[1, 2, 3]).expect_err("short");
        assert!(matches!(short, ConfigError::Corrupt { .. }));

        let long = GroupKey::from_record(KeyId::epoch_key(0), &[0u8; MAX_RECORD_SIZE + 1])
            .expect_err("long");
        assert!(matches!(long, ConfigError::Corrupt { .. }));
    }
}
