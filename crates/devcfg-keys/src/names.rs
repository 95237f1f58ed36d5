//! Entry names used by the group key store. These are part of the on-disk
//! contract and must not change without a migration.

use devcfg_core::{ConfigError, Result};

use crate::key_id::KeyId;

pub const GROUP_KEY_INDEX: &str = "group-key-index";
pub const LAST_USED_EPOCH_KEY_ID: &str = "last-ek-id";
pub const FABRIC_SECRET: &str = "fabric-secret";
pub const GROUP_KEY_PREFIX: &str = "gk-";

const KEY_ID_HEX_DIGITS: usize = 8;

/// Longest name [`format_key_name`] can produce.
pub const MAX_KEY_NAME_LEN: usize = max(
    GROUP_KEY_PREFIX.len() + KEY_ID_HEX_DIGITS,
    FABRIC_SECRET.len(),
);

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Write the entry name for `id` into `buf` and return its length.
/// `buf` must hold at least [`MAX_KEY_NAME_LEN`] bytes.
pub fn format_key_name(id: KeyId, buf: &mut [u8]) -> Result<usize> {
    if buf.len() < MAX_KEY_NAME_LEN {
        return Err(ConfigError::BufferTooSmall {
            needed: MAX_KEY_NAME_LEN,
            capacity: buf.len(),
        });
    }

    if id.is_fabric_secret() {
        buf[..FABRIC_SECRET.len()].copy_from_slice(FABRIC_SECRET.as_bytes());
        return Ok(FABRIC_SECRET.len());
    }

    let prefix = GROUP_KEY_PREFIX.len();
    buf[..prefix].copy_from_slice(GROUP_KEY_PREFIX.as_bytes());
    let raw = id.raw();
    for (i, slot) in buf[prefix..prefix + KEY_ID_HEX_DIGITS].iter_mut().enumerate() {
        let shift = 4 * (KEY_ID_HEX_DIGITS - 1 - i);
        *slot = b"0123456789ABCDEF"[((raw >> shift) & 0xF) as usize];
    }
    Ok(prefix + KEY_ID_HEX_DIGITS)
}

/// Whether the entry `name` holds group key material.
pub fn holds_key_material(name: &str) -> bool {
    name == FABRIC_SECRET || name.starts_with(GROUP_KEY_PREFIX)
}

/// Entry name for `id` as an owned string.
pub fn key_name(id: KeyId) -> String {
    let mut buf = [0u8; MAX_KEY_NAME_LEN];
    let len = format_key_name(id, &mut buf).unwrap_or_default();
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
