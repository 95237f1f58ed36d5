use crate::{
    error::{ConfigError, Result},
    value::{ConfigValue, ValueKind},
};

/// Contract for a typed, document-backed configuration store.
///
/// Backends implement the five primitives; every typed accessor is built on
/// them so all backends share the same not-found, type-mismatch and
/// buffer-size behavior. Each primitive that mutates must commit the whole
/// document or fail leaving the previous state in effect.
pub trait ConfigStore: Send + Sync {
    /// Fetch the raw value stored under `name`, if any.
    fn get(&self, name: &str) -> Result<Option<ConfigValue>>;

    /// Create or overwrite an entry and commit.
    fn set(&self, name: &str, value: ConfigValue) -> Result<()>;

    /// Remove an entry if present and commit. Absent entries are not an error.
    fn remove(&self, name: &str) -> Result<()>;

    /// Discard every entry and commit the empty document.
    fn reset(&self) -> Result<()>;

    /// Names of all entries, sorted.
    fn entry_names(&self) -> Result<Vec<String>>;

    /// Write several entries. Backends that can should do this in one commit.
    fn write_batch(&self, entries: Vec<(String, ConfigValue)>) -> Result<()> {
        for (name, value) in entries {
            self.set(&name, value)?;
        }
        Ok(())
    }

    /// Write only the entries whose name is not already present and return
    /// how many were written. Backends should check and write under one lock.
    fn write_missing(&self, entries: Vec<(String, ConfigValue)>) -> Result<usize> {
        let mut missing = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            if !self.contains(&name)? {
                missing.push((name, value));
            }
        }
        let written = missing.len();
        if written > 0 {
            self.write_batch(missing)?;
        }
        Ok(written)
    }

    /// Number of resets committed through this instance. Holders of derived
    /// state compare it to notice that the document was wiped under them.
    fn reset_generation(&self) -> u64 {
        0
    }

    fn read_bool(&self, name: &str) -> Result<bool> {
        match fetch(self, name)? {
            ConfigValue::Bool(v) => Ok(v),
            other => Err(mismatch(name, ValueKind::Bool, &other)),
        }
    }

    fn read_u32(&self, name: &str) -> Result<u32> {
        match fetch(self, name)? {
            ConfigValue::U32(v) => Ok(v),
            other => Err(mismatch(name, ValueKind::U32, &other)),
        }
    }

    fn read_u64(&self, name: &str) -> Result<u64> {
        match fetch(self, name)? {
            ConfigValue::U64(v) => Ok(v),
            other => Err(mismatch(name, ValueKind::U64, &other)),
        }
    }

    fn read_str(&self, name: &str) -> Result<String> {
        match fetch(self, name)? {
            ConfigValue::Str(v) => Ok(v),
            other => Err(mismatch(name, ValueKind::Str, &other)),
        }
    }

    fn read_bin(&self, name: &str) -> Result<Vec<u8>> {
        match fetch(self, name)? {
            ConfigValue::Bin(v) => Ok(v),
            other => Err(mismatch(name, ValueKind::Bin, &other)),
        }
    }

    /// Copy a string value's UTF-8 bytes into `buf` and return its length.
    /// On `BufferTooSmall` the buffer is left untouched.
    fn read_str_into(&self, name: &str, buf: &mut [u8]) -> Result<usize> {
        let value = self.read_str(name)?;
        copy_out(value.as_bytes(), buf)
    }

    /// Copy a binary value into `buf` and return its exact length.
    /// On `BufferTooSmall` the buffer is left untouched.
    fn read_bin_into(&self, name: &str, buf: &mut [u8]) -> Result<usize> {
        let value = self.read_bin(name)?;
        copy_out(&value, buf)
    }

    fn write_bool(&self, name: &str, value: bool) -> Result<()> {
        self.set(name, ConfigValue::Bool(value))
    }

    fn write_u32(&self, name: &str, value: u32) -> Result<()> {
        self.set(name, ConfigValue::U32(value))
    }

    fn write_u64(&self, name: &str, value: u64) -> Result<()> {
        self.set(name, ConfigValue::U64(value))
    }

    fn write_str(&self, name: &str, value: &str) -> Result<()> {
        self.set(name, ConfigValue::Str(value.to_string()))
    }

    fn write_bin(&self, name: &str, value: &[u8]) -> Result<()> {
        self.set(name, ConfigValue::Bin(value.to_vec()))
    }

    fn clear(&self, name: &str) -> Result<()> {
        self.remove(name)
    }

    /// Side-effect free presence check. A failing backend reports `false`.
    fn exists(&self, name: &str) -> bool {
        matches!(self.get(name), Ok(Some(_)))
    }

    /// Presence check that surfaces backend failures.
    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// Wipe all state held by this store.
    fn factory_reset(&self) -> Result<()> {
        self.reset()
    }
}

fn fetch<S: ConfigStore + ?Sized>(store: &S, name: &str) -> Result<ConfigValue> {
    store.get(name)?.ok_or_else(|| ConfigError::NotFound {
        name: name.to_string(),
    })
}

fn mismatch(name: &str, expected: ValueKind, found: &ConfigValue) -> ConfigError {
    ConfigError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: found.kind(),
    }
}

fn copy_out(src: &[u8], buf: &mut [u8]) -> Result<usize> {
    if src.len() > buf.len() {
        return Err(ConfigError::BufferTooSmall {
            needed: src.len(),
            capacity: buf.len(),
        });
    }
    buf[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryConfigStore;

    #[test]
    fn scalar_round_trips() {
        let store = InMemoryConfigStore::new();
        store.write_bool("paired", true).expect("write bool");
        store.write_u32("product-id", 0xFEED).expect("write u32");
        store.write_u64("uptime", u64::MAX).expect("write u64");
        store.write_str("serial", "18B4300001").expect("write str");
        store.write_bin("cert", &[0, 1, 2, 255]).expect("write bin");

        assert!(store.read_bool("paired").expect("read bool"));
        assert_eq!(store.read_u32("product-id").expect("read u32"), 0xFEED);
        assert_eq!(store.read_u64("uptime").expect("read u64"), u64::MAX);
        assert_eq!(store.read_str("serial").expect("read str"), "18B4300001");
        assert_eq!(store.read_bin("cert").expect("read bin"), vec![0, 1, 2, 255]);
    }

    #[test]
    fn missing_value_is_not_found() {
        let store = InMemoryConfigStore::new();
        let err = store.read_u32("never-written").expect_err("should be missing");
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(!store.exists("never-written"));
    }

    #[test]
    fn wrong_kind_is_type_mismatch() {
        let store = InMemoryConfigStore::new();
        store.write_u32("counter", 3).expect("write");

        let err = store.read_u64("counter").expect_err("u32 is not u64");
        assert_eq!(
            err,
            ConfigError::TypeMismatch {
                name: "counter".into(),
                expected: ValueKind::U64,
                found: ValueKind::U32,
            }
        );
    }

    #[test]
    fn short_buffer_is_reported_and_left_untouched() {
        let store = InMemoryConfigStore::new();
        store.write_bin("blob", &[7u8; 10]).expect("write");

        let mut small = [0u8; 4];
        let err = store
            .read_bin_into("blob", &mut small)
            .expect_err("buffer too small");
        assert_eq!(
            err,
            ConfigError::BufferTooSmall {
                needed: 10,
                capacity: 4
            }
        );
        assert_eq!(small, [0u8; 4]);

        let mut big = [0u8; 16];
        let len = store.read_bin_into("blob", &mut big).expect("read");
        assert_eq!(len, 10);
        assert_eq!(&big[..len], &[7u8; 10]);
    }

    #[test]
    fn str_into_copies_exact_length() {
        let store = InMemoryConfigStore::new();
        store.write_str("name", "kitchen").expect("write");
        let mut buf = [0u8; 7];
        let len = store.read_str_into("name", &mut buf).expect("exact fit");
        assert_eq!(&buf[..len], b"kitchen");
    }

    #[test]
    fn clear_is_idempotent() {
        let store = InMemoryConfigStore::new();
        store.write_bool("flag", false).expect("write");
        store.clear("flag").expect("clear");
        store.clear("flag").expect("clear again");
        assert!(!store.exists("flag"));
    }

    #[test]
    fn factory_reset_discards_everything() {
        let store = InMemoryConfigStore::new();
        store.write_u32("a", 1).expect("write");
        store.write_str("b", "x").expect("write");
        store.factory_reset().expect("reset");
        assert!(store.entry_names().expect("names").is_empty());
    }

    #[test]
    fn write_missing_skips_present_names() {
        let store = InMemoryConfigStore::new();
        store.write_u32("a", 1).expect("write");

        let written = store
            .write_missing(vec![
                ("a".into(), ConfigValue::U32(9)),
                ("b".into(), ConfigValue::Bool(true)),
            ])
            .expect("write missing");
        assert_eq!(written, 1);
        assert_eq!(store.read_u32("a").expect("kept"), 1);
        assert!(store.read_bool("b").expect("seeded"));
    }

    #[test]
    fn reset_bumps_generation() {
        let store = InMemoryConfigStore::new();
        assert_eq!(store.reset_generation(), 0);
        store.factory_reset().expect("reset");
        store.factory_reset().expect("reset again");
        assert_eq!(store.reset_generation(), 2);
    }

    #[test]
    fn batch_write_lands_every_entry() {
        let store = InMemoryConfigStore::new();
        store
            .write_batch(vec![
                ("a".into(), ConfigValue::U32(1)),
                ("b".into(), ConfigValue::Bool(true)),
            ])
            .expect("batch");
        assert_eq!(store.entry_names().expect("names"), vec!["a", "b"]);
    }
}
