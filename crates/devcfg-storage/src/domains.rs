use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use devcfg_core::{ConfigStore, Result};
use tracing::{info, instrument};

use crate::json_file_store::JsonFileStore;

/// Independent configuration domains of a device, one file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreDomain {
    /// Manufacturing data. Survives factory reset.
    Factory,
    Config,
    Counters,
}

impl StoreDomain {
    pub const ALL: [StoreDomain; 3] = [
        StoreDomain::Factory,
        StoreDomain::Config,
        StoreDomain::Counters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreDomain::Factory => "factory",
            StoreDomain::Config => "config",
            StoreDomain::Counters => "counters",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            StoreDomain::Factory => "factory.json",
            StoreDomain::Config => "config.json",
            StoreDomain::Counters => "counters.json",
        }
    }
}

impl fmt::Display for StoreDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreDomain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StoreDomain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == s)
            .ok_or_else(|| format!("unknown domain `{s}` (expected factory, config or counters)"))
    }
}

/// The set of domain stores rooted in one data directory.
/// Handles are shared so consumers receive the store they need explicitly.
#[derive(Debug, Clone)]
pub struct DomainStores {
    root: PathBuf,
    factory: Arc<JsonFileStore>,
    config: Arc<JsonFileStore>,
    counters: Arc<JsonFileStore>,
}

impl DomainStores {
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let open = |domain: StoreDomain| -> Result<Arc<JsonFileStore>> {
            Ok(Arc::new(JsonFileStore::open(root.join(domain.file_name()))?))
        };
        Ok(Self {
            factory: open(StoreDomain::Factory)?,
            config: open(StoreDomain::Config)?,
            counters: open(StoreDomain::Counters)?,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self, domain: StoreDomain) -> &JsonFileStore {
        self.shared(domain)
    }

    /// Shared handle for consumers that hold on to a store, such as the group key store.
    pub fn handle(&self, domain: StoreDomain) -> Arc<JsonFileStore> {
        Arc::clone(self.shared(domain))
    }

    fn shared(&self, domain: StoreDomain) -> &Arc<JsonFileStore> {
        match domain {
            StoreDomain::Factory => &self.factory,
            StoreDomain::Config => &self.config,
            StoreDomain::Counters => &self.counters,
        }
    }

    /// Wipe the config and counters domains. Factory data is kept.
    #[instrument(skip_all)]
    pub fn factory_reset(&self) -> Result<()> {
        self.config.factory_reset()?;
        self.counters.factory_reset()?;
        info!("factory reset complete");
        Ok(())
    }

    /// Apply the default overlay to the config domain.
    pub fn set_default_configuration(
        &self,
        defaults_path: impl AsRef<Path>,
        schema_path: impl AsRef<Path>,
    ) -> Result<usize> {
        self.config
            .set_default_configuration(defaults_path, schema_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_are_independent_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = DomainStores::open(dir.path()).expect("open");
        stores
            .store(StoreDomain::Config)
            .write_u32("k", 1)
            .expect("write config");
        stores
            .store(StoreDomain::Counters)
            .write_u32("k", 2)
            .expect("write counters");

        assert_eq!(
            stores.store(StoreDomain::Config).read_u32("k").expect("read"),
            1
        );
        assert_eq!(
            stores.store(StoreDomain::Counters).read_u32("k").expect("read"),
            2
        );
        assert!(!stores.store(StoreDomain::Factory).exists("k"));
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("counters.json").exists());
    }

    #[test]
    fn factory_reset_keeps_factory_domain() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = DomainStores::open(dir.path()).expect("open");
        stores
            .store(StoreDomain::Factory)
            .write_str("serial-num", "18B43000")
            .expect("write factory");
        stores
            .store(StoreDomain::Config)
            .write_bool("paired", true)
            .expect("write config");
        stores
            .store(StoreDomain::Counters)
            .write_u32("boot-count", 7)
            .expect("write counters");

        stores.factory_reset().expect("reset");

        assert!(stores.store(StoreDomain::Factory).exists("serial-num"));
        assert!(!stores.store(StoreDomain::Config).exists("paired"));
        assert!(!stores.store(StoreDomain::Counters).exists("boot-count"));
    }

    #[test]
    fn parses_domain_names() {
        assert_eq!("config".parse::<StoreDomain>(), Ok(StoreDomain::Config));
        assert!("nvram".parse::<StoreDomain>().is_err());
    }
}
