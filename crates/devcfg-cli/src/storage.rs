use std::path::{Path, PathBuf};

use color_eyre::Result;
use devcfg_storage::DomainStores;
use dirs::data_dir;
use tracing::{debug, info};

use crate::config::Config;

/// Resolve the default data directory for devcfg.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("devcfg"))
}

/// Pick the data directory: command-line override, then config, then platform default.
pub fn resolve_data_dir(override_dir: Option<&Path>, config: &Config) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }
    default_data_dir()
}

/// Open the domain stores under `root`.
pub fn open_domains(root: &Path) -> Result<DomainStores> {
    debug!(?root, "opening domain stores");
    Ok(DomainStores::open(root)?)
}

/// Seed missing config values when both defaults and schema are configured.
pub fn apply_defaults(stores: &DomainStores, config: &Config) -> Result<usize> {
    let (Some(defaults), Some(schema)) = (&config.defaults_path, &config.schema_path) else {
        return Ok(0);
    };
    let seeded = stores.set_default_configuration(defaults, schema)?;
    if seeded > 0 {
        info!(seeded, "seeded default configuration");
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use devcfg_core::ConfigStore;
    use devcfg_storage::StoreDomain;

    use super::*;

    #[test]
    fn command_line_overrides_config() {
        let cfg = Config {
            data_dir: Some(PathBuf::from("/from/config")),
            ..Config::default()
        };
        let dir = resolve_data_dir(Some(Path::new("/from/flag")), &cfg).expect("resolve");
        assert_eq!(dir, PathBuf::from("/from/flag"));
        let dir = resolve_data_dir(None, &cfg).expect("resolve");
        assert_eq!(dir, PathBuf::from("/from/config"));
    }

    #[test]
    fn apply_defaults_reports_seeded_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let defaults = dir.path().join("defaults.json");
        let schema = dir.path().join("schema.json");
        fs::write(&defaults, r#"{"paired": false}"#).expect("write defaults");
        fs::write(&schema, r#"{"properties": {"paired": {"type": "boolean"}}}"#)
            .expect("write schema");
        let cfg = Config {
            data_dir: None,
            defaults_path: Some(defaults),
            schema_path: Some(schema),
        };

        let stores = open_domains(&dir.path().join("data")).expect("open");
        assert_eq!(apply_defaults(&stores, &cfg).expect("apply"), 1);
        assert_eq!(apply_defaults(&stores, &cfg).expect("apply again"), 0);
        assert!(!stores
            .store(StoreDomain::Config)
            .read_bool("paired")
            .expect("seeded"));
    }
}
