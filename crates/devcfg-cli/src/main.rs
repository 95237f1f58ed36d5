mod cli;
mod config;
mod keys;
mod storage;
mod values;

use std::path::Path;

use clap::Parser;
use color_eyre::Result;
use devcfg_core::ConfigStore;
use devcfg_storage::{DomainStores, StoreDomain};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        command => {
            let root = storage::resolve_data_dir(cli.data_dir.as_deref(), &config)?;
            let stores = open_stores(&command, &root, &config)?;
            for line in run(command, &stores, &config)? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("devcfg {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Open the domain stores and run the boot-time default overlay, unless the
/// command applies the defaults itself and reports the count.
fn open_stores(command: &Command, root: &Path, config: &config::Config) -> Result<DomainStores> {
    let stores = storage::open_domains(root)?;
    if !matches!(command, Command::ApplyDefaults) {
        storage::apply_defaults(&stores, config)?;
    }
    Ok(stores)
}

/// Execute a store-backed command and return the lines to print.
fn run(command: Command, stores: &DomainStores, config: &config::Config) -> Result<Vec<String>> {
    let lines = match command {
        Command::Health => {
            run_store_health(stores.store(StoreDomain::Config))?;
            vec![format!("Storage: ok ({})", stores.root().display())]
        }
        Command::Get { name, domain } => vec![values::get(stores.store(domain), &name)?],
        Command::Set {
            name,
            value,
            kind,
            domain,
        } => {
            values::set(stores.store(domain), &name, kind, &value)?;
            vec![format!("Set {domain}/{name}")]
        }
        Command::Clear { name, domain } => {
            stores.store(domain).clear(&name)?;
            vec![format!("Cleared {domain}/{name}")]
        }
        Command::List { domain } => values::list(stores.store(domain))?,
        Command::ApplyDefaults => {
            let seeded = storage::apply_defaults(stores, config)?;
            vec![format!("Seeded {seeded} default value(s)")]
        }
        Command::FactoryReset { yes: false } => {
            vec!["Refusing to reset without --yes.".to_string()]
        }
        Command::FactoryReset { yes: true } => {
            stores.factory_reset()?;
            vec!["Factory reset complete; factory data kept.".to_string()]
        }
        Command::Keys(cmd) => keys::handle(cmd, stores.handle(StoreDomain::Config))?,
        Command::Version | Command::Config(_) => Vec::new(),
    };
    Ok(lines)
}

fn run_store_health<S: ConfigStore + ?Sized>(store: &S) -> Result<()> {
    let probe_key = "health/probe";
    let payload = b"ok";
    store.write_bin(probe_key, payload)?;
    let round_trip = store.read_bin(probe_key)?;
    store.clear(probe_key)?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use devcfg_core::InMemoryConfigStore;

    use super::*;
    use crate::cli::{KeysCommand, KindArg};

    #[test]
    fn health_check_with_memory_store_succeeds() {
        let store = InMemoryConfigStore::new();
        run_store_health(&store).expect("health check should succeed");
        assert!(!store.exists("health/probe"));
    }

    #[test]
    fn apply_defaults_reports_values_seeded_on_a_fresh_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let defaults = dir.path().join("defaults.json");
        let schema = dir.path().join("schema.json");
        std::fs::write(&defaults, r#"{"paired": true}"#).expect("write defaults");
        std::fs::write(&schema, r#"{"properties": {"paired": {"type": "boolean"}}}"#)
            .expect("write schema");
        let cfg = config::Config {
            data_dir: None,
            defaults_path: Some(defaults),
            schema_path: Some(schema),
        };
        let root = dir.path().join("data");

        {
            let stores = open_stores(&Command::ApplyDefaults, &root, &cfg).expect("open");
            let lines = run(Command::ApplyDefaults, &stores, &cfg).expect("apply");
            assert_eq!(lines, vec!["Seeded 1 default value(s)"]);
        }

        let stores = open_stores(&Command::Health, &root, &cfg).expect("reopen");
        let lines = run(Command::ApplyDefaults, &stores, &cfg).expect("apply again");
        assert_eq!(lines, vec!["Seeded 0 default value(s)"]);
    }

    #[test]
    fn commands_run_against_domain_stores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = DomainStores::open(dir.path()).expect("open");
        let cfg = config::Config::default();

        run(
            Command::Set {
                name: "serial-num".into(),
                value: "18B43000".into(),
                kind: KindArg::Str,
                domain: StoreDomain::Factory,
            },
            &stores,
            &cfg,
        )
        .expect("set");
        run(
            Command::Keys(KeysCommand::Put {
                id: devcfg_keys::KeyId::FABRIC_SECRET,
                hex: None,
                random: Some(36),
                start_time: 0,
            }),
            &stores,
            &cfg,
        )
        .expect("put key");

        let refused = run(Command::FactoryReset { yes: false }, &stores, &cfg).expect("refuse");
        assert_eq!(refused, vec!["Refusing to reset without --yes."]);
        run(Command::FactoryReset { yes: true }, &stores, &cfg).expect("reset");

        let factory = run(
            Command::Get {
                name: "serial-num".into(),
                domain: StoreDomain::Factory,
            },
            &stores,
            &cfg,
        )
        .expect("factory kept");
        assert_eq!(factory, vec!["\"18B43000\""]);
        let listed = run(
            Command::List {
                domain: StoreDomain::Config,
            },
            &stores,
            &cfg,
        )
        .expect("list");
        assert!(listed.is_empty());
    }
}
