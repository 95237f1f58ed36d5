use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use devcfg_keys::{KeyId, KeyType};
use devcfg_storage::StoreDomain;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "devcfg",
    about = "Inspect and edit persistent device configuration and group keys",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Override the data directory holding the store files.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Write, read back and remove a probe value in the config domain.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print one value.
    Get {
        name: String,
        #[arg(long, default_value = "config")]
        domain: StoreDomain,
    },
    /// Write one value. Binary values are given as hex.
    Set {
        name: String,
        value: String,
        #[arg(long, value_enum, default_value_t = KindArg::Str)]
        kind: KindArg,
        #[arg(long, default_value = "config")]
        domain: StoreDomain,
    },
    /// Remove one value (no error if absent).
    Clear {
        name: String,
        #[arg(long, default_value = "config")]
        domain: StoreDomain,
    },
    /// List entry names and values of a domain.
    List {
        #[arg(long, default_value = "config")]
        domain: StoreDomain,
    },
    /// Seed missing config values from the configured defaults and schema.
    ApplyDefaults,
    /// Wipe the config and counters domains. Factory data is kept.
    FactoryReset {
        /// Required to actually perform the reset.
        #[arg(long)]
        yes: bool,
    },
    /// Manage group keys held in the config domain.
    #[command(subcommand)]
    Keys(KeysCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeysCommand {
    /// List stored key ids, optionally filtered by type.
    List {
        #[arg(long = "type", default_value = "none")]
        key_type: KeyType,
    },
    /// Show metadata of one key (never its material).
    Show { id: KeyId },
    /// Store a key from hex material or freshly generated random bytes.
    Put {
        id: KeyId,
        #[arg(long, conflicts_with = "random", required_unless_present = "random")]
        hex: Option<String>,
        /// Generate this many random bytes of key material.
        #[arg(long)]
        random: Option<usize>,
        #[arg(long, default_value_t = 0)]
        start_time: u32,
    },
    /// Delete one key.
    Delete { id: KeyId },
    /// Delete every key of a type.
    DeleteType {
        #[arg(long = "type")]
        key_type: KeyType,
    },
    /// Delete every key.
    Clear,
    /// Print or set the last used epoch key id.
    LastEpoch { id: Option<KeyId> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Bool,
    U32,
    U64,
    Str,
    Bin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_with_default_domain() {
        let cli = Cli::try_parse_from(["devcfg", "get", "serial-num"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Get {
                name: "serial-num".into(),
                domain: StoreDomain::Config
            }
        );
    }

    #[test]
    fn parses_typed_set_in_factory_domain() {
        let cli = Cli::try_parse_from([
            "devcfg", "set", "product-id", "5", "--kind", "u32", "--domain", "factory",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Command::Set {
                name: "product-id".into(),
                value: "5".into(),
                kind: KindArg::U32,
                domain: StoreDomain::Factory
            }
        );
    }

    #[test]
    fn parses_key_put_with_hex_id() {
        let cli = Cli::try_parse_from([
            "devcfg",
            "keys",
            "put",
            "0x00020080",
            "--random",
            "32",
            "--start-time",
            "100",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Command::Keys(KeysCommand::Put {
                id: KeyId::epoch_key(1),
                hex: None,
                random: Some(32),
                start_time: 100
            })
        );
    }

    #[test]
    fn key_put_requires_material_source() {
        assert!(Cli::try_parse_from(["devcfg", "keys", "put", "0x1001"]).is_err());
    }

    #[test]
    fn parses_key_list_type_filter() {
        let cli =
            Cli::try_parse_from(["devcfg", "keys", "list", "--type", "epoch"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Keys(KeysCommand::List {
                key_type: KeyType::APP_EPOCH
            })
        );
    }

    #[test]
    fn rejects_unknown_domain() {
        assert!(Cli::try_parse_from(["devcfg", "list", "--domain", "nvram"]).is_err());
    }
}
