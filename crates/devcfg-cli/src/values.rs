use color_eyre::{eyre::eyre, Result};
use devcfg_core::{ConfigStore, ConfigValue};
use devcfg_keys::names::holds_key_material;

use crate::cli::KindArg;

/// Parse command-line text into a typed value.
pub fn parse_value(kind: KindArg, text: &str) -> Result<ConfigValue> {
    let value = match kind {
        KindArg::Bool => ConfigValue::Bool(text.parse()?),
        KindArg::U32 => ConfigValue::U32(text.parse()?),
        KindArg::U64 => ConfigValue::U64(text.parse()?),
        KindArg::Str => ConfigValue::Str(text.to_string()),
        KindArg::Bin => ConfigValue::Bin(hex::decode(text)?),
    };
    Ok(value)
}

/// Render the value stored under `name`. Binary values print as hex except
/// key material, which only shows its length.
pub fn render(name: &str, value: &ConfigValue) -> String {
    match value {
        ConfigValue::Bin(_) if holds_key_material(name) => value.to_string(),
        ConfigValue::Bin(bytes) => hex::encode(bytes),
        other => other.to_string(),
    }
}

pub fn get<S: ConfigStore + ?Sized>(store: &S, name: &str) -> Result<String> {
    let value = store
        .get(name)?
        .ok_or_else(|| eyre!("no value named `{name}`"))?;
    Ok(render(name, &value))
}

pub fn set<S: ConfigStore + ?Sized>(
    store: &S,
    name: &str,
    kind: KindArg,
    text: &str,
) -> Result<()> {
    store.set(name, parse_value(kind, text)?)?;
    Ok(())
}

/// `name (kind) = value` lines for every entry.
pub fn list<S: ConfigStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for name in store.entry_names()? {
        if let Some(value) = store.get(&name)? {
            lines.push(format!("{name} ({}) = {}", value.kind(), render(&name, &value)));
        }
    }
    Ok(lines)
}
