//! Default-value overlay. A flat JSON object of `name -> scalar` is validated
//! against a schema file and every name the store does not already hold is
//! seeded in a single batch. Existing values are never overwritten.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use devcfg_core::{ConfigError, ConfigStore, ConfigValue, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Schema describing which defaults may appear and their types.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Schema {
    #[serde(default)]
    pub required: Vec<String>,
    pub properties: BTreeMap<String, SchemaEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SchemaEntry {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    /// Upper bound on string length or decoded binary length.
    #[serde(default)]
    pub max_len: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Boolean,
    Uint32,
    Uint64,
    String,
    Binary,
}

/// Seed `store` from `defaults_path` validated by `schema_path`.
///
/// Either file being absent is a silent no-op returning 0. Validation
/// failures reject the whole overlay before anything is written.
#[instrument(skip_all, fields(defaults = %defaults_path.display()))]
pub fn set_default_configuration<S: ConfigStore + ?Sized>(
    store: &S,
    defaults_path: &Path,
    schema_path: &Path,
) -> Result<usize> {
    let Some(defaults_text) = read_optional(defaults_path)? else {
        debug!("no defaults file; skipping overlay");
        return Ok(0);
    };
    let Some(schema_text) = read_optional(schema_path)? else {
        debug!("no schema file; skipping overlay");
        return Ok(0);
    };

    let schema: Schema =
        serde_json::from_str(&schema_text).map_err(|e| invalid(format!("schema: {e}")))?;
    let defaults: BTreeMap<String, Value> =
        serde_json::from_str(&defaults_text).map_err(|e| invalid(format!("defaults: {e}")))?;
    let values = validate(&schema, defaults)?;

    let seeded = store.write_missing(values)?;
    info!(seeded, "applied default configuration");
    Ok(seeded)
}

/// Check every default against `schema` and convert it to a typed value.
pub fn validate(
    schema: &Schema,
    defaults: BTreeMap<String, Value>,
) -> Result<Vec<(String, ConfigValue)>> {
    let present: BTreeSet<&str> = defaults.keys().map(String::as_str).collect();
    if let Some(missing) = schema.required.iter().find(|name| !present.contains(name.as_str())) {
        return Err(invalid(format!("required default missing: {missing}")));
    }

    defaults
        .into_iter()
        .map(|(name, value)| {
            let entry = schema
                .properties
                .get(&name)
                .ok_or_else(|| invalid(format!("undeclared default: {name}")))?;
            let typed = convert(&name, entry, value)?;
            Ok((name, typed))
        })
        .collect()
}

fn convert(name: &str, entry: &SchemaEntry, value: Value) -> Result<ConfigValue> {
    let typed = match (entry.kind, value) {
        (SchemaType::Boolean, Value::Bool(v)) => ConfigValue::Bool(v),
        (SchemaType::Uint32, Value::Number(n)) => {
            let v = n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid(format!("{name}: {n} is not a u32")))?;
            ConfigValue::U32(v)
        }
        (SchemaType::Uint64, Value::Number(n)) => {
            let v = n
                .as_u64()
                .ok_or_else(|| invalid(format!("{name}: {n} is not a u64")))?;
            ConfigValue::U64(v)
        }
        (SchemaType::String, Value::String(s)) => ConfigValue::Str(s),
        (SchemaType::Binary, Value::String(s)) => {
            let bytes = STANDARD
                .decode(s)
                .map_err(|e| invalid(format!("{name}: binary decode failed: {e}")))?;
            ConfigValue::Bin(bytes)
        }
        (kind, other) => {
            return Err(invalid(format!("{name}: expected {kind:?}, got {other}")));
        }
    };

    if let Some(max) = entry.max_len {
        let len = match &typed {
            ConfigValue::Str(s) => s.len(),
            ConfigValue::Bin(b) => b.len(),
            _ => 0,
        };
        if len > max {
            return Err(invalid(format!("{name}: length {len} exceeds {max}")));
        }
    }
    Ok(typed)
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfigError::persistence(err)),
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::InvalidDefaults { reason }
}
