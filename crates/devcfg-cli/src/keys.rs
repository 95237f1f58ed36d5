use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use devcfg_core::ConfigStore;
use devcfg_keys::{GroupKey, GroupKeyStore, KeyId, MAX_KEY_SIZE};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::cli::KeysCommand;

/// Execute a key subcommand against `store` and return the lines to print.
pub fn handle<S: ConfigStore>(cmd: KeysCommand, store: Arc<S>) -> Result<Vec<String>> {
    let mut keys = GroupKeyStore::init(store)?;
    let mut out = Vec::new();

    match cmd {
        KeysCommand::List { key_type } => {
            let ids = keys.group_key_ids(key_type)?;
            if ids.is_empty() {
                out.push("No group keys stored.".to_string());
            }
            for id in ids {
                out.push(format!("{id} [{}]", id.key_type()));
            }
        }
        KeysCommand::Show { id } => {
            let key = keys.retrieve_group_key(id)?;
            out.push(format!("id:         {}", key.id));
            out.push(format!("type:       {}", key.id.key_type()));
            out.push(format!("length:     {}", key.key_len()));
            if !id.is_fabric_secret() {
                out.push(format!("start time: {}", key.start_time));
            }
        }
        KeysCommand::Put {
            id,
            hex,
            random,
            start_time,
        } => {
            let material = key_material(hex.as_deref(), random)?;
            let key = GroupKey::new(id, &material, start_time)?;
            keys.store_group_key(&key)?;
            out.push(format!("Stored {id} ({} bytes)", key.key_len()));
        }
        KeysCommand::Delete { id } => {
            keys.delete_group_key(id)?;
            out.push(format!("Deleted {id}"));
        }
        KeysCommand::DeleteType { key_type } => {
            let removed = keys.delete_group_keys_of_type(key_type)?;
            out.push(format!("Deleted {removed} {key_type} key(s)"));
        }
        KeysCommand::Clear => {
            let removed = keys.clear()?;
            out.push(format!("Deleted {removed} key(s)"));
        }
        KeysCommand::LastEpoch { id: Some(id) } => {
            keys.store_last_used_epoch_key_id(id)?;
            out.push(format!("Last used epoch key set to {id}"));
        }
        KeysCommand::LastEpoch { id: None } => {
            let id = keys.retrieve_last_used_epoch_key_id()?;
            if id == KeyId::NONE {
                out.push("No epoch key used yet.".to_string());
            } else {
                out.push(id.to_string());
            }
        }
    }

    Ok(out)
}

fn key_material(hex: Option<&str>, random: Option<usize>) -> Result<Zeroizing<Vec<u8>>> {
    match (hex, random) {
        (Some(text), _) => Ok(Zeroizing::new(hex::decode(text)?)),
        (None, Some(len)) if len <= MAX_KEY_SIZE => {
            let mut bytes = Zeroizing::new(vec![0u8; len]);
            OsRng.fill_bytes(&mut bytes);
            Ok(bytes)
        }
        (None, Some(len)) => Err(eyre!("key length {len} exceeds maximum {MAX_KEY_SIZE}")),
        (None, None) => Err(eyre!("provide --hex or --random")),
    }
}
