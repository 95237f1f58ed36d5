use std::{fmt, str::FromStr};

/// Identifier of a group key. The bits under [`KeyType::MASK`] carry the key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyId(u32);

/// Type component of a [`KeyId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyType(u32);

const MASK_EPOCH_KEY_NUMBER: u32 = 0x0000_0380;
const SHIFT_EPOCH_KEY_NUMBER: u32 = 7;
const MASK_GROUP_LOCAL_NUMBER: u32 = 0x0000_007F;

impl KeyId {
    /// Sentinel meaning "no key".
    pub const NONE: KeyId = KeyId(0);
    pub const FABRIC_SECRET: KeyId = KeyId(KeyType::GENERAL.0 | 0x001);
    pub const FABRIC_ROOT_KEY: KeyId = KeyId(KeyType::APP_ROOT.0);
    pub const CLIENT_ROOT_KEY: KeyId = KeyId(KeyType::APP_ROOT.0 | 0x001);
    pub const SERVICE_ROOT_KEY: KeyId = KeyId(KeyType::APP_ROOT.0 | 0x002);

    pub const fn new(raw: u32) -> Self {
        KeyId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn key_type(self) -> KeyType {
        KeyType(self.0 & KeyType::MASK)
    }

    pub const fn is_fabric_secret(self) -> bool {
        self.0 == KeyId::FABRIC_SECRET.0
    }

    /// Application epoch key `number` (0..=7).
    pub const fn epoch_key(number: u8) -> Self {
        KeyId(
            KeyType::APP_EPOCH.0
                | (((number as u32) << SHIFT_EPOCH_KEY_NUMBER) & MASK_EPOCH_KEY_NUMBER),
        )
    }

    /// Application group master key for group-local number `local` (0..=127).
    pub const fn group_master_key(local: u8) -> Self {
        KeyId(KeyType::APP_GROUP_MASTER.0 | (local as u32 & MASK_GROUP_LOCAL_NUMBER))
    }

    pub fn epoch_key_number(self) -> Option<u8> {
        (self.key_type() == KeyType::APP_EPOCH)
            .then(|| ((self.0 & MASK_EPOCH_KEY_NUMBER) >> SHIFT_EPOCH_KEY_NUMBER) as u8)
    }

    pub fn group_local_number(self) -> Option<u8> {
        (self.key_type() == KeyType::APP_GROUP_MASTER)
            .then(|| (self.0 & MASK_GROUP_LOCAL_NUMBER) as u8)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for KeyId {
    fn from(raw: u32) -> Self {
        KeyId(raw)
    }
}

/// Accepts `0x`-prefixed hex or decimal.
impl FromStr for KeyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse::<u32>(),
        };
        parsed
            .map(KeyId)
            .map_err(|e| format!("invalid key id `{s}`: {e}"))
    }
}

impl KeyType {
    pub const MASK: u32 = 0x0FFF_F000;

    /// Matches every key when used as a filter.
    pub const NONE: KeyType = KeyType(0x0000_0000);
    pub const GENERAL: KeyType = KeyType(0x0000_1000);
    pub const SESSION: KeyType = KeyType(0x0000_2000);
    pub const APP_STATIC: KeyType = KeyType(0x0000_4000);
    pub const APP_ROTATING: KeyType = KeyType(0x0000_5000);
    pub const APP_ROOT: KeyType = KeyType(0x0001_0000);
    pub const APP_EPOCH: KeyType = KeyType(0x0002_0000);
    pub const APP_GROUP_MASTER: KeyType = KeyType(0x0003_0000);
    pub const APP_INTERMEDIATE: KeyType = KeyType(0x0004_0000);

    const NAMED: [(KeyType, &'static str); 9] = [
        (KeyType::NONE, "none"),
        (KeyType::GENERAL, "general"),
        (KeyType::SESSION, "session"),
        (KeyType::APP_STATIC, "app-static"),
        (KeyType::APP_ROTATING, "app-rotating"),
        (KeyType::APP_ROOT, "root"),
        (KeyType::APP_EPOCH, "epoch"),
        (KeyType::APP_GROUP_MASTER, "group-master"),
        (KeyType::APP_INTERMEDIATE, "intermediate"),
    ];

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Filter semantics: `NONE` selects all keys.
    pub fn matches(self, id: KeyId) -> bool {
        self == KeyType::NONE || id.key_type() == self
    }

    pub fn name(self) -> Option<&'static str> {
        KeyType::NAMED
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::NAMED
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| format!("unknown key type `{s}`"))
    }
}
