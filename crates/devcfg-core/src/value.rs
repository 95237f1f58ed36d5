use std::fmt;

/// A typed value held by a configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    Str(String),
    Bin(Vec<u8>),
}

/// Discriminant of a [`ConfigValue`], used in type-mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    U32,
    U64,
    Str,
    Bin,
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::U32(_) => ValueKind::U32,
            ConfigValue::U64(_) => ValueKind::U64,
            ConfigValue::Str(_) => ValueKind::Str,
            ConfigValue::Bin(_) => ValueKind::Bin,
        }
    }
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::Str => "str",
            ValueKind::Bin => "bin",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary values render as their length only; they often hold key material.
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::U32(v) => write!(f, "{v}"),
            ConfigValue::U64(v) => write!(f, "{v}"),
            ConfigValue::Str(v) => write!(f, "{v:?}"),
            ConfigValue::Bin(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}
