//! Core contracts for devcfg: the typed configuration store interface,
//! its value model and the error taxonomy shared by every crate.
//! Backends live in `devcfg-storage`; this crate only carries an in-memory store for tests.

pub mod error;
pub mod memory;
pub mod store;
pub mod value;

pub use error::{ConfigError, Result};
pub use memory::InMemoryConfigStore;
pub use store::ConfigStore;
pub use value::{ConfigValue, ValueKind};
