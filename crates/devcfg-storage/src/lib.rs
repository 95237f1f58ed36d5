//! File-backed configuration stores.
//! One JSON document per store, committed atomically, with an optional
//! schema-validated default overlay and the conventional device domains.

pub mod defaults;
pub mod domains;
pub mod json_file_store;

pub use domains::{DomainStores, StoreDomain};
pub use json_file_store::JsonFileStore;
