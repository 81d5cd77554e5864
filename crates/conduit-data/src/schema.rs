//! Serde data file structs for resource definitions.
//!
//! These structs define the on-disk format of `resources.{ron,toml,json}`.
//! Everything is referenced by name; the loader resolves names into
//! registry ids.

use serde::Deserialize;

/// Top-level contents of a resources file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceData {
    /// Resource category names ("energy", "gas").
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub storage_types: Vec<StorageTypeData>,
    #[serde(default)]
    pub blocks: Vec<BlockData>,
}

/// A storage type and the category it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageTypeData {
    pub name: String,
    pub category: String,
}

/// A block type and its tag table.
///
/// Each list names categories. Listing a category under `conduit` or
/// `consumer` implies I/O for it, so a block only needs `io` for categories
/// it generates.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockData {
    pub name: String,
    #[serde(default)]
    pub io: Vec<String>,
    #[serde(default)]
    pub conduit: Vec<String>,
    #[serde(default)]
    pub consumer: Vec<String>,
    /// Whether the block may carry link overlay connections.
    #[serde(default)]
    pub network_link: bool,
}
