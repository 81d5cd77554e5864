//! Data-driven loading for Conduit: resource categories, storage types,
//! block tag tables, and engine configuration from RON, TOML, or JSON.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, ResourcePack, load_resource_pack};
