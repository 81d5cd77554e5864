use serde::{Deserialize, Serialize};
use slotmap::{Key, KeyData, new_key_type};

new_key_type! {
    /// Identifies an established network in the [`NetworkRegistry`].
    ///
    /// Slot keys carry a generation, so an id kept after its network was
    /// destroyed never resolves to a newer network reusing the slot.
    ///
    /// [`NetworkRegistry`]: crate::network::NetworkRegistry
    pub struct NetworkId;
}

impl NetworkId {
    /// Plain integer form used on the request/response boundary.
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild an id from its integer form. Unknown values simply fail to
    /// resolve in the registry.
    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

/// Identifies a resource category ("energy", "fluid", "gas").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub u32);

/// Identifies a storage type ("energy", "oil"). Every storage type belongs to
/// exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageTypeId(pub u32);

/// Identifies a block type in the resource registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockTypeId(pub u32);

/// Identifies a world dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionId(pub u32);
