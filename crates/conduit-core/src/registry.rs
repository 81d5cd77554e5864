use std::collections::{BTreeSet, HashMap};

use crate::discovery::{NodeRole, RoleClassifier};
use crate::id::*;

/// A resource category definition ("energy", "fluid", "gas").
#[derive(Debug, Clone)]
pub struct CategoryDef {
    pub name: String,
}

/// A storage type definition. Finer-grained than a category.
#[derive(Debug, Clone)]
pub struct StorageTypeDef {
    pub name: String,
    pub category: CategoryId,
}

/// A typed block tag. Replaces string-prefix tag matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockTag {
    /// The block takes part in networks of this category.
    Io(CategoryId),
    /// Pass-through wire for this category.
    Conduit(CategoryId),
    /// Accepts resources of this category.
    Consumer(CategoryId),
    /// May be materialized in the network link overlay.
    NetworkLink,
}

/// A block type definition with its tags.
#[derive(Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    pub tags: BTreeSet<BlockTag>,
}

/// Builder for constructing an immutable [`ResourceRegistry`].
/// Two-phase lifecycle: registration -> finalization.
#[derive(Debug, Default)]
pub struct ResourceRegistryBuilder {
    categories: Vec<CategoryDef>,
    category_name_to_id: HashMap<String, CategoryId>,
    storage_types: Vec<StorageTypeDef>,
    storage_type_name_to_id: HashMap<String, StorageTypeId>,
    blocks: Vec<BlockDef>,
    block_name_to_id: HashMap<String, BlockTypeId>,
}

impl ResourceRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource category. Returns its ID.
    pub fn register_category(&mut self, name: &str) -> Result<CategoryId, RegistryError> {
        if self.category_name_to_id.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let id = CategoryId(self.categories.len() as u32);
        self.categories.push(CategoryDef {
            name: name.to_string(),
        });
        self.category_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a storage type belonging to `category`. Returns its ID.
    pub fn register_storage_type(
        &mut self,
        name: &str,
        category: CategoryId,
    ) -> Result<StorageTypeId, RegistryError> {
        if self.storage_type_name_to_id.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let id = StorageTypeId(self.storage_types.len() as u32);
        self.storage_types.push(StorageTypeDef {
            name: name.to_string(),
            category,
        });
        self.storage_type_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a block type with its tags. Returns its ID.
    pub fn register_block(
        &mut self,
        name: &str,
        tags: impl IntoIterator<Item = BlockTag>,
    ) -> Result<BlockTypeId, RegistryError> {
        if self.block_name_to_id.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let id = BlockTypeId(self.blocks.len() as u32);
        self.blocks.push(BlockDef {
            name: name.to_string(),
            tags: tags.into_iter().collect(),
        });
        self.block_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn category_id(&self, name: &str) -> Option<CategoryId> {
        self.category_name_to_id.get(name).copied()
    }

    pub fn storage_type_id(&self, name: &str) -> Option<StorageTypeId> {
        self.storage_type_name_to_id.get(name).copied()
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_name_to_id.get(name).copied()
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> Result<ResourceRegistry, RegistryError> {
        let category_count = self.categories.len() as u32;
        for storage in &self.storage_types {
            if storage.category.0 >= category_count {
                return Err(RegistryError::InvalidCategoryRef(storage.category));
            }
        }
        for block in &self.blocks {
            for tag in &block.tags {
                match *tag {
                    BlockTag::Io(c) | BlockTag::Conduit(c) | BlockTag::Consumer(c)
                        if c.0 >= category_count =>
                    {
                        return Err(RegistryError::InvalidCategoryRef(c));
                    }
                    _ => {}
                }
            }
        }

        Ok(ResourceRegistry {
            categories: self.categories,
            category_name_to_id: self.category_name_to_id,
            storage_types: self.storage_types,
            storage_type_name_to_id: self.storage_type_name_to_id,
            blocks: self.blocks,
            block_name_to_id: self.block_name_to_id,
        })
    }
}

/// Immutable registry of categories, storage types, and tagged blocks.
/// Frozen after build().
#[derive(Debug)]
pub struct ResourceRegistry {
    categories: Vec<CategoryDef>,
    category_name_to_id: HashMap<String, CategoryId>,
    storage_types: Vec<StorageTypeDef>,
    storage_type_name_to_id: HashMap<String, StorageTypeId>,
    blocks: Vec<BlockDef>,
    block_name_to_id: HashMap<String, BlockTypeId>,
}

impl ResourceRegistry {
    pub fn get_category(&self, id: CategoryId) -> Option<&CategoryDef> {
        self.categories.get(id.0 as usize)
    }

    pub fn get_storage_type(&self, id: StorageTypeId) -> Option<&StorageTypeDef> {
        self.storage_types.get(id.0 as usize)
    }

    pub fn get_block(&self, id: BlockTypeId) -> Option<&BlockDef> {
        self.blocks.get(id.0 as usize)
    }

    pub fn category_id(&self, name: &str) -> Option<CategoryId> {
        self.category_name_to_id.get(name).copied()
    }

    pub fn storage_type_id(&self, name: &str) -> Option<StorageTypeId> {
        self.storage_type_name_to_id.get(name).copied()
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.block_name_to_id.get(name).copied()
    }

    /// The category a storage type belongs to.
    pub fn category_of(&self, storage_type: StorageTypeId) -> Option<CategoryId> {
        self.get_storage_type(storage_type).map(|s| s.category)
    }

    /// All storage types of one category, in registration order.
    pub fn storage_types_in(&self, category: CategoryId) -> impl Iterator<Item = StorageTypeId> + '_ {
        self.storage_types
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.category == category)
            .map(|(i, _)| StorageTypeId(i as u32))
    }

    pub fn has_tag(&self, block: BlockTypeId, tag: BlockTag) -> bool {
        self.get_block(block)
            .map(|b| b.tags.contains(&tag))
            .unwrap_or(false)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn storage_type_count(&self) -> usize {
        self.storage_types.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl RoleClassifier for ResourceRegistry {
    fn classify(&self, block: BlockTypeId, category: CategoryId) -> Option<NodeRole> {
        let def = self.get_block(block)?;
        if !def.tags.contains(&BlockTag::Io(category)) {
            return None;
        }
        if def.tags.contains(&BlockTag::Conduit(category)) {
            Some(NodeRole::Conduit)
        } else if def.tags.contains(&BlockTag::Consumer(category)) {
            Some(NodeRole::Consumer)
        } else {
            Some(NodeRole::Generator)
        }
    }

    fn is_network_link(&self, block: BlockTypeId) -> bool {
        self.has_tag(block, BlockTag::NetworkLink)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid category reference: {0:?}")]
    InvalidCategoryRef(CategoryId),
}
