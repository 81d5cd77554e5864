//! Resolution pipeline: reads data files, resolves name references, builds
//! the resource registry.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_resource_pack`] which ties them
//! together for a whole directory.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use conduit_core::config::{ConfigError, EngineConfig};
use conduit_core::id::CategoryId;
use conduit_core::registry::{BlockTag, RegistryError, ResourceRegistry, ResourceRegistryBuilder};
use serde::de::DeserializeOwned;

use crate::schema::{BlockData, ResourceData};

/// Base name of the required resources file.
pub const RESOURCES_FILE: &str = "resources";

/// Base name of the optional engine config file.
pub const CONFIG_FILE: &str = "config";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("invalid config in {file}: {source}")]
    InvalidConfig { file: PathBuf, source: ConfigError },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Return a `DuplicateName` error if `contains` reports `name` as taken.
pub fn check_duplicate(
    contains: impl FnOnce(&str) -> bool,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if contains(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Resource pack
// ===========================================================================

/// Everything loaded from one data directory.
#[derive(Debug)]
pub struct ResourcePack {
    pub registry: ResourceRegistry,
    pub config: EngineConfig,
}

/// Load `resources.*` (required) and `config.*` (optional) from `dir`.
pub fn load_resource_pack(dir: &Path) -> Result<ResourcePack, DataLoadError> {
    let resources_path = require_data_file(dir, RESOURCES_FILE)?;
    let data: ResourceData = deserialize_file(&resources_path)?;
    let registry = build_registry(&data, &resources_path)?;

    let config = match find_data_file(dir, CONFIG_FILE)? {
        Some(path) => {
            let config: EngineConfig = deserialize_file(&path)?;
            config
                .validate()
                .map_err(|source| DataLoadError::InvalidConfig { file: path, source })?;
            config
        }
        None => EngineConfig::default(),
    };

    tracing::debug!(
        dir = %dir.display(),
        categories = registry.category_count(),
        storage_types = registry.storage_type_count(),
        blocks = registry.block_count(),
        "resource pack loaded"
    );
    Ok(ResourcePack { registry, config })
}

/// Resolve names in `data` and build a frozen registry. `file` is only used
/// for error reporting.
pub fn build_registry(data: &ResourceData, file: &Path) -> Result<ResourceRegistry, DataLoadError> {
    let mut builder = ResourceRegistryBuilder::new();

    let mut categories: HashMap<String, CategoryId> = HashMap::new();
    for name in &data.categories {
        check_duplicate(|n| categories.contains_key(n), name, file)?;
        let id = builder.register_category(name)?;
        categories.insert(name.clone(), id);
    }

    let mut storage_types: HashSet<String> = HashSet::new();
    for storage in &data.storage_types {
        check_duplicate(|n| storage_types.contains(n), &storage.name, file)?;
        let category = *resolve_name(&categories, &storage.category, file, "category")?;
        builder.register_storage_type(&storage.name, category)?;
        storage_types.insert(storage.name.clone());
    }

    let mut blocks: HashSet<String> = HashSet::new();
    for block in &data.blocks {
        check_duplicate(|n| blocks.contains(n), &block.name, file)?;
        let tags = block_tags(block, &categories, file)?;
        builder.register_block(&block.name, tags)?;
        blocks.insert(block.name.clone());
    }

    Ok(builder.build()?)
}

fn block_tags(
    block: &BlockData,
    categories: &HashMap<String, CategoryId>,
    file: &Path,
) -> Result<BTreeSet<BlockTag>, DataLoadError> {
    let mut tags = BTreeSet::new();
    for name in &block.io {
        tags.insert(BlockTag::Io(*resolve_name(categories, name, file, "category")?));
    }
    for name in &block.conduit {
        let category = *resolve_name(categories, name, file, "category")?;
        tags.insert(BlockTag::Io(category));
        tags.insert(BlockTag::Conduit(category));
    }
    for name in &block.consumer {
        let category = *resolve_name(categories, name, file, "category")?;
        tags.insert(BlockTag::Io(category));
        tags.insert(BlockTag::Consumer(category));
    }
    if block.network_link {
        tags.insert(BlockTag::NetworkLink);
    }
    Ok(tags)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::discovery::{NodeRole, RoleClassifier};
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "conduit_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const RESOURCES_RON: &str = r#"(
        categories: ["energy", "gas"],
        storage_types: [
            (name: "energy", category: "energy"),
            (name: "hydrogen", category: "gas"),
        ],
        blocks: [
            (name: "stone"),
            (name: "cable", conduit: ["energy"]),
            (name: "battery", consumer: ["energy"]),
            (name: "generator", io: ["energy"]),
            (name: "electrolyzer", consumer: ["energy"], io: ["gas"]),
            (name: "relay", conduit: ["energy"], network_link: true),
        ],
    )"#;

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("resources.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("resources.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("resources.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["resources.yaml", "resources"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found() {
        let dir = make_test_dir("find_found");
        fs::write(dir.join("config.toml"), "").unwrap();

        let result = find_data_file(&dir, "config").unwrap();
        assert_eq!(result, Some(dir.join("config.toml")));

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_missing() {
        let dir = make_test_dir("find_missing");
        assert_eq!(find_data_file(&dir, "config").unwrap(), None);
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("resources.ron"), "()").unwrap();
        fs::write(dir.join("resources.json"), "{}").unwrap();

        let result = find_data_file(&dir, "resources");
        assert!(matches!(result, Err(DataLoadError::ConflictingFormats { .. })));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, RESOURCES_FILE).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { ref file, .. } if file == "resources"));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_file
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_file_parse_error_names_file() {
        let dir = make_test_dir("parse_error");
        let path = dir.join("resources.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<ResourceData, _> = deserialize_file(&path);
        match result {
            Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // build_registry
    // -----------------------------------------------------------------------

    #[test]
    fn build_registry_resolves_tags() {
        let data: ResourceData = ron::from_str(RESOURCES_RON).unwrap();
        let registry = build_registry(&data, Path::new("resources.ron")).unwrap();
        let energy = registry.category_id("energy").unwrap();
        let gas = registry.category_id("gas").unwrap();
        let block = |name| registry.block_id(name).unwrap();

        assert_eq!(registry.classify(block("stone"), energy), None);
        assert_eq!(registry.classify(block("cable"), energy), Some(NodeRole::Conduit));
        assert_eq!(registry.classify(block("battery"), energy), Some(NodeRole::Consumer));
        assert_eq!(registry.classify(block("generator"), energy), Some(NodeRole::Generator));
        assert_eq!(registry.classify(block("electrolyzer"), energy), Some(NodeRole::Consumer));
        assert_eq!(registry.classify(block("electrolyzer"), gas), Some(NodeRole::Generator));
        assert!(registry.is_network_link(block("relay")));
        assert!(!registry.is_network_link(block("cable")));
        assert_eq!(
            registry.category_of(registry.storage_type_id("hydrogen").unwrap()),
            Some(gas)
        );
    }

    #[test]
    fn build_registry_unresolved_category() {
        let data = ResourceData {
            categories: vec!["energy".into()],
            storage_types: vec![crate::schema::StorageTypeData {
                name: "steam".into(),
                category: "fluid".into(),
            }],
            blocks: vec![],
        };
        let err = build_registry(&data, Path::new("resources.ron")).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { ref name, expected_kind: "category", .. } if name == "fluid"
        ));
    }

    #[test]
    fn build_registry_duplicate_block() {
        let data: ResourceData = serde_json::from_str(
            r#"{"categories": ["energy"], "blocks": [{"name": "cable"}, {"name": "cable"}]}"#,
        )
        .unwrap();
        let err = build_registry(&data, Path::new("resources.json")).unwrap_err();
        assert!(matches!(err, DataLoadError::DuplicateName { ref name, .. } if name == "cable"));
    }

    #[test]
    fn build_registry_duplicate_storage_type() {
        let data: ResourceData = serde_json::from_str(
            r#"{
                "categories": ["energy"],
                "storage_types": [
                    {"name": "energy", "category": "energy"},
                    {"name": "energy", "category": "energy"}
                ]
            }"#,
        )
        .unwrap();
        let err = build_registry(&data, Path::new("resources.json")).unwrap_err();
        assert!(matches!(err, DataLoadError::DuplicateName { ref name, .. } if name == "energy"));
    }

    // -----------------------------------------------------------------------
    // load_resource_pack
    // -----------------------------------------------------------------------

    #[test]
    fn load_pack_without_config_uses_defaults() {
        let dir = make_test_dir("pack_defaults");
        fs::write(dir.join("resources.ron"), RESOURCES_RON).unwrap();

        let pack = load_resource_pack(&dir).unwrap();
        assert_eq!(pack.config, EngineConfig::default());
        assert_eq!(pack.registry.block_count(), 6);

        cleanup(&dir);
    }

    #[test]
    fn load_pack_with_partial_config() {
        let dir = make_test_dir("pack_config");
        fs::write(dir.join("resources.ron"), RESOURCES_RON).unwrap();
        fs::write(dir.join("config.toml"), "max_storage = 1000\n").unwrap();

        let pack = load_resource_pack(&dir).unwrap();
        assert_eq!(pack.config.max_storage, 1000);
        assert_eq!(
            pack.config.distribution_interval,
            EngineConfig::default().distribution_interval
        );

        cleanup(&dir);
    }

    #[test]
    fn load_pack_rejects_invalid_config() {
        let dir = make_test_dir("pack_bad_config");
        fs::write(dir.join("resources.ron"), RESOURCES_RON).unwrap();
        fs::write(dir.join("config.json"), r#"{"steps_per_tick": 0}"#).unwrap();

        let err = load_resource_pack(&dir).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidConfig { .. }));

        cleanup(&dir);
    }

    #[test]
    fn load_pack_requires_resources() {
        let dir = make_test_dir("pack_missing");
        fs::write(dir.join("config.ron"), "()").unwrap();

        let err = load_resource_pack(&dir).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { .. }));

        cleanup(&dir);
    }

    #[test]
    fn error_display_messages() {
        let err = DataLoadError::UnresolvedRef {
            file: PathBuf::from("resources.ron"),
            name: "plasma".into(),
            expected_kind: "category",
        };
        assert_eq!(
            err.to_string(),
            "unresolved category reference 'plasma' in resources.ron"
        );

        let err = DataLoadError::MissingRequired {
            file: "resources".into(),
            dir: PathBuf::from("/data"),
        };
        assert_eq!(err.to_string(), "required file 'resources' not found in /data");
    }
}
