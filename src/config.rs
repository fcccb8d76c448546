//! Dataset configuration, validated once at construction time.
//!
//! ```json
//! { "root": "/data/train", "group_size": 64, "read_group_size": 16 }
//! ```
//! `read_group_size` defaults to 0 (whole groups) and `format` to `"packed"`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{MetadataError, MetadataIndex};
use crate::layout::PackLayout;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("group_size must be at least 1")]
    ZeroGroupSize,
    #[error("read_group_size {read_group_size} does not evenly divide group_size {group_size}")]
    InvalidPackConfiguration { group_size: usize, read_group_size: usize },
    #[error("folder datasets hold one image per group; group_size must be 1, got {0}")]
    FolderGroupSize(usize),
    #[error("cannot read config {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid config {}: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },
}

// ── ContainerFormat ──────────────────────────────────────────────────────────

/// On-disk layout of a dataset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// `metadata.txt` plus one container file per group.
    #[default]
    Packed,
    /// One image file per sample under `root/<class>/`.
    Folder,
}

impl ContainerFormat {
    pub fn name(self) -> &'static str {
        match self {
            ContainerFormat::Packed => "packed",
            ContainerFormat::Folder => "folder",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "packed" => Some(ContainerFormat::Packed),
            "folder" => Some(ContainerFormat::Folder),
            _        => None,
        }
    }

    /// Build the index for a root in this format.
    pub fn load_index(self, root: &Path, group_size: usize) -> Result<MetadataIndex, MetadataError> {
        match self {
            ContainerFormat::Packed => MetadataIndex::load(root, group_size),
            ContainerFormat::Folder => MetadataIndex::scan_folder(root),
        }
    }
}

// ── DatasetConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub root:            PathBuf,
    /// Records per container file; fixed for the whole dataset.
    pub group_size:      usize,
    /// Records per read.  0 means `group_size`.
    #[serde(default)]
    pub read_group_size: usize,
    #[serde(default)]
    pub format:          ContainerFormat,
}

impl DatasetConfig {
    pub fn new<P: Into<PathBuf>>(root: P, group_size: usize) -> Self {
        Self {
            root: root.into(),
            group_size,
            read_group_size: 0,
            format: ContainerFormat::default(),
        }
    }

    pub fn with_read_group_size(mut self, read_group_size: usize) -> Self {
        self.read_group_size = read_group_size;
        self
    }

    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| ConfigError::Json { path: path.to_owned(), source })
    }

    /// Check the grouping parameters and derive the pack layout.
    pub fn validate(&self) -> Result<PackLayout, ConfigError> {
        if self.format == ContainerFormat::Folder && self.group_size != 1 {
            return Err(ConfigError::FolderGroupSize(self.group_size));
        }
        PackLayout::new(self.group_size, self.read_group_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let cfg: DatasetConfig = serde_json::from_str(r#"{"root": "/data", "group_size": 8}"#).unwrap();
        assert_eq!(cfg, DatasetConfig::new("/data", 8));
        assert_eq!(cfg.validate().unwrap().packs_per_group(), 1);
    }

    #[test]
    fn json_full() {
        let cfg: DatasetConfig = serde_json::from_str(
            r#"{"root": "r", "group_size": 1, "read_group_size": 1, "format": "folder"}"#,
        ).unwrap();
        assert_eq!(cfg.format, ContainerFormat::Folder);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn invalid_pack_configuration_at_validate() {
        let cfg = DatasetConfig::new("r", 6).with_read_group_size(4);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidPackConfiguration { group_size: 6, read_group_size: 4 })
        ));
    }

    #[test]
    fn folder_needs_single_record_groups() {
        let cfg = DatasetConfig::new("r", 4).with_format(ContainerFormat::Folder);
        assert!(matches!(cfg.validate(), Err(ConfigError::FolderGroupSize(4))));
    }

    #[test]
    fn config_file_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        assert!(matches!(DatasetConfig::from_json_file(&path), Err(ConfigError::Io { .. })));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(DatasetConfig::from_json_file(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn format_names() {
        assert_eq!(ContainerFormat::from_name("PACKED"), Some(ContainerFormat::Packed));
        assert_eq!(ContainerFormat::from_name("zip"), None);
        assert_eq!(ContainerFormat::Folder.name(), "folder");
    }
}
