// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `fullbody.ron` manifest.

use crate::error::{BuildError, Result};
use fullbody_timeline::DEFAULT_CLOSE_TAG;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file name
pub const MANIFEST_FILE_NAME: &str = "fullbody.ron";

/// Event tag mapped to the only clip when the manifest lists exactly one
pub const DEFAULT_EVENT: &str = "FBEvent";

/// Top-level configuration.
///
/// Every field has a default, so a manifest only needs to list what it
/// changes; in practice that is at least `files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// When false, the built snapshot is empty
    pub enable_timelines: bool,
    /// Whether closing a pair restores captured state
    pub reset_on_pair_end: bool,
    /// Seconds to wait before restoring; negative values become 0
    pub reset_delay: f32,
    /// Tag that closes a paired interaction
    pub close_tag: String,
    /// Tag mapped to the only clip when `files` has a single entry
    pub default_event: String,
    /// Event tag to clip name
    pub event_map: IndexMap<String, String>,
    /// Script alias to clip name
    pub files: IndexMap<String, String>,
    /// Root searched for script directories, relative to the manifest
    pub scripts_root: PathBuf,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            enable_timelines: true,
            reset_on_pair_end: false,
            reset_delay: 0.0,
            close_tag: DEFAULT_CLOSE_TAG.to_string(),
            default_event: DEFAULT_EVENT.to_string(),
            event_map: IndexMap::new(),
            files: IndexMap::new(),
            scripts_root: PathBuf::from("scripts"),
        }
    }
}

impl Manifest {
    /// Load a manifest from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| BuildError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save the manifest to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(false)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Directory scripts are searched under
    pub fn scripts_dir(&self, manifest_dir: &Path) -> PathBuf {
        if self.scripts_root.is_absolute() {
            self.scripts_root.clone()
        } else {
            manifest_dir.join(&self.scripts_root)
        }
    }

    /// Manifest path inside a config directory
    pub fn file_path(config_dir: &Path) -> PathBuf {
        config_dir.join(MANIFEST_FILE_NAME)
    }
}

/// Clip name without its `.hkx` extension
pub fn clip_base(clip: &str) -> &str {
    clip.strip_suffix(".hkx").unwrap_or(clip)
}
