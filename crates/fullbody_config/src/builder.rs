// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot builder backed by a manifest and script files on disk.

use crate::error::{BuildError, Result};
use crate::manifest::{clip_base, Manifest};
use crate::nodes::NodeResolver;
use crate::script::parse_script;
use fullbody_timeline::{Generation, Script, Snapshot, SnapshotBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Builds snapshots from `fullbody.ron` and the script files it names.
///
/// For every `alias -> clip` entry the builder looks under the scripts root
/// for a directory called `_variants_<clip without .hkx>` and reads
/// `FB_<alias>.ini` from it. A missing directory or file registers the clip
/// with an empty script instead of failing the build.
pub struct FileSnapshotBuilder {
    manifest_path: PathBuf,
    nodes: NodeResolver,
}

impl FileSnapshotBuilder {
    /// Create a builder for a manifest file
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            nodes: NodeResolver::new(),
        }
    }

    /// Manifest file this builder reads
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Directory holding the manifest
    pub fn manifest_dir(&self) -> &Path {
        match self.manifest_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn build_snapshot(&self, generation: Generation) -> Result<Snapshot> {
        let manifest = Manifest::load(&self.manifest_path)?;
        tracing::info!(
            path = %self.manifest_path.display(),
            generation,
            "Config: building snapshot"
        );

        let mut snapshot = Snapshot::new(generation);
        snapshot.set_reset_policy(manifest.reset_on_pair_end, manifest.reset_delay);
        snapshot.close_tag.clone_from(&manifest.close_tag);

        if !manifest.enable_timelines {
            tracing::info!("Config: timelines disabled");
            return Ok(snapshot);
        }

        if manifest.files.is_empty() {
            return Err(BuildError::NoFiles);
        }

        for (tag, clip) in &manifest.event_map {
            snapshot.map_event(tag.as_str(), clip.as_str());
        }

        if snapshot.script_for(&manifest.default_event).is_none() && manifest.files.len() == 1 {
            if let Some((_, clip)) = manifest.files.first() {
                tracing::info!(
                    event = %manifest.default_event,
                    clip = %clip,
                    "Config: default event mapping"
                );
                snapshot.map_event(manifest.default_event.as_str(), clip.as_str());
            }
        }

        let root = manifest.scripts_dir(self.manifest_dir());
        for (alias, clip) in &manifest.files {
            let script = self.load_script(&root, alias, clip, generation);
            tracing::info!(
                alias = %alias,
                clip = %clip,
                commands = script.len(),
                "Config: script loaded"
            );
            snapshot.insert_script(clip.as_str(), script);
        }

        Ok(snapshot)
    }

    fn load_script(&self, root: &Path, alias: &str, clip: &str, generation: Generation) -> Script {
        let dir_name = format!("_variants_{}", clip_base(clip));
        let Some(dir) = find_dir(root, &dir_name) else {
            tracing::warn!(
                root = %root.display(),
                dir = %dir_name,
                "Config: variants directory not found"
            );
            return Script::default();
        };

        let path = dir.join(format!("FB_{alias}.ini"));
        match std::fs::read_to_string(&path) {
            Ok(text) => parse_script(&text, clip, generation, &self.nodes),
            Err(err) => {
                tracing::warn!(path = %path.display(), "Config: missing script file: {err}");
                Script::default()
            }
        }
    }
}

/// First directory named `name` under `root`, searched recursively
fn find_dir(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e: std::result::Result<walkdir::DirEntry, walkdir::Error>| e.ok())
        .find(|e| e.file_type().is_dir() && e.file_name().to_str() == Some(name))
        .map(walkdir::DirEntry::into_path)
}

impl SnapshotBuilder for FileSnapshotBuilder {
    type Error = BuildError;

    fn build(&self, generation: Generation) -> Result<Snapshot> {
        self.build_snapshot(generation)
    }
}
