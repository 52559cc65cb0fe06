// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hot reload for the configuration store.
//!
//! Collects file change notifications, waits for the burst to settle, then
//! asks the [`ConfigStore`] for the next generation. The scheduler picks the
//! new snapshot up on its next tick.

use crate::file_watcher::{FileEvent, FileWatcher};
use fullbody_timeline::{ConfigStore, Generation, SnapshotBuilder};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics for reload attempts
#[derive(Debug, Clone, Default)]
pub struct ReloadStats {
    /// Successful reloads
    pub total_reloaded: usize,
    /// Failed reloads
    pub failed: usize,
    /// When the last attempt finished
    pub last_reload: Option<Instant>,
    /// Generation installed by the last successful reload
    pub last_generation: Option<Generation>,
}

/// Drives [`ConfigStore::reload`] from file changes
pub struct ConfigReloader {
    watcher: Option<FileWatcher>,
    /// Changed paths waiting for the debounce window to pass
    pending: Vec<PathBuf>,
    /// Time of the most recent change
    last_change: Option<Instant>,
    stats: Arc<RwLock<ReloadStats>>,
    debounce_duration: Duration,
    enabled: bool,
}

impl ConfigReloader {
    /// Create a reloader with no watcher attached
    pub fn new() -> Self {
        Self {
            watcher: None,
            pending: Vec::new(),
            last_change: None,
            stats: Arc::new(RwLock::new(ReloadStats::default())),
            debounce_duration: Duration::from_millis(100),
            enabled: true,
        }
    }

    /// Start watching a configuration directory
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        let mut watcher = FileWatcher::for_config()?;
        watcher.watch(path)?;
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Whether `path` is being watched
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watcher.as_ref().is_some_and(|w| w.is_watching(path))
    }

    /// Set the debounce duration
    pub fn set_debounce_duration(&mut self, duration: Duration) {
        self.debounce_duration = duration;
    }

    /// Enable or disable reloading
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if reloading is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a change detected outside the watcher
    pub fn mark_changed(&mut self, path: impl Into<PathBuf>) {
        self.pending.push(path.into());
        self.last_change = Some(Instant::now());
    }

    /// Whether changes are waiting for the debounce window
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Collect file events and reload once the burst has settled.
    ///
    /// Returns the outcome of a reload attempt, or `None` if nothing was
    /// due. Failures are counted and leave the store untouched.
    pub fn poll<B: SnapshotBuilder>(
        &mut self,
        store: &ConfigStore<B>,
    ) -> Option<fullbody_timeline::Result<Generation>> {
        if !self.enabled {
            return None;
        }

        let events = self
            .watcher
            .as_ref()
            .map(FileWatcher::poll_events)
            .unwrap_or_default();
        for event in events {
            match event {
                FileEvent::Error(message) => tracing::warn!("Config watcher error: {message}"),
                other => {
                    if let Some(path) = other.path() {
                        tracing::debug!("Config change detected: {:?}", path);
                        self.mark_changed(path);
                    }
                }
            }
        }

        let last_change = self.last_change?;
        if self.pending.is_empty() || last_change.elapsed() < self.debounce_duration {
            return None;
        }

        let changed = std::mem::take(&mut self.pending);
        self.last_change = None;
        tracing::info!(files = changed.len(), "Config: reloading after change");

        let result = store.reload();
        self.update_stats(&result);
        Some(result)
    }

    fn update_stats(&self, result: &fullbody_timeline::Result<Generation>) {
        let mut stats = self.stats.write();
        match result {
            Ok(generation) => {
                stats.total_reloaded += 1;
                stats.last_generation = Some(*generation);
            }
            Err(_) => stats.failed += 1,
        }
        stats.last_reload = Some(Instant::now());
    }

    /// Get statistics
    pub fn stats(&self) -> ReloadStats {
        self.stats.read().clone()
    }
}

impl Default for ConfigReloader {
    fn default() -> Self {
        Self::new()
    }
}
