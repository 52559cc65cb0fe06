// SPDX-License-Identifier: MIT OR Apache-2.0
//! File system watcher for configuration changes.
//!
//! Provides debounced file system events for the manifest and script files
//! so edits can be hot-reloaded without restarting the host.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// A file was created
    Created(PathBuf),
    /// A file was modified
    Modified(PathBuf),
    /// A file was deleted
    Deleted(PathBuf),
    /// An error occurred
    Error(String),
}

impl FileEvent {
    /// Path the event refers to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => Some(p),
            Self::Error(_) => None,
        }
    }
}

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct FileWatcherConfig {
    /// Debounce duration for events
    pub debounce_duration: Duration,
    /// Whether to watch directories recursively
    pub recursive: bool,
    /// File extensions to watch (empty = watch all)
    pub extensions: HashSet<String>,
}

impl Default for FileWatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(250),
            recursive: true,
            extensions: HashSet::new(),
        }
    }
}

impl FileWatcherConfig {
    /// Watch manifest (`.ron`) and script (`.ini`) files
    pub fn for_config() -> Self {
        let extensions = ["ron", "ini"].into_iter().map(String::from).collect();
        Self {
            extensions,
            ..Self::default()
        }
    }

    /// Whether a path passes the extension filter
    pub fn matches(&self, path: &Path) -> bool {
        self.extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}

/// Debounced watcher over one or more directories
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<FileEvent>,
    watched_dirs: HashSet<PathBuf>,
    config: FileWatcherConfig,
}

impl FileWatcher {
    /// Create a new file watcher with the given configuration
    pub fn new(config: FileWatcherConfig) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let filter = config.clone();

        let debouncer = new_debouncer(
            config.debounce_duration,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        let paths = event.paths.iter().filter(|p| filter.matches(p)).cloned();
                        let make: fn(PathBuf) -> FileEvent = match event.kind {
                            EventKind::Create(_) => FileEvent::Created,
                            EventKind::Modify(_) => FileEvent::Modified,
                            EventKind::Remove(_) => FileEvent::Deleted,
                            EventKind::Any | EventKind::Access(_) | EventKind::Other => continue,
                        };
                        for path in paths {
                            let _ = event_tx.send(make(path));
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(FileEvent::Error(error.to_string()));
                    }
                }
            },
        )?;

        Ok(Self {
            debouncer,
            event_rx,
            watched_dirs: HashSet::new(),
            config,
        })
    }

    /// Create a watcher for configuration files
    pub fn for_config() -> Result<Self, notify::Error> {
        Self::new(FileWatcherConfig::for_config())
    }

    /// Watch a directory for changes
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        let path = path.as_ref().to_path_buf();
        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        self.debouncer.watch(&path, mode)?;
        tracing::info!("Watching directory for changes: {:?}", path);
        self.watched_dirs.insert(path);
        Ok(())
    }

    /// Check if a directory is being watched
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_dirs.contains(path)
    }

    /// Poll for pending file events (non-blocking)
    pub fn poll_events(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("File watcher channel disconnected");
                    break;
                }
            }
        }
        events
    }
}
