// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generation-numbered configuration store.
//!
//! The store owns the current [`Snapshot`] behind a read-write lock and
//! replaces it wholesale on reload. Readers get an `Arc` handle that stays
//! valid and unchanged no matter how many reloads happen afterwards.

use crate::command::Generation;
use crate::error::{ConfigError, Result};
use crate::snapshot::Snapshot;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Produces snapshots from some configuration source
pub trait SnapshotBuilder: Send + Sync {
    /// Error produced when the source cannot be turned into a snapshot
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a snapshot stamped with `generation`
    fn build(&self, generation: Generation) -> std::result::Result<Snapshot, Self::Error>;
}

/// Read access to the current snapshot
pub trait SnapshotSource: Send + Sync {
    /// The current snapshot, if one has been loaded
    fn snapshot(&self) -> Option<Arc<Snapshot>>;
}

/// Holds the current snapshot and builds new ones on demand
pub struct ConfigStore<B> {
    builder: B,
    current: RwLock<Option<Arc<Snapshot>>>,
    /// Serializes reloads so generations are handed out one at a time
    reload_lock: Mutex<()>,
}

impl<B: SnapshotBuilder> ConfigStore<B> {
    /// Create a store with nothing loaded
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
        }
    }

    /// Build and install generation 1.
    ///
    /// If the builder fails, an empty generation-1 snapshot is installed so
    /// the scheduler still runs (every event is then unmapped), and the
    /// build error is returned for the caller to report.
    pub fn load_initial(&self) -> Result<Generation> {
        let _guard = self.reload_lock.lock();
        match self.build(1) {
            Ok(snapshot) => {
                tracing::info!(
                    scripts = snapshot.script_count(),
                    "Config: loaded initial snapshot gen=1"
                );
                *self.current.write() = Some(Arc::new(snapshot));
                Ok(1)
            }
            Err(err) => {
                tracing::error!("Config: initial build failed, installing empty snapshot: {err}");
                *self.current.write() = Some(Arc::new(Snapshot::new(1)));
                Err(err)
            }
        }
    }

    /// Build the next generation and swap it in.
    ///
    /// On failure the current snapshot and generation are left untouched.
    pub fn reload(&self) -> Result<Generation> {
        let _guard = self.reload_lock.lock();
        let previous = self.generation();
        let next = previous + 1;

        let snapshot = match self.build(next) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!("Config: reload failed; keeping gen={previous}: {err}");
                return Err(err);
            }
        };

        let scripts = snapshot.script_count();
        *self.current.write() = Some(Arc::new(snapshot));
        tracing::info!(scripts, "Config: reload success; gen={next}");
        Ok(next)
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    /// Generation of the current snapshot, or 0 if nothing is loaded
    pub fn generation(&self) -> Generation {
        self.current
            .read()
            .as_ref()
            .map(|s| s.generation)
            .unwrap_or(0)
    }

    /// The builder backing this store
    pub fn builder(&self) -> &B {
        &self.builder
    }

    fn build(&self, generation: Generation) -> Result<Snapshot> {
        let snapshot = self
            .builder
            .build(generation)
            .map_err(|e| ConfigError::Build {
                generation,
                source: Box::new(e),
            })?;

        if snapshot.generation != generation {
            return Err(ConfigError::GenerationMismatch {
                expected: generation,
                actual: snapshot.generation,
            });
        }
        Ok(snapshot)
    }
}

impl<B: SnapshotBuilder> SnapshotSource for ConfigStore<B> {
    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        ConfigStore::snapshot(self)
    }
}

/// A fixed snapshot, for hosts that build configuration themselves
impl SnapshotSource for RwLock<Option<Arc<Snapshot>>> {
    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.read().clone()
    }
}
