// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the timeline core.

use crate::command::Generation;
use thiserror::Error;

/// Boxed error produced by a snapshot builder
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by the [`ConfigStore`](crate::ConfigStore)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The builder failed to produce a snapshot
    #[error("Failed to build snapshot for generation {generation}: {source}")]
    Build {
        /// Generation that was being built
        generation: Generation,
        /// Underlying builder error
        #[source]
        source: BoxError,
    },

    /// The builder returned a snapshot stamped with the wrong generation
    #[error("Builder returned generation {actual}, expected {expected}")]
    GenerationMismatch {
        /// Generation that was requested
        expected: Generation,
        /// Generation that came back
        actual: Generation,
    },
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, ConfigError>;
