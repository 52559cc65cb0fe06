// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while turning configuration files into a snapshot.

use std::path::PathBuf;
use thiserror::Error;

/// Why a snapshot could not be built
#[derive(Debug, Error)]
pub enum BuildError {
    /// A configuration file could not be read or written
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid RON for [`Manifest`](crate::Manifest)
    #[error("Failed to parse manifest {}: {source}", .path.display())]
    Manifest {
        /// Manifest file
        path: PathBuf,
        /// Parser error with position
        #[source]
        source: ron::error::SpannedError,
    },

    /// The manifest could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Timelines are enabled but no script file is listed
    #[error("Manifest lists no script files")]
    NoFiles,
}

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, BuildError>;
