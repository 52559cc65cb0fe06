// SPDX-License-Identifier: MIT OR Apache-2.0
//! File-based configuration for the fullbody timeline scheduler.
//!
//! A `fullbody.ron` manifest names the reset policy, event mappings, and the
//! script files to load. [`FileSnapshotBuilder`] turns that into a
//! [`Snapshot`](fullbody_timeline::Snapshot) and plugs into a
//! [`ConfigStore`](fullbody_timeline::ConfigStore) for initial load and hot
//! reload.

pub mod builder;
pub mod error;
pub mod manifest;
pub mod nodes;
pub mod script;

pub use builder::FileSnapshotBuilder;
pub use error::{BuildError, Result};
pub use manifest::{clip_base, Manifest, DEFAULT_EVENT, MANIFEST_FILE_NAME};
pub use nodes::{node_alias, NodeResolver};
pub use script::parse_script;
